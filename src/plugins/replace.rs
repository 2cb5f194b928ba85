use std::fs;
use std::path::Path;

use tracing::info;

use super::ReleasePlugin;
use crate::error::Result;

/// Replaces every occurrence of the old version string with the new one in a
/// fixed set of files, and commits those files with the release.
#[derive(Debug, Clone)]
pub struct PatternReplaceVersionInFilesPlugin {
    files: Vec<String>,
}

impl PatternReplaceVersionInFilesPlugin {
    /// `files` are relative to the repository root.
    pub fn new(files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        PatternReplaceVersionInFilesPlugin {
            files: files.into_iter().map(Into::into).collect(),
        }
    }
}

impl ReleasePlugin for PatternReplaceVersionInFilesPlugin {
    fn name(&self) -> &str {
        "PatternReplaceVersionInFilesPlugin"
    }

    fn extra_files(&self) -> &[String] {
        &self.files
    }

    fn error_check(&self, root_directory: &Path) -> Option<Vec<String>> {
        Some(
            self.extra_files_to_commit(root_directory)
                .into_iter()
                .filter(|path| !path.is_file())
                .map(|path| {
                    format!(
                        "The file {} was not found! PatternReplaceVersionInFilesPlugin is not configured correctly!",
                        path.display()
                    )
                })
                .collect(),
        )
    }

    fn pre_commit(&self, root_directory: &Path, old_version: &str, new_version: &str) -> Result<()> {
        for path in self.extra_files_to_commit(root_directory) {
            let contents = fs::read_to_string(&path)?;
            let updated: String = contents
                .lines()
                .map(|line| format!("{}\n", line.replace(old_version, new_version)))
                .collect();
            fs::write(&path, updated)?;
            info!("Updated version in {}", path.display());
        }
        Ok(())
    }
}
