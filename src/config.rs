use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{ReleaseError, Result};
use crate::plugins::{PatternReplaceVersionInFilesPlugin, ReleasePlugin, ScriptHookPlugin};

/// Name of the project configuration file.
pub const CONFIG_FILE_NAME: &str = "release.toml";

const CHANGELOG_CANDIDATES: [&str; 3] = ["CHANGELOG.txt", "CHANGELOG.md", "CHANGELOG.rst"];

/// The on-disk release settings for a project.
///
/// Only `module_name` and `display_name` are required; every other key has a default.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReleaseSettings {
    #[serde(default)]
    pub module_name: String,

    #[serde(default)]
    pub display_name: String,

    /// Directory, relative to the repository root, containing the module directory
    #[serde(default)]
    pub python_directory: Option<String>,

    #[serde(default = "default_master_branch")]
    pub master_branch: String,

    #[serde(default)]
    pub use_pull_request: bool,

    #[serde(default = "default_use_tag")]
    pub use_tag: bool,

    #[serde(default)]
    pub plugins: Vec<PluginSettings>,
}

fn default_master_branch() -> String {
    "master".to_string()
}

fn default_use_tag() -> bool {
    true
}

impl ReleaseSettings {
    pub fn new(module_name: impl Into<String>, display_name: impl Into<String>) -> Self {
        ReleaseSettings {
            module_name: module_name.into(),
            display_name: display_name.into(),
            python_directory: None,
            master_branch: default_master_branch(),
            use_pull_request: false,
            use_tag: default_use_tag(),
            plugins: Vec::new(),
        }
    }
}

/// One `[[plugins]]` table.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PluginSettings {
    /// Replace the old version with the new one in each file
    PatternReplace {
        #[serde(default)]
        files: Vec<String>,
    },
    /// Run scripts at lifecycle points
    Script(ScriptHooks),
}

/// Script paths, relative to the repository root, for each lifecycle point.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct ScriptHooks {
    #[serde(default)]
    pub pre_release: Option<String>,
    #[serde(default)]
    pub pre_commit: Option<String>,
    #[serde(default)]
    pub pre_push: Option<String>,
    #[serde(default)]
    pub post_release: Option<String>,
    #[serde(default)]
    pub pre_rollback: Option<String>,
    #[serde(default)]
    pub post_rollback: Option<String>,
    /// Files the scripts modify that must be part of the release commit
    #[serde(default)]
    pub extra_files: Vec<String>,
}

impl PluginSettings {
    fn build(&self) -> Box<dyn ReleasePlugin> {
        match self {
            PluginSettings::PatternReplace { files } => {
                Box::new(PatternReplaceVersionInFilesPlugin::new(files.clone()))
            }
            PluginSettings::Script(hooks) => Box::new(ScriptHookPlugin::new(hooks.clone())),
        }
    }
}

/// Fully resolved, immutable release configuration.
///
/// Built once per invocation by [`Configuration::configure`].
pub struct Configuration {
    pub module_name: String,
    pub display_name: String,
    /// Commit/tag message with a single `{}` placeholder for the version
    pub release_message_template: String,
    pub root_directory: PathBuf,
    pub version_file_name: PathBuf,
    /// The version file holds only the version string
    pub use_version_text: bool,
    pub changelog_file_name: PathBuf,
    pub master_branch: String,
    pub use_pull_request: bool,
    pub use_tag: bool,
    /// gpg executable, when one is installed
    pub gpg_command: Option<PathBuf>,
    /// Controlling terminal, handed to GPG as `GPG_TTY`
    pub tty: Option<String>,
    pub plugins: Vec<Box<dyn ReleasePlugin>>,
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("module_name", &self.module_name)
            .field("display_name", &self.display_name)
            .field("root_directory", &self.root_directory)
            .field("version_file_name", &self.version_file_name)
            .field("changelog_file_name", &self.changelog_file_name)
            .field("master_branch", &self.master_branch)
            .field("use_pull_request", &self.use_pull_request)
            .field("use_tag", &self.use_tag)
            .field("gpg_command", &self.gpg_command)
            .field("tty", &self.tty)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}

impl Configuration {
    /// Validate `settings` and resolve every derived path for the repository at `root_directory`.
    pub fn configure(settings: ReleaseSettings, root_directory: impl Into<PathBuf>) -> Result<Self> {
        let module_name = settings.module_name.trim().to_string();
        let display_name = settings.display_name.trim().to_string();

        if module_name.is_empty() {
            return Err(ReleaseError::config("module_name is required"));
        }
        if display_name.is_empty() {
            return Err(ReleaseError::config("display_name is required"));
        }

        let root_directory = root_directory.into();

        let changelog_file_name = CHANGELOG_CANDIDATES
            .iter()
            .map(|name| root_directory.join(name))
            .find(|path| case_sensitive_regular_file_exists(path))
            .unwrap_or_else(|| root_directory.join(CHANGELOG_CANDIDATES[0]));

        let module_directory = match settings.python_directory.as_deref() {
            Some(dir) if !dir.is_empty() => root_directory.join(dir).join(&module_name),
            _ => root_directory.join(&module_name),
        };
        let version_py = module_directory.join("version.py");
        let (version_file_name, use_version_text) = if version_py.is_file() {
            (version_py, false)
        } else {
            (module_directory.join("version.txt"), true)
        };

        let config = Configuration {
            release_message_template: format!("Released {} version {{}}", display_name),
            module_name,
            display_name,
            root_directory,
            version_file_name,
            use_version_text,
            changelog_file_name,
            master_branch: settings.master_branch,
            use_pull_request: settings.use_pull_request,
            use_tag: settings.use_tag,
            gpg_command: detect_gpg_command(),
            tty: detect_tty(),
            plugins: settings.plugins.iter().map(PluginSettings::build).collect(),
        };
        debug!(?config, "configured");

        Ok(config)
    }

    /// The release message for `version`
    pub fn release_message(&self, version: &str) -> String {
        self.release_message_template.replacen("{}", version, 1)
    }

    /// Problems with the expected version and changelog files.
    pub fn file_existence_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.version_file_name.is_file() {
            let module_directory = self
                .version_file_name
                .parent()
                .unwrap_or(&self.root_directory);
            errors.push(format!(
                "Version file {} was not found! Your module must contain a file named \
                 version.(py|txt) in directory {}.",
                self.version_file_name.display(),
                module_directory.display()
            ));
        }

        if !self.changelog_file_name.is_file() {
            errors.push(format!(
                "Changelog file {} was not found! Your project root directory must contain a \
                 file named CHANGELOG.(txt|md|rst).",
                self.changelog_file_name.display()
            ));
        }

        errors
    }
}

/// Whether `path` is a regular file whose name matches exactly, even on
/// case-insensitive file systems.
pub fn case_sensitive_regular_file_exists(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    let (Some(parent), Some(file_name)) = (path.parent(), path.file_name()) else {
        return false;
    };

    match fs::read_dir(parent) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .any(|entry| entry.file_name() == file_name),
        Err(_) => false,
    }
}

fn detect_gpg_command() -> Option<PathBuf> {
    ["gpg2", "gpg", "gpg1"]
        .iter()
        .find_map(|name| which::which(name).ok())
}

fn detect_tty() -> Option<String> {
    let output = Command::new("tty")
        .stdin(Stdio::inherit())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let tty = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if tty.is_empty() {
        None
    } else {
        Some(tty)
    }
}

/// Loads release settings.
///
/// Attempts to load settings in the following order:
/// 1. Custom path provided as parameter
/// 2. `release.toml` in the current directory
/// 3. `release.toml` in `root_directory`
/// 4. `git-release/release.toml` in the user config directory
///
/// # Returns
/// * `Ok(Some(settings))` - Parsed settings
/// * `Ok(None)` - No configuration file exists; the project is not configured
/// * `Err` - A file exists but cannot be read or parsed
pub fn load_settings(
    config_path: Option<&Path>,
    root_directory: Option<&Path>,
) -> Result<Option<ReleaseSettings>> {
    let path = if let Some(path) = config_path {
        Some(path.to_path_buf())
    } else {
        let mut candidates = vec![PathBuf::from(CONFIG_FILE_NAME)];
        if let Some(root) = root_directory {
            candidates.push(root.join(CONFIG_FILE_NAME));
        }
        if let Some(config_dir) = dirs::config_dir() {
            candidates.push(config_dir.join("git-release").join(CONFIG_FILE_NAME));
        }
        candidates.into_iter().find(|p| p.is_file())
    };

    let Some(path) = path else {
        return Ok(None);
    };

    debug!("Loading settings from {}", path.display());
    let contents = fs::read_to_string(&path)?;
    let settings: ReleaseSettings = toml::from_str(&contents).map_err(|e| {
        ReleaseError::config(format!("Could not parse {}: {}", path.display(), e))
    })?;
    Ok(Some(settings))
}

/// Configuration rooted at `root`, with no GPG, TTY or plugins.
#[cfg(test)]
pub(crate) fn test_configuration(root: &str) -> Configuration {
    let root = PathBuf::from(root);
    Configuration {
        module_name: "extra_library".to_string(),
        display_name: "My Extra Library".to_string(),
        release_message_template: "Released My Extra Library version {}".to_string(),
        version_file_name: root.join("extra_library").join("version.txt"),
        use_version_text: true,
        changelog_file_name: root.join("CHANGELOG.txt"),
        root_directory: root,
        master_branch: "master".to_string(),
        use_pull_request: false,
        use_tag: true,
        gpg_command: None,
        tty: None,
        plugins: Vec::new(),
    }
}
