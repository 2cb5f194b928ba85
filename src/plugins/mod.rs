//! Release plugins and the lifecycle dispatcher.
//!
//! A plugin implements [`ReleasePlugin`] and is invoked at six points:
//! - `pre_release`: before anything is stashed or prompted
//! - `pre_commit`: after the version and changelog files were written
//! - `pre_push`: after the release commit, before tagging
//! - `post_release`: after the push decision, with its [`ReleaseStatus`]
//! - `pre_rollback` / `post_rollback`: around a release rollback
//!
//! Failures in `pre_*` hooks abort the task. Failures in `post_*` hooks are
//! logged and otherwise ignored, since the repository has already been changed.

pub mod replace;
pub mod script;

pub use replace::PatternReplaceVersionInFilesPlugin;
pub use script::{HookType, ScriptHookPlugin};

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::Configuration;
use crate::error::{ReleaseError, Result};

/// Outcome of the push decision, handed to `post_release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseStatus {
    Pushed,
    NotPushed,
    RolledBack,
}

impl ReleaseStatus {
    pub fn name(&self) -> &'static str {
        match self {
            ReleaseStatus::Pushed => "PUSHED",
            ReleaseStatus::NotPushed => "NOT_PUSHED",
            ReleaseStatus::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for ReleaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A release extension point. Every method has a no-op default.
pub trait ReleasePlugin: Send + Sync {
    /// Name used in error messages
    fn name(&self) -> &str;

    /// Paths, relative to the repository root, committed with the release
    fn extra_files(&self) -> &[String] {
        &[]
    }

    /// [`extra_files`](Self::extra_files) resolved against `root_directory`
    fn extra_files_to_commit(&self, root_directory: &Path) -> Vec<PathBuf> {
        self.extra_files()
            .iter()
            .map(|f| root_directory.join(f))
            .collect()
    }

    /// Configuration or content problems; `None` when the plugin has nothing to check
    fn error_check(&self, _root_directory: &Path) -> Option<Vec<String>> {
        None
    }

    /// Runs [`error_check`](Self::error_check) and fails if it reported anything.
    fn pre_release(&self, root_directory: &Path, _old_version: &str) -> Result<()> {
        ensure_no_errors(self.name(), self.error_check(root_directory))
    }

    fn pre_commit(&self, _root_directory: &Path, _old_version: &str, _new_version: &str) -> Result<()> {
        Ok(())
    }

    fn pre_push(&self, _root_directory: &Path, _old_version: &str, _new_version: &str) -> Result<()> {
        Ok(())
    }

    fn post_release(
        &self,
        _root_directory: &Path,
        _old_version: &str,
        _new_version: &str,
        _status: ReleaseStatus,
    ) -> Result<()> {
        Ok(())
    }

    fn pre_rollback(&self, _root_directory: &Path, _current_version: &str) -> Result<()> {
        Ok(())
    }

    fn post_rollback(
        &self,
        _root_directory: &Path,
        _current_version: &str,
        _rollback_to_version: &str,
    ) -> Result<()> {
        Ok(())
    }
}

/// Fail with the plugin's collected `error_check` messages, if there are any.
pub fn ensure_no_errors(plugin_name: &str, errors: Option<Vec<String>>) -> Result<()> {
    match errors {
        Some(errors) if !errors.is_empty() => Err(ReleaseError::failure(format!(
            "The {} plugin generated the following errors:\n{}",
            plugin_name,
            errors.join("\n")
        ))),
        _ => Ok(()),
    }
}

/// Union of every plugin's extra files.
pub fn get_extra_files_to_commit(config: &Configuration) -> BTreeSet<PathBuf> {
    config
        .plugins
        .iter()
        .flat_map(|p| p.extra_files_to_commit(&config.root_directory))
        .collect()
}

/// Union of every plugin's `error_check` results, for the version task.
pub fn version_error_check(config: &Configuration) -> BTreeSet<String> {
    config
        .plugins
        .iter()
        .filter_map(|p| p.error_check(&config.root_directory))
        .flatten()
        .collect()
}

pub fn pre_release(config: &Configuration, old_version: &str) -> Result<()> {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), "pre_release");
        plugin.pre_release(&config.root_directory, old_version)?;
    }
    Ok(())
}

pub fn pre_commit(config: &Configuration, old_version: &str, new_version: &str) -> Result<()> {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), "pre_commit");
        plugin.pre_commit(&config.root_directory, old_version, new_version)?;
    }
    Ok(())
}

pub fn pre_push(config: &Configuration, old_version: &str, new_version: &str) -> Result<()> {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), "pre_push");
        plugin.pre_push(&config.root_directory, old_version, new_version)?;
    }
    Ok(())
}

pub fn post_release(
    config: &Configuration,
    old_version: &str,
    new_version: &str,
    status: ReleaseStatus,
) {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), %status, "post_release");
        if let Err(e) = plugin.post_release(&config.root_directory, old_version, new_version, status) {
            warn!(plugin = plugin.name(), "post_release hook failed: {}", e);
        }
    }
}

pub fn pre_rollback(config: &Configuration, current_version: &str) -> Result<()> {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), "pre_rollback");
        plugin.pre_rollback(&config.root_directory, current_version)?;
    }
    Ok(())
}

pub fn post_rollback(config: &Configuration, current_version: &str, rollback_to_version: &str) {
    for plugin in &config.plugins {
        debug!(plugin = plugin.name(), "post_rollback");
        if let Err(e) =
            plugin.post_rollback(&config.root_directory, current_version, rollback_to_version)
        {
            warn!(plugin = plugin.name(), "post_rollback hook failed: {}", e);
        }
    }
}
