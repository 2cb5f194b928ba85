//! Runs user-provided scripts at release lifecycle points.
//!
//! Scripts receive the release details as `RELEASE_*` environment variables and
//! run with the repository root as their working directory. A script exiting
//! non-zero fails the hook.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ReleasePlugin, ReleaseStatus};
use crate::config::ScriptHooks;
use crate::error::{ReleaseError, Result};

/// Lifecycle point a script is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookType {
    PreRelease,
    PreCommit,
    PrePush,
    PostRelease,
    PreRollback,
    PostRollback,
}

impl HookType {
    /// Get the hook name as a string
    pub fn name(&self) -> &'static str {
        match self {
            HookType::PreRelease => "pre-release",
            HookType::PreCommit => "pre-commit",
            HookType::PrePush => "pre-push",
            HookType::PostRelease => "post-release",
            HookType::PreRollback => "pre-rollback",
            HookType::PostRollback => "post-rollback",
        }
    }
}

/// Context information passed to a hook script
#[derive(Debug, Clone)]
pub struct HookContext {
    pub hook_type: HookType,
    pub root_directory: PathBuf,
    /// Version before the step (the current version for rollbacks)
    pub version: String,
    /// Version after the step, if the step has one
    pub new_version: Option<String>,
    pub status: Option<ReleaseStatus>,
}

impl HookContext {
    /// Maps context fields to RELEASE_* environment variables
    pub fn to_env_vars(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        env.insert("RELEASE_HOOK".to_string(), self.hook_type.name().to_string());
        env.insert(
            "RELEASE_ROOT".to_string(),
            self.root_directory.display().to_string(),
        );
        env.insert("RELEASE_VERSION".to_string(), self.version.clone());

        if let Some(ref new_version) = self.new_version {
            env.insert("RELEASE_NEW_VERSION".to_string(), new_version.clone());
        }

        if let Some(status) = self.status {
            env.insert("RELEASE_STATUS".to_string(), status.name().to_string());
        }

        env
    }
}

/// Execute a hook script with the given context
///
/// # Returns
/// * `Ok(())` if the script exits with code 0
/// * `Err` if the script is missing, cannot be spawned, or exits non-zero
pub fn execute(script: &Path, context: &HookContext) -> Result<()> {
    if !script.exists() {
        return Err(ReleaseError::failure(format!(
            "Hook script not found: {}",
            script.display()
        )));
    }

    if !script.is_file() {
        return Err(ReleaseError::failure(format!(
            "Hook path is not a file: {}",
            script.display()
        )));
    }

    debug!(hook = context.hook_type.name(), script = %script.display(), "running hook script");

    let output = Command::new(script)
        .current_dir(&context.root_directory)
        .envs(context.to_env_vars())
        .output()
        .map_err(|e| {
            ReleaseError::failure(format!("Failed to execute hook {}: {}", script.display(), e))
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        return Err(ReleaseError::failure(format!(
            "Hook {} failed with exit code {}\nStdout: {}\nStderr: {}",
            script.display(),
            output.status.code().unwrap_or(-1),
            stdout.trim_end(),
            stderr.trim_end()
        )));
    }

    info!("Hook executed successfully: {}", script.display());
    Ok(())
}

/// Plugin that delegates each lifecycle point to a configured script.
#[derive(Debug, Clone, Default)]
pub struct ScriptHookPlugin {
    hooks: ScriptHooks,
}

impl ScriptHookPlugin {
    pub fn new(hooks: ScriptHooks) -> Self {
        ScriptHookPlugin { hooks }
    }

    fn script_for(&self, hook_type: HookType) -> Option<&str> {
        let script = match hook_type {
            HookType::PreRelease => &self.hooks.pre_release,
            HookType::PreCommit => &self.hooks.pre_commit,
            HookType::PrePush => &self.hooks.pre_push,
            HookType::PostRelease => &self.hooks.post_release,
            HookType::PreRollback => &self.hooks.pre_rollback,
            HookType::PostRollback => &self.hooks.post_rollback,
        };
        script.as_deref()
    }

    fn run(
        &self,
        hook_type: HookType,
        root_directory: &Path,
        version: &str,
        new_version: Option<&str>,
        status: Option<ReleaseStatus>,
    ) -> Result<()> {
        let Some(script) = self.script_for(hook_type) else {
            return Ok(());
        };

        let context = HookContext {
            hook_type,
            root_directory: root_directory.to_path_buf(),
            version: version.to_string(),
            new_version: new_version.map(str::to_string),
            status,
        };
        execute(&root_directory.join(script), &context)
    }
}

impl ReleasePlugin for ScriptHookPlugin {
    fn name(&self) -> &str {
        "ScriptHookPlugin"
    }

    fn extra_files(&self) -> &[String] {
        &self.hooks.extra_files
    }

    fn error_check(&self, root_directory: &Path) -> Option<Vec<String>> {
        let hook_types = [
            HookType::PreRelease,
            HookType::PreCommit,
            HookType::PrePush,
            HookType::PostRelease,
            HookType::PreRollback,
            HookType::PostRollback,
        ];
        Some(
            hook_types
                .iter()
                .filter_map(|&t| self.script_for(t).map(|s| (t, root_directory.join(s))))
                .filter(|(_, path)| !path.is_file())
                .map(|(t, path)| {
                    format!("The {} hook script {} was not found!", t.name(), path.display())
                })
                .collect(),
        )
    }

    fn pre_release(&self, root_directory: &Path, old_version: &str) -> Result<()> {
        super::ensure_no_errors(self.name(), self.error_check(root_directory))?;
        self.run(HookType::PreRelease, root_directory, old_version, None, None)
    }

    fn pre_commit(&self, root_directory: &Path, old_version: &str, new_version: &str) -> Result<()> {
        self.run(
            HookType::PreCommit,
            root_directory,
            old_version,
            Some(new_version),
            None,
        )
    }

    fn pre_push(&self, root_directory: &Path, old_version: &str, new_version: &str) -> Result<()> {
        self.run(HookType::PrePush, root_directory, old_version, Some(new_version), None)
    }

    fn post_release(
        &self,
        root_directory: &Path,
        old_version: &str,
        new_version: &str,
        status: ReleaseStatus,
    ) -> Result<()> {
        self.run(
            HookType::PostRelease,
            root_directory,
            old_version,
            Some(new_version),
            Some(status),
        )
    }

    fn pre_rollback(&self, root_directory: &Path, current_version: &str) -> Result<()> {
        self.run(HookType::PreRollback, root_directory, current_version, None, None)
    }

    fn post_rollback(
        &self,
        root_directory: &Path,
        current_version: &str,
        rollback_to_version: &str,
    ) -> Result<()> {
        self.run(
            HookType::PostRollback,
            root_directory,
            current_version,
            Some(rollback_to_version),
            None,
        )
    }
}
