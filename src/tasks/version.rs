//! The `version` task: report what was detected about the tool and the project.

use std::path::Path;
use std::process::Command;

use tracing::debug;

use super::TaskOutcome;
use crate::config::Configuration;
use crate::git::SourceControl;
use crate::plugins;
use crate::ui::IoUtils;
use crate::version::read_project_version;

/// Print tool, repository and project details, then any configuration problems.
pub fn version(config: &Configuration, source: &dyn SourceControl, mut io: IoUtils) -> TaskOutcome {
    let git_version = source
        .get_version()
        .unwrap_or_else(|e| format!("[Error: {}]", e));
    io.standard_output(&format!("Source control: {}", git_version));
    io.standard_output(&format!("Invoke Release: {}", env!("CARGO_PKG_VERSION")));

    let project_version = read_project_version(config)
        .unwrap_or_else(|e| format!("[Error: Could not read version: {}]", e));
    io.standard_output(&format!(
        "Detected Project: {} {}",
        config.display_name, project_version
    ));

    let branch = source
        .get_branch_name()
        .unwrap_or_else(|e| format!("[Error: {}]", e));
    io.standard_output(&format!("Detected Git branch: {}", branch));
    io.standard_output(&format!(
        "Detected version file: {}",
        config.version_file_name.display()
    ));
    io.standard_output(&format!(
        "Detected changelog file: {}",
        config.changelog_file_name.display()
    ));

    match config.gpg_command.as_deref() {
        Some(gpg) => io.verbose_output(&format!("GPG ({}): {}", gpg.display(), gpg_version(gpg))),
        None => io.verbose_output("GPG: Not installed (won't be used)"),
    }
    match config.tty.as_deref() {
        Some(tty) => io.verbose_output(&format!("TTY: {}", tty)),
        None => io.verbose_output("TTY: None detected"),
    }
    io.verbose_output(&format!(
        "Release commit message template: \"{}\"",
        config.release_message_template
    ));

    let file_errors = config.file_existence_errors();
    if !file_errors.is_empty() {
        io.error_output(&file_errors.join("\n"));
    }
    for error in plugins::version_error_check(config) {
        io.error_output(&error);
    }

    TaskOutcome::Completed
}

/// First line of `gpg --version`, stdout and stderr combined
fn gpg_version(gpg: &Path) -> String {
    debug!(gpg = %gpg.display(), "gpg --version");
    match Command::new(gpg).arg("--version").output() {
        Ok(output) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            text.lines().next().unwrap_or_default().trim().to_string()
        }
        Err(e) => format!("[Error: {}]", e),
    }
}
