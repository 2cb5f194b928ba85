//! Shared fixtures for the task tests.
#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use git_release::config::{Configuration, ReleaseSettings};
use git_release::error::{ReleaseError, Result};
use git_release::plugins::{ReleasePlugin, ReleaseStatus};
use git_release::ui::{IoUtils, ScriptedConsole};
use tempfile::TempDir;

pub const CHANGELOG_WITH_DETAILS: &str = "Changelog
=========

- [MINOR] Added a new widget

4.5.1 (2020-04-02)
------------------
- Older change
";

pub const CHANGELOG_WITHOUT_DETAILS: &str = "Changelog
=========

4.5.1 (2020-04-02)
------------------
- Older change
";

/// A project directory holding `extra_library/version.txt` and `CHANGELOG.txt`
pub fn project(version: &str, changelog: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("extra_library")).unwrap();
    fs::write(dir.path().join("extra_library").join("version.txt"), version).unwrap();
    fs::write(dir.path().join("CHANGELOG.txt"), changelog).unwrap();
    dir
}

/// Configuration for [project], without GPG or a TTY regardless of the host
pub fn configure(root: &Path) -> Configuration {
    let mut config =
        Configuration::configure(ReleaseSettings::new("extra_library", "My Extra Library"), root)
            .unwrap();
    config.gpg_command = None;
    config.tty = None;
    config
}

/// IoUtils answering with `answers`, plus the console to inspect afterwards
pub fn scripted(answers: &[&str]) -> (IoUtils, ScriptedConsole) {
    let console = ScriptedConsole::new(answers);
    (IoUtils::with_console(false, console.clone()), console)
}

pub fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

/// Plugin recording every hook it sees; selected hooks can be made to fail.
#[derive(Clone, Default)]
pub struct RecordingPlugin {
    pub events: Arc<Mutex<Vec<String>>>,
    pub errors: Vec<String>,
    pub fail_pre_commit: bool,
    pub fail_pre_push: bool,
    pub fail_pre_rollback: bool,
}

impl RecordingPlugin {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn outcome(&self, fail: bool) -> Result<()> {
        if fail {
            Err(ReleaseError::failure("Yikes!"))
        } else {
            Ok(())
        }
    }
}

impl ReleasePlugin for RecordingPlugin {
    fn name(&self) -> &str {
        "Recording"
    }

    fn error_check(&self, _root_directory: &Path) -> Option<Vec<String>> {
        Some(self.errors.clone())
    }

    fn pre_release(&self, root_directory: &Path, old_version: &str) -> Result<()> {
        self.record(format!("pre_release({})", old_version));
        git_release::plugins::ensure_no_errors(self.name(), self.error_check(root_directory))
    }

    fn pre_commit(&self, _root: &Path, old_version: &str, new_version: &str) -> Result<()> {
        self.record(format!("pre_commit({}, {})", old_version, new_version));
        self.outcome(self.fail_pre_commit)
    }

    fn pre_push(&self, _root: &Path, old_version: &str, new_version: &str) -> Result<()> {
        self.record(format!("pre_push({}, {})", old_version, new_version));
        self.outcome(self.fail_pre_push)
    }

    fn post_release(
        &self,
        _root: &Path,
        old_version: &str,
        new_version: &str,
        status: ReleaseStatus,
    ) -> Result<()> {
        self.record(format!("post_release({}, {}, {})", old_version, new_version, status));
        Ok(())
    }

    fn pre_rollback(&self, _root: &Path, current_version: &str) -> Result<()> {
        self.record(format!("pre_rollback({})", current_version));
        self.outcome(self.fail_pre_rollback)
    }

    fn post_rollback(&self, _root: &Path, current_version: &str, rollback_to_version: &str) -> Result<()> {
        self.record(format!("post_rollback({}, {})", current_version, rollback_to_version));
        Ok(())
    }
}

/// How a [fake_gpg] answers `--verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeGpg {
    Verifies,
    FailsVerification,
    /// Commit signatures verify, tag signatures do not
    FailsTagVerification,
}

/// A stand-in gpg program: signs anything and answers `--verify` per `behavior`.
/// The arguments of every invocation are appended to `gpg-args.log` in `dir`.
#[cfg(unix)]
pub fn fake_gpg(dir: &Path, behavior: FakeGpg) -> std::path::PathBuf {
    use std::os::unix::fs::PermissionsExt;

    const BAD: &str = "echo \"[GNUPG:] BADSIG ABCDEF0123456789 Release Tester\"; exit 1";
    let reject = match behavior {
        FakeGpg::Verifies => String::new(),
        FakeGpg::FailsVerification => format!("{}\n", BAD),
        FakeGpg::FailsTagVerification => format!("case \"$payload\" in object*) {} ;; esac\n", BAD),
    };

    let script = [
        "#!/bin/sh",
        "echo \"$@\" >> \"$(dirname \"$0\")/gpg-args.log\"",
        "for a in \"$@\"; do",
        "if [ \"$a\" = \"--verify\" ]; then",
        "payload=$(cat)",
        reject.trim_end(),
        "echo \"[GNUPG:] NEWSIG\"",
        "echo \"[GNUPG:] GOODSIG ABCDEF0123456789 Release Tester <release@example.com>\"",
        "echo \"[GNUPG:] VALIDSIG ABCDEF0123456789ABCDEF0123456789ABCDEF01 2024-01-01 1700000000 0 4 0 1 8 00 \
         ABCDEF0123456789ABCDEF0123456789ABCDEF01\"",
        "echo \"[GNUPG:] TRUST_ULTIMATE 0 pgp\"",
        "exit 0",
        "fi",
        "done",
        "cat >/dev/null",
        "printf '\\n[GNUPG:] SIG_CREATED D 1 8 00 1700000000 ABCDEF0123456789ABCDEF0123456789ABCDEF01\\n' >&2",
        "printf -- '-----BEGIN PGP SIGNATURE-----\\n\\nZmFrZQ==\\n=AAAA\\n-----END PGP SIGNATURE-----\\n'",
    ]
    .join("\n");

    let path = dir.join("fake-gpg.sh");
    fs::write(&path, script + "\n").unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Everything the [fake_gpg] in `dir` was invoked with
pub fn gpg_log(dir: &Path) -> String {
    fs::read_to_string(dir.join("gpg-args.log")).unwrap_or_default()
}

/// Run git in `dir`, panicking with its stderr on failure; returns stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// A project like [project], committed in a working copy `work` that tracks a
/// bare `origin.git`, both inside the returned directory.
/// `None` when git is not installed.
pub fn git_project(version: &str, changelog: &str) -> Option<(TempDir, std::path::PathBuf)> {
    which::which("git").ok()?;

    let dir = tempfile::tempdir().unwrap();
    let remote = dir.path().join("origin.git");
    let work = dir.path().join("work");
    fs::create_dir_all(&remote).unwrap();
    fs::create_dir_all(work.join("extra_library")).unwrap();
    fs::write(work.join("extra_library").join("version.txt"), version).unwrap();
    fs::write(work.join("CHANGELOG.txt"), changelog).unwrap();

    git(&remote, &["init", "-q", "--bare"]);
    git(&remote, &["symbolic-ref", "HEAD", "refs/heads/master"]);

    git(&work, &["init", "-q"]);
    git(&work, &["symbolic-ref", "HEAD", "refs/heads/master"]);
    git(&work, &["config", "user.name", "Release Tester"]);
    git(&work, &["config", "user.email", "release@example.com"]);
    git(&work, &["config", "commit.gpgsign", "false"]);
    git(&work, &["config", "tag.gpgsign", "false"]);
    git(&work, &["config", "pull.rebase", "false"]);
    git(&work, &["add", "."]);
    git(&work, &["commit", "-q", "-m", "Initial commit"]);
    git(&work, &["remote", "add", "origin", remote.to_str().unwrap()]);
    git(&work, &["push", "-q", "-u", "origin", "master"]);

    Some((dir, work))
}
