//! Source control abstraction layer
//!
//! This module provides a trait-based abstraction over the repository
//! operations a release needs, so the task state machines can be driven
//! against a real repository or a recording mock.
//!
//! # Overview
//!
//! The primary abstraction is the [SourceControl] trait. The concrete
//! implementations are:
//!
//! - [cli::GitSourceControl]: the `git` command line for anything that mutates
//!   the repository, signs, or talks to a remote, and `git2` for reads
//! - [mock::MockSourceControl]: a mock that records every call, for tests
//!
//! Every operation returns [crate::error::Result]; failures of the underlying
//! command surface as [crate::error::ReleaseError::SourceControl] carrying the
//! command's own output.

pub mod cli;
pub mod github;
pub mod mock;

pub use cli::GitSourceControl;
pub use mock::MockSourceControl;

use std::fmt;
use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{ReleaseError, Result};

/// Disambiguates ref operations that otherwise share syntax
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemType {
    #[default]
    Branch,
    Tag,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemType::Branch => f.write_str("branch"),
            ItemType::Tag => f.write_str("tag"),
        }
    }
}

/// GPG signing parameters for a commit or tag
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Signing {
    /// GPG executable git should sign with, instead of its configured default
    pub program: Option<PathBuf>,
    /// Exported as `GPG_TTY` so gpg-agent can prompt for a passphrase
    pub tty: Option<String>,
    /// Explicit key; `None` signs with the key matching the committer email
    pub key_id: Option<String>,
}

/// Repository operations used by the release tasks.
///
/// ## Error Handling
///
/// Any non-zero exit or unexpected output of the underlying tool is reported as
/// [ReleaseError::SourceControl]. The caller decides whether that aborts the
/// task; the adapter never undoes partial work on its own.
///
/// ## Implementations
///
/// - [GitSourceControl](cli::GitSourceControl): real repositories
/// - [MockSourceControl](mock::MockSourceControl): recorded calls for tests
pub trait SourceControl: Send + Sync {
    /// Version string of the underlying tool, e.g. `git version 2.43.0`
    fn get_version(&self) -> Result<String>;

    /// Top-level directory of the working copy
    fn get_root_directory(&self) -> Result<PathBuf>;

    /// Name of the checked-out branch
    fn get_branch_name(&self) -> Result<String>;

    /// Pull the current branch if it tracks a remote branch.
    ///
    /// # Returns
    /// * `Ok(true)` - A pull was performed
    /// * `Ok(false)` - The branch tracks nothing; nothing was done
    fn pull_if_tracking_remote(&self) -> Result<bool>;

    /// Stash uncommitted changes to tracked files.
    ///
    /// Returns `false` when the working tree was clean and nothing was stashed.
    fn stash_changes(&self) -> Result<bool>;

    /// Restore the most recent stash
    fn unstash_changes(&self) -> Result<()>;

    /// Stage exactly `files` and commit them.
    ///
    /// With `signing`, the commit is GPG-signed and the signature is then
    /// verified. A verification failure is an error even though the commit
    /// exists; the commit is left in place.
    fn commit(&self, files: &[PathBuf], message: &str, signing: Option<&Signing>) -> Result<()>;

    /// Create an annotated tag on HEAD, with the same signing contract as [commit](Self::commit).
    ///
    /// Failing to sign leaves no tag behind; failing to verify leaves the tag in place.
    fn create_tag(&self, name: &str, message: &str, signing: Option<&Signing>) -> Result<()>;

    /// Push a branch or tag to `origin`, optionally setting the branch's upstream
    fn push(&self, name: &str, item_type: ItemType, set_tracking: bool) -> Result<()>;

    fn delete_branch(&self, name: &str) -> Result<()>;

    /// Create and check out branch `name`, from HEAD or from `from_ref`
    fn create_branch(&self, name: &str, from_ref: Option<&str>, from_item_type: ItemType) -> Result<()>;

    /// Check out a branch or tag
    fn checkout_item(&self, name: &str) -> Result<()>;

    /// Create a local branch tracking `origin/<name>` and check it out
    fn checkout_remote_branch(&self, name: &str) -> Result<()>;

    fn branch_exists_remotely(&self, name: &str) -> Result<bool>;

    /// Remote branches containing `commit_hash`, e.g. `origin/master`
    fn get_remote_branches_with_commit(&self, commit_hash: &str) -> Result<Vec<String>>;

    fn list_tags(&self) -> Result<Vec<String>>;

    fn fetch_remote_tags(&self) -> Result<()>;

    fn tag_exists_locally(&self, name: &str) -> Result<bool>;

    fn tag_exists_remotely(&self, name: &str) -> Result<bool>;

    fn delete_tag_locally(&self, name: &str) -> Result<()>;

    fn delete_tag_remotely(&self, name: &str) -> Result<()>;

    /// Full hash of HEAD
    fn get_last_commit_identifier(&self) -> Result<String>;

    /// First line of the commit message
    fn get_commit_title(&self, commit_hash: &str) -> Result<String>;

    /// Drop the HEAD commit, restoring the files it touched to their previous
    /// content while leaving unrelated working-copy changes alone
    fn delete_last_local_commit(&self) -> Result<()>;

    /// Commit the inverse of `commit_hash` and immediately push `branch`
    fn revert_commit(&self, commit_hash: &str, branch: &str) -> Result<()>;

    /// Discard all uncommitted changes to tracked files
    fn reset_pending_changes(&self) -> Result<()>;

    /// Titles of the commits after the most recent release commit, oldest
    /// first, without merge commits. Empty when there is no release commit.
    fn gather_commit_messages_since_last_release(&self) -> Result<Vec<String>>;

    /// Open a pull request from `head` into `base`.
    ///
    /// # Returns
    /// * `Ok(Some(url))` - The pull request was created
    /// * `Ok(None)` - No credentials are configured, or the provider declined
    /// * `Err` - The request could not be sent
    fn open_pull_request(&self, title: &str, base: &str, head: &str) -> Result<Option<String>>;
}

/// Normalize a remote URL into `account/repo`.
///
/// Accepts HTTPS (`https://github.com/acct/repo.git`), SSH
/// (`git@github.com:acct/repo.git`) and local (`file:///path/acct/repo/.git`) forms.
pub fn remote_url_to_github_account_and_repo(url: &str) -> Result<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"^(?:https?://[^/]+/|ssh://[^/]+/|[^@/\s]+@[^:/\s]+:|file://(?:/[^/]+)*?/)([^/\s]+)/([^/\s]+?)(?:\.git)?/?$")
            .expect("valid remote url regex")
    });

    let normalized = url.trim();
    let normalized = normalized
        .strip_suffix("/.git")
        .or_else(|| normalized.strip_suffix("/.git/"))
        .unwrap_or(normalized);

    re.captures(normalized)
        .map(|caps| format!("{}/{}", &caps[1], &caps[2]))
        .ok_or_else(|| {
            ReleaseError::source_control(format!(
                "Could not parse GitHub account and repository from remote URL: {}",
                url
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url_https() {
        assert_eq!(
            remote_url_to_github_account_and_repo("https://github.com/eventbrite/invoke-release.git").unwrap(),
            "eventbrite/invoke-release"
        );
        assert_eq!(
            remote_url_to_github_account_and_repo("https://github.com/eventbrite/invoke-release").unwrap(),
            "eventbrite/invoke-release"
        );
    }

    #[test]
    fn test_remote_url_ssh() {
        assert_eq!(
            remote_url_to_github_account_and_repo("git@github.com:eventbrite/invoke_release.git").unwrap(),
            "eventbrite/invoke_release"
        );
        assert_eq!(
            remote_url_to_github_account_and_repo("ssh://git@github.com/acct/project.git").unwrap(),
            "acct/project"
        );
    }

    #[test]
    fn test_remote_url_file() {
        assert_eq!(
            remote_url_to_github_account_and_repo("file:///path/to/local/repo/").unwrap(),
            "local/repo"
        );
        assert_eq!(
            remote_url_to_github_account_and_repo("file:///Path/To/Local/Repo/.git").unwrap(),
            "Local/Repo"
        );
    }

    #[test]
    fn test_remote_url_invalid() {
        let err = remote_url_to_github_account_and_repo("not a remote path").unwrap_err();
        assert!(matches!(err, ReleaseError::SourceControl(_)));
    }

    #[test]
    fn test_item_type_display() {
        assert_eq!(ItemType::Branch.to_string(), "branch");
        assert_eq!(ItemType::Tag.to_string(), "tag");
        assert_eq!(ItemType::default(), ItemType::Branch);
    }
}
