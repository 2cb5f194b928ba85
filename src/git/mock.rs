use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};

use super::{ItemType, Signing, SourceControl};
use crate::error::{ReleaseError, Result};

/// Canned repository state the mock answers from
#[derive(Debug, Clone)]
pub struct MockState {
    pub root: PathBuf,
    pub branch: String,
    pub tracking_remote: bool,
    pub has_changes: bool,
    pub last_commit: String,
    pub commit_title: String,
    pub remote_branches_with_commit: Vec<String>,
    pub remote_branches: BTreeSet<String>,
    pub local_tags: BTreeSet<String>,
    pub remote_tags: BTreeSet<String>,
    pub commit_messages: Vec<String>,
    pub pull_request_url: Option<String>,
    /// Method name to the error message it fails with
    pub failures: HashMap<String, String>,
}

/// Mock source control for testing without a repository.
///
/// Every trait call is recorded as a string such as `commit([a, b], message, signed=false)`;
/// read them back with [calls](Self::calls).
pub struct MockSourceControl {
    state: Mutex<MockState>,
    calls: Mutex<Vec<String>>,
}

impl MockSourceControl {
    /// Create a mock on `master` with a clean working copy
    pub fn new(root: impl Into<PathBuf>) -> Self {
        MockSourceControl {
            state: Mutex::new(MockState {
                root: root.into(),
                branch: "master".to_string(),
                tracking_remote: true,
                has_changes: false,
                last_commit: "a1b2c3d4e5f6".to_string(),
                commit_title: String::new(),
                remote_branches_with_commit: Vec::new(),
                remote_branches: BTreeSet::new(),
                local_tags: BTreeSet::new(),
                remote_tags: BTreeSet::new(),
                commit_messages: Vec::new(),
                pull_request_url: None,
                failures: HashMap::new(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Mutable access to the canned state
    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make `method` fail with `message`
    pub fn fail_on(&self, method: &str, message: &str) {
        self.state()
            .failures
            .insert(method.to_string(), message.to_string());
    }

    /// Recorded calls, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Recorded calls whose method name is `method`
    pub fn calls_to(&self, method: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.split('(').next() == Some(method))
            .collect()
    }

    fn record(&self, method: &str, args: String) -> Result<()> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(format!("{}({})", method, args));

        match self.state().failures.get(method) {
            Some(message) => Err(ReleaseError::source_control(message.clone())),
            None => Ok(()),
        }
    }
}

impl SourceControl for MockSourceControl {
    fn get_version(&self) -> Result<String> {
        self.record("get_version", String::new())?;
        Ok("git version 2.43.0".to_string())
    }

    fn get_root_directory(&self) -> Result<PathBuf> {
        self.record("get_root_directory", String::new())?;
        Ok(self.state().root.clone())
    }

    fn get_branch_name(&self) -> Result<String> {
        self.record("get_branch_name", String::new())?;
        Ok(self.state().branch.clone())
    }

    fn pull_if_tracking_remote(&self) -> Result<bool> {
        self.record("pull_if_tracking_remote", String::new())?;
        Ok(self.state().tracking_remote)
    }

    fn stash_changes(&self) -> Result<bool> {
        self.record("stash_changes", String::new())?;
        Ok(self.state().has_changes)
    }

    fn unstash_changes(&self) -> Result<()> {
        self.record("unstash_changes", String::new())
    }

    fn commit(&self, files: &[PathBuf], message: &str, signing: Option<&Signing>) -> Result<()> {
        let names: Vec<String> = files
            .iter()
            .map(|f| {
                let root = self.state().root.clone();
                f.strip_prefix(&root).unwrap_or(f).display().to_string()
            })
            .collect();
        self.record(
            "commit",
            format!("[{}], {}, signed={}", names.join(", "), message, signing.is_some()),
        )?;

        let mut state = self.state();
        state.commit_title = message.lines().next().unwrap_or_default().to_string();
        state.last_commit = format!("{}0", state.last_commit);
        Ok(())
    }

    fn create_tag(&self, name: &str, message: &str, signing: Option<&Signing>) -> Result<()> {
        self.record(
            "create_tag",
            format!("{}, {}, signed={}", name, message, signing.is_some()),
        )?;
        self.state().local_tags.insert(name.to_string());
        Ok(())
    }

    fn push(&self, name: &str, item_type: ItemType, set_tracking: bool) -> Result<()> {
        self.record("push", format!("{}, {}, {}", name, item_type, set_tracking))?;
        let mut state = self.state();
        match item_type {
            ItemType::Branch => state.remote_branches.insert(name.to_string()),
            ItemType::Tag => state.remote_tags.insert(name.to_string()),
        };
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.record("delete_branch", name.to_string())
    }

    fn create_branch(&self, name: &str, from_ref: Option<&str>, from_item_type: ItemType) -> Result<()> {
        self.record(
            "create_branch",
            format!("{}, {}, {}", name, from_ref.unwrap_or("HEAD"), from_item_type),
        )?;
        self.state().branch = name.to_string();
        Ok(())
    }

    fn checkout_item(&self, name: &str) -> Result<()> {
        self.record("checkout_item", name.to_string())?;
        self.state().branch = name.to_string();
        Ok(())
    }

    fn checkout_remote_branch(&self, name: &str) -> Result<()> {
        self.record("checkout_remote_branch", name.to_string())?;
        self.state().branch = name.to_string();
        Ok(())
    }

    fn branch_exists_remotely(&self, name: &str) -> Result<bool> {
        self.record("branch_exists_remotely", name.to_string())?;
        Ok(self.state().remote_branches.contains(name))
    }

    fn get_remote_branches_with_commit(&self, commit_hash: &str) -> Result<Vec<String>> {
        self.record("get_remote_branches_with_commit", commit_hash.to_string())?;
        Ok(self.state().remote_branches_with_commit.clone())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        self.record("list_tags", String::new())?;
        Ok(self.state().local_tags.iter().cloned().collect())
    }

    fn fetch_remote_tags(&self) -> Result<()> {
        self.record("fetch_remote_tags", String::new())?;
        let mut state = self.state();
        let remote = state.remote_tags.clone();
        state.local_tags.extend(remote);
        Ok(())
    }

    fn tag_exists_locally(&self, name: &str) -> Result<bool> {
        self.record("tag_exists_locally", name.to_string())?;
        Ok(self.state().local_tags.contains(name))
    }

    fn tag_exists_remotely(&self, name: &str) -> Result<bool> {
        self.record("tag_exists_remotely", name.to_string())?;
        Ok(self.state().remote_tags.contains(name))
    }

    fn delete_tag_locally(&self, name: &str) -> Result<()> {
        self.record("delete_tag_locally", name.to_string())?;
        self.state().local_tags.remove(name);
        Ok(())
    }

    fn delete_tag_remotely(&self, name: &str) -> Result<()> {
        self.record("delete_tag_remotely", name.to_string())?;
        self.state().remote_tags.remove(name);
        Ok(())
    }

    fn get_last_commit_identifier(&self) -> Result<String> {
        self.record("get_last_commit_identifier", String::new())?;
        Ok(self.state().last_commit.clone())
    }

    fn get_commit_title(&self, commit_hash: &str) -> Result<String> {
        self.record("get_commit_title", commit_hash.to_string())?;
        Ok(self.state().commit_title.clone())
    }

    fn delete_last_local_commit(&self) -> Result<()> {
        self.record("delete_last_local_commit", String::new())
    }

    fn revert_commit(&self, commit_hash: &str, branch: &str) -> Result<()> {
        self.record("revert_commit", format!("{}, {}", commit_hash, branch))
    }

    fn reset_pending_changes(&self) -> Result<()> {
        self.record("reset_pending_changes", String::new())
    }

    fn gather_commit_messages_since_last_release(&self) -> Result<Vec<String>> {
        self.record("gather_commit_messages_since_last_release", String::new())?;
        Ok(self.state().commit_messages.clone())
    }

    fn open_pull_request(&self, title: &str, base: &str, head: &str) -> Result<Option<String>> {
        self.record("open_pull_request", format!("{}, {}, {}", title, base, head))?;
        Ok(self.state().pull_request_url.clone())
    }
}
