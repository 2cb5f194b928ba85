use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use git2::{BranchType, ErrorCode, Repository, StatusOptions};
use regex::Regex;
use tracing::{debug, warn};

use super::{github, ItemType, Signing, SourceControl};
use crate::error::{ReleaseError, Result};

const NO_CAPTURED_OUTPUT: &str = "[No captured output, see stderr above]";

/// Captured result of one `git` invocation
struct GitOutput {
    success: bool,
    code: i32,
    output: String,
}

/// [SourceControl] backed by a Git working copy.
///
/// Mutations, signing and remote traffic go through the `git` executable so
/// the user's own configuration (credential helpers, hooks, `gpg.program`)
/// applies. Local reads use `git2`.
#[derive(Debug, Clone)]
pub struct GitSourceControl {
    root: PathBuf,
    release_message_template: String,
    github_api_url: String,
}

impl GitSourceControl {
    pub fn new(root: impl Into<PathBuf>, release_message_template: impl Into<String>) -> Self {
        GitSourceControl {
            root: root.into(),
            release_message_template: release_message_template.into(),
            github_api_url: github::DEFAULT_API_URL.to_string(),
        }
    }

    /// Point pull request creation at a different GitHub API endpoint
    pub fn with_github_api_url(mut self, url: impl Into<String>) -> Self {
        self.github_api_url = url.into();
        self
    }

    /// Find the top-level directory of the working copy containing `path`
    pub fn find_root(path: &Path) -> Result<PathBuf> {
        let repo = Repository::discover(path)
            .map_err(|_| ReleaseError::source_control("Failed to find Git root directory."))?;
        let workdir = repo
            .workdir()
            .ok_or_else(|| ReleaseError::source_control("Failed to find Git root directory."))?;

        // libgit2 reports the workdir with a trailing separator
        let root = workdir.components().collect::<PathBuf>();
        Ok(root)
    }

    fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.root)?)
    }

    fn exec(&self, args: &[&str], env: &[(&str, &str)]) -> Result<GitOutput> {
        debug!(?args, "running git");

        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .envs(env.iter().copied())
            .output()
            .map_err(|e| {
                ReleaseError::source_control(format!(
                    "Failed to run Git command {:?}.\n{}",
                    command_line(args),
                    e
                ))
            })?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(GitOutput {
            success: output.status.success(),
            code: output.status.code().unwrap_or(-1),
            output: combined,
        })
    }

    fn run(&self, args: &[&str]) -> Result<String> {
        self.run_with_env(args, &[])
    }

    fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Result<String> {
        let result = self.exec(args, env)?;
        if result.success {
            Ok(result.output)
        } else {
            Err(command_failed(args, &result))
        }
    }

    /// Argument prefix and environment for a signed commit or tag
    fn signing_setup(signing: &Signing) -> (Vec<String>, Vec<(&'static str, String)>) {
        let mut prefix = Vec::new();
        if let Some(ref program) = signing.program {
            prefix.push("-c".to_string());
            prefix.push(format!("gpg.program={}", program.display()));
        }

        let mut env = Vec::new();
        if let Some(ref tty) = signing.tty {
            env.push(("GPG_TTY", tty.clone()));
        }
        (prefix, env)
    }

    fn release_commit_pattern(&self) -> Result<Regex> {
        let pattern = regex::escape(&self.release_message_template).replace(r"\{\}", ".+");
        Regex::new(&format!("^{}$", pattern)).map_err(|e| {
            ReleaseError::failure(format!("Invalid release message template: {}", e))
        })
    }

    fn ls_remote(&self, kind: &str, name: &str) -> Result<bool> {
        let output = self.run(&["ls-remote", kind, "origin", name])?;
        Ok(!output.trim().is_empty())
    }

    fn exists_in_head(repo: &Repository, path: &Path) -> Result<bool> {
        let tree = repo.head()?.peel_to_tree()?;
        let exists = match tree.get_path(path) {
            Ok(_) => Ok(true),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        };
        exists
    }

    /// Run a verification command with the same gpg program and TTY the signature was made with
    fn verify_signature(&self, signing: &Signing, verify_args: &[&str]) -> Result<bool> {
        let (mut args, env) = Self::signing_setup(signing);
        args.extend(verify_args.iter().map(|a| a.to_string()));

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();
        Ok(self.exec(&args, &env)?.success)
    }
}

fn command_line(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

fn command_failed(args: &[&str], result: &GitOutput) -> ReleaseError {
    let output = result.output.trim();
    ReleaseError::source_control(format!(
        "Failed to run Git command {:?}.\n{}: {}",
        command_line(args),
        result.code,
        if output.is_empty() { NO_CAPTURED_OUTPUT } else { output }
    ))
}

impl SourceControl for GitSourceControl {
    fn get_version(&self) -> Result<String> {
        Ok(self.run(&["--version"])?.trim().to_string())
    }

    fn get_root_directory(&self) -> Result<PathBuf> {
        let output = self.run(&["rev-parse", "--show-toplevel"])?;
        let root = output.trim();
        if root.is_empty() {
            return Err(ReleaseError::source_control("Failed to find Git root directory."));
        }
        Ok(PathBuf::from(root))
    }

    fn get_branch_name(&self) -> Result<String> {
        let repo = self.repo()?;
        let head = repo.head()?;
        head.shorthand()
            .map(str::to_string)
            .ok_or_else(|| ReleaseError::source_control("Could not determine the current Git branch."))
    }

    fn pull_if_tracking_remote(&self) -> Result<bool> {
        let branch_name = self.get_branch_name()?;
        let repo = self.repo()?;
        let branch = match repo.find_branch(&branch_name, BranchType::Local) {
            Ok(branch) => branch,
            Err(e) if e.code() == ErrorCode::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };

        let tracking = match branch.upstream() {
            Ok(_) => true,
            Err(e) if e.code() == ErrorCode::NotFound => false,
            Err(e) => return Err(e.into()),
        };
        if tracking {
            self.run(&["pull"])?;
        }
        Ok(tracking)
    }

    fn stash_changes(&self) -> Result<bool> {
        let repo = self.repo()?;
        let mut options = StatusOptions::new();
        options.include_untracked(true).include_ignored(false);
        let dirty = !repo.statuses(Some(&mut options))?.is_empty();

        if !dirty {
            return Ok(false);
        }
        self.run(&["stash", "--include-untracked"])?;
        Ok(true)
    }

    fn unstash_changes(&self) -> Result<()> {
        self.run(&["stash", "pop"])?;
        Ok(())
    }

    fn commit(&self, files: &[PathBuf], message: &str, signing: Option<&Signing>) -> Result<()> {
        let file_args: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        let mut add_args = vec!["add", "--"];
        add_args.extend(file_args.iter().map(String::as_str));

        let output = self.run(&add_args)?;
        if !output.trim().is_empty() {
            return Err(ReleaseError::source_control(format!(
                "Failed staging release files for commit: {}",
                output.trim()
            )));
        }

        let Some(signing) = signing else {
            self.run(&["commit", "-m", message])?;
            return Ok(());
        };

        let (mut args, env) = Self::signing_setup(signing);
        args.push("commit".to_string());
        args.push(match signing.key_id {
            Some(ref key) => format!("--gpg-sign={}", key),
            None => "--gpg-sign".to_string(),
        });
        args.push("-m".to_string());
        args.push(message.to_string());

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let result = self.exec(&args, &env)?;
        if !result.success {
            if result.output.contains("gpg failed to sign") {
                return Err(ReleaseError::source_control(format!(
                    "Failed to commit changes due to error signing with GPG. Output:\n{}",
                    result.output.trim()
                )));
            }
            return Err(command_failed(&args, &result));
        }

        let hash = self.get_last_commit_identifier()?;
        if !self.verify_signature(signing, &["verify-commit", &hash])? {
            return Err(ReleaseError::source_control(
                "Successfully committed the release changes, but failed to verify the commit \
                 signature. Please investigate.",
            ));
        }
        Ok(())
    }

    fn create_tag(&self, name: &str, message: &str, signing: Option<&Signing>) -> Result<()> {
        let (mut args, env) = match signing {
            Some(signing) => Self::signing_setup(signing),
            None => (Vec::new(), Vec::new()),
        };
        args.extend(["tag", "-a", name, "-m", message].map(str::to_string));
        if let Some(signing) = signing {
            match signing.key_id {
                Some(ref key) => args.extend(["-u".to_string(), key.clone()]),
                None => args.push("-s".to_string()),
            }
        }

        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let result = self.exec(&args, &env)?;
        let output = result.output.trim();

        if output.contains("unable to sign the tag") {
            return Err(ReleaseError::source_control(format!(
                "Failed tagging release due to error signing with GPG. Output:\n{}",
                output
            )));
        }
        if !result.success {
            return Err(command_failed(&args, &result));
        }
        if !output.is_empty() {
            return Err(ReleaseError::source_control(format!(
                "Failed tagging release: {}",
                output
            )));
        }

        if let Some(signing) = signing {
            if !self.verify_signature(signing, &["verify-tag", name])? {
                return Err(ReleaseError::source_control(
                    "Successfully created a signed release tag, but failed to verify its signature. \
                     Please investigate.",
                ));
            }
        }
        Ok(())
    }

    fn push(&self, name: &str, item_type: ItemType, set_tracking: bool) -> Result<()> {
        let refspec = match item_type {
            ItemType::Branch => format!("{}:{}", name, name),
            ItemType::Tag => format!("refs/tags/{}:refs/tags/{}", name, name),
        };

        let mut args = vec!["push"];
        if set_tracking && item_type == ItemType::Branch {
            args.push("--set-upstream");
        }
        args.extend(["origin", refspec.as_str()]);
        self.run(&args)?;
        Ok(())
    }

    fn delete_branch(&self, name: &str) -> Result<()> {
        self.run(&["branch", "-D", name])?;
        Ok(())
    }

    fn create_branch(&self, name: &str, from_ref: Option<&str>, from_item_type: ItemType) -> Result<()> {
        let start_point = from_ref.map(|r| match from_item_type {
            ItemType::Branch => r.to_string(),
            ItemType::Tag => format!("refs/tags/{}", r),
        });

        let mut args = vec!["checkout", "-b", name];
        if let Some(ref start_point) = start_point {
            args.push(start_point);
        }
        self.run(&args)?;
        Ok(())
    }

    fn checkout_item(&self, name: &str) -> Result<()> {
        self.run(&["checkout", name])?;
        Ok(())
    }

    fn checkout_remote_branch(&self, name: &str) -> Result<()> {
        self.run(&["fetch", "origin", name])?;
        self.run(&["checkout", "--track", &format!("origin/{}", name)])?;
        Ok(())
    }

    fn branch_exists_remotely(&self, name: &str) -> Result<bool> {
        self.ls_remote("--heads", &format!("refs/heads/{}", name))
    }

    fn get_remote_branches_with_commit(&self, commit_hash: &str) -> Result<Vec<String>> {
        let output = self.run(&["branch", "-r", "--contains", commit_hash])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.contains("->"))
            .map(str::to_string)
            .collect())
    }

    fn list_tags(&self) -> Result<Vec<String>> {
        let repo = self.repo()?;
        let tags = repo.tag_names(None)?;
        Ok(tags.iter().flatten().map(str::to_string).collect())
    }

    fn fetch_remote_tags(&self) -> Result<()> {
        self.run(&["fetch", "--tags"])?;
        Ok(())
    }

    fn tag_exists_locally(&self, name: &str) -> Result<bool> {
        let repo = self.repo()?;
        let exists = match repo.find_reference(&format!("refs/tags/{}", name)) {
            Ok(_) => true,
            Err(e) if e.code() == ErrorCode::NotFound || e.code() == ErrorCode::InvalidSpec => false,
            Err(e) => return Err(e.into()),
        };
        Ok(exists)
    }

    fn tag_exists_remotely(&self, name: &str) -> Result<bool> {
        self.ls_remote("--tags", &format!("refs/tags/{}", name))
    }

    fn delete_tag_locally(&self, name: &str) -> Result<()> {
        self.run(&["tag", "-d", name])?;
        Ok(())
    }

    fn delete_tag_remotely(&self, name: &str) -> Result<()> {
        self.run(&["push", "origin", &format!(":refs/tags/{}", name)])?;
        Ok(())
    }

    fn get_last_commit_identifier(&self) -> Result<String> {
        let repo = self.repo()?;
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }

    fn get_commit_title(&self, commit_hash: &str) -> Result<String> {
        let repo = self.repo()?;
        let commit = repo.revparse_single(commit_hash)?.peel_to_commit()?;
        Ok(commit.summary().unwrap_or_default().to_string())
    }

    fn delete_last_local_commit(&self) -> Result<()> {
        let output = self.run(&["diff-tree", "--no-commit-id", "--name-only", "-r", "HEAD"])?;
        let files: Vec<&str> = output.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        self.run(&["reset", "--soft", "HEAD~1"])?;
        if files.is_empty() {
            return Ok(());
        }

        let mut unstage = vec!["reset", "-q", "HEAD", "--"];
        unstage.extend(files.iter().copied());
        self.run(&unstage)?;

        let repo = self.repo()?;
        for file in files {
            if Self::exists_in_head(&repo, Path::new(file))? {
                self.run(&["checkout", "--", file])?;
            } else {
                // Added by the deleted commit
                match fs::remove_file(self.root.join(file)) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => return Err(e.into()),
                }
            }
        }
        Ok(())
    }

    fn revert_commit(&self, commit_hash: &str, branch: &str) -> Result<()> {
        self.run(&["revert", "--no-edit", commit_hash])?;
        self.push(branch, ItemType::Branch, false)
    }

    fn reset_pending_changes(&self) -> Result<()> {
        self.run(&["reset", "--hard"])?;
        Ok(())
    }

    fn gather_commit_messages_since_last_release(&self) -> Result<Vec<String>> {
        let release_commit = self.release_commit_pattern()?;
        let repo = self.repo()?;
        let mut revwalk = repo.revwalk()?;
        revwalk.push_head()?;

        let mut titles = Vec::new();
        let mut found_release = false;
        for oid in revwalk {
            let commit = repo.find_commit(oid?)?;
            let title = commit.summary().unwrap_or_default().trim().to_string();

            if release_commit.is_match(&title) {
                found_release = true;
                break;
            }
            if title.starts_with("Merge") {
                continue;
            }
            titles.push(title);
        }

        if !found_release {
            debug!("no previous release commit found");
            return Ok(Vec::new());
        }

        titles.reverse();
        Ok(titles)
    }

    fn open_pull_request(&self, title: &str, base: &str, head: &str) -> Result<Option<String>> {
        let Some(token) = github::token_from_env() else {
            warn!("{} is not set, not opening a pull request", github::TOKEN_ENV_VAR);
            return Ok(None);
        };

        let repo = self.repo()?;
        let remote = repo.find_remote("origin")?;
        let url = remote
            .url()
            .ok_or_else(|| ReleaseError::source_control("The origin remote URL is not valid UTF-8."))?;
        let account_repo = super::remote_url_to_github_account_and_repo(url)?;

        github::create_pull_request(&self.github_api_url, &token, &account_repo, title, base, head)
    }
}
