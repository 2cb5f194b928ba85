//! The `rollback-release` task: undo the most recent release.

use tracing::debug;

use super::{finish, is_yes, print_banner, stash, TaskOptions, TaskOutcome};
use crate::config::Configuration;
use crate::context::TaskContext;
use crate::error::{Halt, ReleaseError, Result, Step};
use crate::git::SourceControl;
use crate::plugins;
use crate::ui::IoUtils;
use crate::version::read_project_version;

const CANCEL_MESSAGE: &str = "Canceling release rollback!";

/// Delete the last release's tag and commit, or revert the commit if it was already pushed.
pub fn rollback_release(
    config: &Configuration,
    source: &dyn SourceControl,
    io: IoUtils,
    options: TaskOptions,
) -> TaskOutcome {
    let mut ctx = TaskContext::new(config, io);
    print_banner(&mut ctx);

    let (current_version, branch) = match detect_state(config, source) {
        Ok(state) => state,
        Err(e) => return finish(&mut ctx, source, false, Err(e.into()), CANCEL_MESSAGE),
    };

    if let Err(e) = plugins::pre_rollback(config, &current_version) {
        ctx.io.error_output(&e.to_string());
        return TaskOutcome::Aborted;
    }

    if branch != config.master_branch {
        if let Err(halt) = confirm_rollback_branch(&mut ctx, &branch) {
            return finish(&mut ctx, source, false, Err(halt), CANCEL_MESSAGE);
        }
    }

    let stashed = match stash(source, options.no_stash) {
        Ok(stashed) => stashed,
        Err(halt) => return finish(&mut ctx, source, false, Err(halt), CANCEL_MESSAGE),
    };

    let result = run_rollback(&mut ctx, source, &current_version, &branch);
    finish(&mut ctx, source, stashed, result, CANCEL_MESSAGE)
}

fn detect_state(config: &Configuration, source: &dyn SourceControl) -> Result<(String, String)> {
    let current_version = read_project_version(config)?;
    let branch = source.get_branch_name()?;
    Ok((current_version, branch))
}

fn confirm_rollback_branch(ctx: &mut TaskContext<'_>, branch: &str) -> Step<()> {
    let answer = ctx.io.prompt_choice(&format!(
        "You are currently on branch \"{branch}\" instead of \"{master}.\" Rolling back on a branch other than \
         {master} can be dangerous.\nAre you sure you want to continue rolling back on \"{branch}?\" (y/N):",
        branch = branch,
        master = ctx.config.master_branch,
    ))?;
    if !is_yes(&answer) {
        return Err(Halt::Cancel);
    }
    Ok(())
}

fn run_rollback(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    current_version: &str,
    branch: &str,
) -> Step<TaskOutcome> {
    let config = ctx.config;

    let commit_hash = source.get_last_commit_identifier()?;
    let title = source.get_commit_title(&commit_hash)?;
    if title != config.release_message(current_version) {
        return Err(ReleaseError::failure(
            "Cannot roll back because last commit is not the release commit.",
        )
        .into());
    }

    let remote_branches = source.get_remote_branches_with_commit(&commit_hash)?;
    if remote_branches.len() > 1 {
        return Err(ReleaseError::failure(format!(
            "Cannot roll back because release commit is on multiple remote branches: {}",
            remote_branches.join(", ")
        ))
        .into());
    }
    let on_remote = remote_branches
        .iter()
        .any(|b| *b == format!("origin/{}", branch));
    debug!(%commit_hash, ?remote_branches, on_remote, "release commit located");

    ctx.io.standard_output(&format!(
        "Release tag {} will be deleted locally and remotely (if applicable).",
        current_version
    ));
    let answer = ctx
        .io
        .prompt_choice("Do you want to proceed with deleting this tag? (y/N):")?;
    if !is_yes(&answer) {
        return Err(Halt::Cancel);
    }

    if source.tag_exists_locally(current_version)? {
        source.delete_tag_locally(current_version)?;
    }
    if source.tag_exists_remotely(current_version)? {
        source.delete_tag_remotely(current_version)?;
    }
    ctx.io
        .standard_output("The release tag has been deleted from local and remote (if applicable).");

    if on_remote {
        ctx.io
            .standard_output("The release commit is present on the remote origin.");
        let answer = ctx.io.prompt_choice(
            "Do you want to revert the commit and immediately push it to the remote origin? (y/N):",
        )?;
        if is_yes(&answer) {
            source.revert_commit(&commit_hash, branch)?;
        }
    } else {
        ctx.io.standard_output(
            "The release commit is only present locally, not on the remote origin. Deleting it.",
        );
        source.delete_last_local_commit()?;
    }

    let rolled_back_to = read_project_version(config)?;
    ctx.io
        .verbose_output(&format!("Version is now {}", rolled_back_to));
    plugins::post_rollback(config, current_version, &rolled_back_to);

    Ok(TaskOutcome::Completed)
}
