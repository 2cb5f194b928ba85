//! The `branch` task: create a version branch from a release tag.
//!
//! A MINOR branch (`1.3.x`) receives patch releases; a MAJOR branch (`1.x.x`)
//! receives minor and patch releases.

use super::{finish, is_yes, print_banner, stash, TaskOptions, TaskOutcome};
use crate::config::Configuration;
use crate::context::TaskContext;
use crate::error::{Halt, ReleaseError, Step};
use crate::git::{ItemType, SourceControl};
use crate::ui::IoUtils;
use crate::version::{Version, VersionBranch};

const CANCEL_MESSAGE: &str = "Canceling branch!";

/// Create a version branch from an existing release tag.
pub fn branch(
    config: &Configuration,
    source: &dyn SourceControl,
    io: IoUtils,
    options: TaskOptions,
) -> TaskOutcome {
    let mut ctx = TaskContext::new(config, io);
    print_banner(&mut ctx);

    let stashed = match stash(source, options.no_stash) {
        Ok(stashed) => stashed,
        Err(halt) => return finish(&mut ctx, source, false, Err(halt), CANCEL_MESSAGE),
    };

    let result = run_branch(&mut ctx, source);
    finish(&mut ctx, source, stashed, result, CANCEL_MESSAGE)
}

fn run_branch(ctx: &mut TaskContext<'_>, source: &dyn SourceControl) -> Step<TaskOutcome> {
    let tag = ctx
        .io
        .prompt("Enter a version tag from which to create a new branch (or \"exit\"):")?;
    if tag.eq_ignore_ascii_case("exit") {
        return Err(Halt::Cancel);
    }

    source.fetch_remote_tags()?;
    if !source.list_tags()?.contains(&tag) {
        return Err(ReleaseError::failure(format!(
            "Version number {} not in the list of available tags.",
            tag
        ))
        .into());
    }

    let version = Version::parse(&tag)?;
    let branch_name = prompt_for_branch_kind(ctx, &tag, &version)?.to_string();

    if ctx.config.use_pull_request {
        check_out_version_branch(ctx, source, &tag, &branch_name)?;
        create_cherry_pick_branch(ctx, source, &branch_name)?;
    } else {
        source.create_branch(&branch_name, Some(&tag), ItemType::Tag)?;
        let answer = ctx.io.prompt_choice(&format!(
            "Branch {} created. Would you like to go ahead and push it to remote? (y/N):",
            branch_name
        ))?;
        if is_yes(&answer) {
            source.push(&branch_name, ItemType::Branch, true)?;
        }
    }

    ctx.io.standard_output("Branch process is complete.");
    Ok(TaskOutcome::Completed)
}

fn prompt_for_branch_kind(
    ctx: &mut TaskContext<'_>,
    tag: &str,
    version: &Version,
) -> Step<VersionBranch> {
    let minor = VersionBranch::Minor(version.major, version.minor);
    let major = VersionBranch::Major(version.major);

    loop {
        let answer = ctx.io.prompt_choice(&format!(
            "Using tag {tag}, would you like to create a minor branch for patch versions (branch name {minor}, \
             recommended), or a major branch for minor versions (branch name {major})? (MINOR/major/exit):",
            tag = tag,
            minor = minor,
            major = major,
        ))?;
        match answer.as_str() {
            "" | "minor" => return Ok(minor),
            "major" => return Ok(major),
            _ => ctx
                .io
                .error_output("Invalid response. Please enter minor, major or exit."),
        }
    }
}

/// In pull-request mode the version branch is shared, so reuse the remote one when it exists.
fn check_out_version_branch(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    tag: &str,
    branch_name: &str,
) -> Step<()> {
    if source.branch_exists_remotely(branch_name)? {
        ctx.io.standard_output(&format!(
            "Branch {} exists on remote. Checking it out into a local tracking branch.",
            branch_name
        ));
        if source.checkout_remote_branch(branch_name).is_err() {
            return Err(ReleaseError::failure(format!(
                "Could not check out a local branch tracking remote branch {b}. Does a local branch named {b} \
                 already exist?\nDelete or rename your local branch {b} and try again, or just pull your local \
                 branch to manually work against it.",
                b = branch_name
            ))
            .into());
        }
    } else {
        ctx.io.standard_output(&format!(
            "Branch {} does not yet exist on remote. Creating new branch and pushing to remote.",
            branch_name
        ));
        source.create_branch(branch_name, Some(tag), ItemType::Tag)?;
        source.push(branch_name, ItemType::Branch, true)?;
    }
    Ok(())
}

fn create_cherry_pick_branch(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    branch_name: &str,
) -> Step<()> {
    let token = ctx.io.prompt(&format!(
        "Now you should create the branch where you will apply your changes. You need a token to uniquely\n\
         identify your feature branch, such as a GitHub or JIRA issue.\n\
         Enter it here to create a branch named `cherry-pick-{}-<entered_token>` (or SKIP to skip this step):",
        branch_name
    ))?;

    if token.is_empty() || token.eq_ignore_ascii_case("skip") {
        return Ok(());
    }
    if token.eq_ignore_ascii_case("exit") {
        return Err(Halt::Cancel);
    }

    let cherry_pick = format!("cherry-pick-{}-{}", branch_name, token);
    source.create_branch(&cherry_pick, None, ItemType::Branch)?;
    ctx.io
        .verbose_output(&format!("Created branch {}", cherry_pick));
    Ok(())
}
