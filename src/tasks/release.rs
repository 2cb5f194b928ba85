//! The `release` task.
//!
//! Collects the changelog, picks the next version, writes and commits the
//! version and changelog files, tags the commit and pushes both, or opens a
//! pull request from a temporary branch in pull-request mode.

use tracing::{debug, info};

use super::{finish, is_yes, print_banner, stash, TaskOptions, TaskOutcome};
use crate::changelog::{self, Changelog};
use crate::config::Configuration;
use crate::context::TaskContext;
use crate::error::{Halt, ReleaseError, Result, Step};
use crate::git::{ItemType, SourceControl};
use crate::plugins::{self, ReleaseStatus};
use crate::ui::{Color, IoUtils};
use crate::version::{
    read_project_version, suggest_version, update_version_file, validate_and_normalize_version,
    ReleaseCategory, Version, VersionBranch,
};

const CANCEL_MESSAGE: &str = "Canceling release!";

/// Release a new version of the project.
pub fn release(
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
    debug!(%current_version, %branch, "release starting");

    if branch != config.master_branch {
        if let Err(halt) = confirm_release_branch(&mut ctx, &branch) {
            return finish(&mut ctx, source, false, Err(halt), CANCEL_MESSAGE);
        }
    }

    if let Err(e) = plugins::pre_release(config, &current_version) {
        ctx.io.error_output(&e.to_string());
        return TaskOutcome::Aborted;
    }

    let stashed = match stash(source, options.no_stash) {
        Ok(stashed) => stashed,
        Err(halt) => return finish(&mut ctx, source, false, Err(halt), CANCEL_MESSAGE),
    };

    let result = run_release(&mut ctx, source, &current_version, &branch);
    finish(&mut ctx, source, stashed, result, CANCEL_MESSAGE)
}

fn detect_state(config: &Configuration, source: &dyn SourceControl) -> Result<(String, String)> {
    source.pull_if_tracking_remote()?;
    let current_version = read_project_version(config)?;
    let branch = source.get_branch_name()?;
    Ok((current_version, branch))
}

/// Releasing off the master branch is only allowed from a version branch, and only after confirmation.
fn confirm_release_branch(ctx: &mut TaskContext<'_>, branch: &str) -> Step<()> {
    let master = &ctx.config.master_branch;

    if VersionBranch::parse(branch).is_none() {
        let message = format!(
            "You are currently on branch \"{branch}\" instead of \"{master}.\" You must release only from {master} \
             or version branches, and this does not appear to be a version branch (must match \
             \\d+\\.x\\.x or \\d+.\\d+\\.x).",
            branch = branch,
            master = master,
        );
        ctx.io.error_output(&message);
        return Err(Halt::Cancel);
    }

    let answer = ctx.io.prompt_choice(&format!(
        "You are currently on branch \"{branch}\" instead of \"{master}.\" Are you sure you want to continue \
         releasing from \"{branch}?\" You must do this only from version branches, and only when higher versions \
         have been released from the parent branch. (y/N):",
        branch = branch,
        master = master,
    ))?;
    if !is_yes(&answer) {
        return Err(Halt::Cancel);
    }
    Ok(())
}

fn run_release(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    current_version: &str,
    branch: &str,
) -> Step<TaskOutcome> {
    let config = ctx.config;

    ctx.io
        .standard_output(&format!("Releasing {}...", config.display_name));
    ctx.io
        .standard_output(&format!("Current version: {}", current_version));
    ctx.io.standard_output(
        "First let's compile the changelog, and then we'll select a version to release.",
    );

    let changelog = changelog::prompt_for_changelog(ctx, source)?;
    let new_version = prompt_for_new_version(ctx, current_version, &changelog.message, branch)?;
    let tag = new_version.to_string();

    if source.tag_exists_locally(&tag)? || source.tag_exists_remotely(&tag)? {
        return Err(ReleaseError::failure(format!(
            "Tag {} already exists locally or remotely (or both). Cannot create version.",
            tag
        ))
        .into());
    }

    let answer = ctx.io.prompt_choice(
        "The changes to release files have not yet been committed. Are you ready to commit them? (Y/n):",
    )?;
    if answer.starts_with('n') {
        return Err(Halt::Cancel);
    }

    ctx.io.standard_output(&format!(
        "Releasing {} version: {}",
        config.display_name, tag
    ));

    prompt_for_gpg(ctx)?;

    let temp_branch = config
        .use_pull_request
        .then(|| format!("invoke-release-{}-{}", branch, tag));

    if let Err(e) = write_release_files(ctx, source, &new_version, &changelog, temp_branch.as_deref())
        .and_then(|_| plugins::pre_commit(config, current_version, &tag))
    {
        ctx.io.error_output(&e.to_string());
        source.reset_pending_changes()?;
        if let Some(ref temp) = temp_branch {
            abandon_temporary_branch(source, branch, temp)?;
        }
        return Ok(TaskOutcome::Failed);
    }

    let release_message = config.release_message(&tag);
    let message = commit_message(&release_message, &changelog.message);
    let signing = ctx.signing();

    let mut files = vec![
        config.version_file_name.clone(),
        config.changelog_file_name.clone(),
    ];
    files.extend(plugins::get_extra_files_to_commit(config));
    if let Err(e) = source.commit(&files, &message, signing.as_ref()) {
        ctx.io.error_output(&e.to_string());
        discard_unverified_commit(ctx, source, &release_message)?;
        source.reset_pending_changes()?;
        if let Some(ref temp) = temp_branch {
            abandon_temporary_branch(source, branch, temp)?;
        }
        ctx.io
            .standard_output("The release changes have been discarded. Nothing was committed or pushed.");
        return Ok(TaskOutcome::Failed);
    }

    if let Err(e) = plugins::pre_push(config, current_version, &tag) {
        ctx.io.error_output(&e.to_string());
        source.delete_last_local_commit()?;
        if let Some(ref temp) = temp_branch {
            abandon_temporary_branch(source, branch, temp)?;
        }
        return Ok(TaskOutcome::Failed);
    }

    if config.use_tag {
        if let Err(e) = source.create_tag(&tag, &message, signing.as_ref()) {
            ctx.io.error_output(&e.to_string());
            // A tag whose signature failed verification still exists
            if source.tag_exists_locally(&tag)? {
                source.delete_tag_locally(&tag)?;
            }
            source.delete_last_local_commit()?;
            if let Some(ref temp) = temp_branch {
                abandon_temporary_branch(source, branch, temp)?;
            }
            ctx.io.standard_output(
                "The release commit and tag have been deleted locally. Nothing was pushed.",
            );
            return Ok(TaskOutcome::Failed);
        }
    }

    let push_branch = temp_branch.as_deref().unwrap_or(branch);
    let question = if config.use_tag {
        format!(
            "Push release changes and tag to remote origin (branch \"{}\")? (y/N/rollback):",
            push_branch
        )
    } else {
        format!(
            "Push release changes to remote origin (branch \"{}\")? (y/N/rollback):",
            push_branch
        )
    };

    // An interrupted push decision rolls back rather than leaving a half-released state
    let answer = ctx
        .io
        .ask(&question)?
        .map(|a| a.to_lowercase())
        .unwrap_or_else(|| "rollback".to_string());

    if answer == "rollback" {
        source.delete_last_local_commit()?;
        if config.use_tag {
            source.delete_tag_locally(&tag)?;
        }
        if let Some(ref temp) = temp_branch {
            abandon_temporary_branch(source, branch, temp)?;
        }
        ctx.io.standard_output(CANCEL_MESSAGE);
        plugins::post_release(config, current_version, &tag, ReleaseStatus::RolledBack);
        return Ok(TaskOutcome::Canceled);
    }

    if !is_yes(&answer) {
        ctx.io
            .print_output(Color::RedBold, &manual_push_instructions(push_branch, config.use_tag.then_some(tag.as_str())));
        plugins::post_release(config, current_version, &tag, ReleaseStatus::NotPushed);
        return Ok(TaskOutcome::Completed);
    }

    match temp_branch {
        Some(temp) => {
            source.push(&temp, ItemType::Branch, false)?;
            if config.use_tag {
                source.push(&tag, ItemType::Tag, false)?;
            }

            let pull_request = source.open_pull_request(&release_message, branch, &temp);
            source.checkout_item(branch)?;
            source.delete_branch(&temp)?;

            match pull_request {
                Ok(Some(url)) => {
                    info!(%url, "pull request opened");
                    ctx.io
                        .standard_output(&format!("GitHub PR created successfully. URL: {}", url));
                }
                failed => {
                    if let Err(e) = failed {
                        ctx.io.error_output(&e.to_string());
                    }
                    ctx.io.standard_output(
                        "You're almost done! The release process will be complete when you manually create a \
                         pull request and it is merged.",
                    );
                }
            }
        }
        None => {
            source.push(branch, ItemType::Branch, false)?;
            if config.use_tag {
                source.push(&tag, ItemType::Tag, false)?;
            }
            ctx.io.standard_output("Release process is complete.");
        }
    }

    plugins::post_release(config, current_version, &tag, ReleaseStatus::Pushed);
    Ok(TaskOutcome::Completed)
}

/// Suggest a version from the changelog categories, falling back to asking for one.
fn prompt_for_new_version(
    ctx: &mut TaskContext<'_>,
    current_version: &str,
    message: &[String],
    branch: &str,
) -> Step<Version> {
    let category = ReleaseCategory::detect_from_changelog(message);
    let mut candidate = None;

    if let Some(suggested) = suggest_version(current_version, category)? {
        let answer = ctx.io.prompt_choice(&format!(
            "According to the changelog message, the next version should be `{}`. \
             Do you want to proceed with the suggested version? (Y/n)",
            suggested
        ))?;
        if !answer.starts_with('n') {
            candidate = Some(suggested);
        }
    }

    let candidate = match candidate {
        Some(candidate) => candidate,
        None => {
            let answer = ctx.io.prompt("Enter a new version (or \"exit\"):")?;
            if answer.eq_ignore_ascii_case("exit") {
                return Err(Halt::Cancel);
            }
            answer
        }
    };

    Ok(validate_and_normalize_version(
        current_version,
        &candidate,
        Some(branch),
    )?)
}

/// Ask whether to sign the release, when GPG is available.
///
/// Answers: `y` signs with the committer's key, a key ID signs with that key,
/// anything else (including nothing) does not sign.
fn prompt_for_gpg(ctx: &mut TaskContext<'_>) -> Step<()> {
    if ctx.config.gpg_command.is_none() {
        return Ok(());
    }

    let answer = ctx.io.prompt(
        "You have GPG installed on your system and your source control supports signing commits and tags.\n\
         Would you like to use GPG to sign this release with the key matching your committer email? \
         (y/N/[alternative key ID]):",
    )?;

    match answer.to_lowercase().as_str() {
        "exit" => return Err(Halt::Cancel),
        "" | "n" | "no" => {}
        "y" | "yes" => ctx.use_gpg = true,
        _ => {
            ctx.use_gpg = true;
            ctx.gpg_alternate_id = Some(answer);
        }
    }
    debug!(use_gpg = ctx.use_gpg, key = ?ctx.gpg_alternate_id, "gpg");
    Ok(())
}

fn write_release_files(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    new_version: &Version,
    changelog: &Changelog,
    temp_branch: Option<&str>,
) -> Result<()> {
    let version = new_version.to_string();
    update_version_file(ctx.config, new_version)?;
    changelog::write_to_changelog_file(ctx, &version, changelog)?;

    if let Some(temp) = temp_branch {
        ctx.io
            .verbose_output(&format!("Creating release branch {}", temp));
        source.create_branch(temp, None, ItemType::Branch)?;
    }
    Ok(())
}

/// Drop the release commit left behind when committing failed after the commit was made
/// (a signature that could not be verified).
fn discard_unverified_commit(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    release_message: &str,
) -> Result<()> {
    let head = source.get_last_commit_identifier()?;
    if source.get_commit_title(&head)? == release_message {
        source.delete_last_local_commit()?;
        ctx.io.verbose_output(&format!("Deleted unverified release commit {}", head));
    }
    Ok(())
}

/// Return to `branch` and drop the temporary pull-request branch
fn abandon_temporary_branch(source: &dyn SourceControl, branch: &str, temp: &str) -> Result<()> {
    source.checkout_item(branch)?;
    source.delete_branch(temp)
}

/// The release commit and tag message.
pub fn commit_message(release_message: &str, changelog_message: &[String]) -> String {
    if changelog_message.is_empty() {
        return release_message.to_string();
    }

    let mut message = format!("{}\n\nChangelog Details:\n", release_message);
    for line in changelog_message {
        message.push_str(line);
        message.push('\n');
    }
    message
}

fn manual_push_instructions(branch: &str, tag: Option<&str>) -> String {
    match tag {
        Some(tag) => format!(
            "Make sure you remember to explicitly push {branch} and the tag (or revert your local changes if \
             you are trying to cancel)! You can push with the following commands:\n    \
             git push origin {branch}:{branch}\n    \
             git push origin \"refs/tags/{tag}:refs/tags/{tag}\"\n",
            branch = branch,
            tag = tag,
        ),
        None => format!(
            "Make sure you remember to explicitly push {branch} (or revert your local changes if you are \
             trying to cancel)! You can push with the following command:\n    \
             git push origin {branch}:{branch}\n",
            branch = branch,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_message_with_details() {
        let message = commit_message(
            "Released My Extra Library version 4.6.0",
            &["- Message 1".to_string(), "- Message 2".to_string()],
        );
        assert_eq!(
            message,
            "Released My Extra Library version 4.6.0\n\nChangelog Details:\n- Message 1\n- Message 2\n"
        );
    }

    #[test]
    fn test_commit_message_without_details() {
        assert_eq!(
            commit_message("Released My Extra Library version 4.6.0", &[]),
            "Released My Extra Library version 4.6.0"
        );
    }

    #[test]
    fn test_manual_push_instructions() {
        let with_tag = manual_push_instructions("master", Some("4.6.0"));
        assert!(with_tag.contains("push master and the tag"));
        assert!(with_tag.contains("\n    git push origin master:master\n"));
        assert!(with_tag.ends_with("    git push origin \"refs/tags/4.6.0:refs/tags/4.6.0\"\n"));

        let without_tag = manual_push_instructions("4.5.x", None);
        assert!(without_tag.contains("the following command:\n    git push origin 4.5.x:4.5.x\n"));
        assert!(!without_tag.contains("refs/tags"));
    }
}
