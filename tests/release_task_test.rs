mod common;

use std::path::PathBuf;

use common::{configure, project, read, scripted, RecordingPlugin, CHANGELOG_WITH_DETAILS, CHANGELOG_WITHOUT_DETAILS};
use git_release::git::MockSourceControl;
use git_release::tasks::{release, TaskOptions, TaskOutcome};

const COMMIT_MESSAGE: &str =
    "Released My Extra Library version 4.6.0\n\nChangelog Details:\n- [MINOR] Added a new widget\n";

fn options() -> TaskOptions {
    TaskOptions {
        verbose: false,
        no_stash: false,
    }
}

#[test]
fn test_release_from_master_pushes_commit_and_tag() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(console.remaining_answers(), 0);
    assert_eq!(
        source.calls(),
        vec![
            "pull_if_tracking_remote()".to_string(),
            "get_branch_name()".to_string(),
            "stash_changes()".to_string(),
            "tag_exists_locally(4.6.0)".to_string(),
            "tag_exists_remotely(4.6.0)".to_string(),
            format!(
                "commit([extra_library/version.txt, CHANGELOG.txt], {}, signed=false)",
                COMMIT_MESSAGE
            ),
            format!("create_tag(4.6.0, {}, signed=false)", COMMIT_MESSAGE),
            "push(master, branch, false)".to_string(),
            "push(4.6.0, tag, false)".to_string(),
        ]
    );
    assert_eq!(
        plugin.events(),
        vec![
            "pre_release(4.5.1)",
            "pre_commit(4.5.1, 4.6.0)",
            "pre_push(4.5.1, 4.6.0)",
            "post_release(4.5.1, 4.6.0, PUSHED)",
        ]
    );

    let prompts = console.prompts();
    assert_eq!(
        prompts[1],
        "According to the changelog message, the next version should be `4.6.0`. \
         Do you want to proceed with the suggested version? (Y/n)"
    );
    assert_eq!(
        prompts[3],
        "Push release changes and tag to remote origin (branch \"master\")? (y/N/rollback):"
    );

    let output = console.output();
    assert!(output.starts_with("Invoke Release "));
    assert!(output.contains("Releasing My Extra Library...\nCurrent version: 4.5.1\n"));
    assert!(output.contains("Releasing My Extra Library version: 4.6.0\n"));
    assert!(output.ends_with("Release process is complete.\n"));

    assert_eq!(read(&config.version_file_name), "4.6.0");
    let changelog = read(&config.changelog_file_name);
    assert!(changelog.starts_with("Changelog\n=========\n\n4.6.0 ("));
    assert!(changelog.contains("- [MINOR] Added a new widget\n\n4.5.1 (2020-04-02)\n"));
}

#[test]
fn test_release_refused_on_feature_branch() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    source.state().branch = "feature-x".to_string();
    let (io, console) = scripted(&[]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert_eq!(
        source.calls(),
        vec!["pull_if_tracking_remote()".to_string(), "get_branch_name()".to_string()]
    );
    assert!(plugin.events().is_empty());

    let output = console.output();
    assert!(output.contains(
        "ERROR: You are currently on branch \"feature-x\" instead of \"master.\" You must release only from \
         master or version branches"
    ));
    assert!(output.ends_with("Canceling release!\n"));
}

#[test]
fn test_release_on_version_branch_declined() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    source.state().branch = "4.5.x".to_string();
    let (io, console) = scripted(&["n"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert!(console.prompts()[0].starts_with(
        "You are currently on branch \"4.5.x\" instead of \"master.\" Are you sure you want to continue releasing"
    ));
    assert!(source.calls_to("stash_changes").is_empty());
    assert!(console.output().ends_with("Canceling release!\n"));
}

#[test]
fn test_release_on_version_branch_rejects_minor_bump() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    source.state().branch = "4.5.x".to_string();
    source.state().has_changes = true;
    let (io, console) = scripted(&["y", "accept", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    assert!(console.output().contains(
        "ERROR: Version 4.6.0 cannot be released from branch 4.5.x; only patch releases are permitted there."
    ));
    assert_eq!(source.calls().last().unwrap(), "unstash_changes()");
    assert_eq!(read(&config.version_file_name), "4.5.1");
}

#[test]
fn test_pre_release_failure_aborts() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin {
        errors: vec!["bad config".to_string()],
        ..RecordingPlugin::default()
    };
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&[]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Aborted);
    assert_eq!(outcome.exit_code(), 1);
    assert!(console
        .output()
        .ends_with("ERROR: The Recording plugin generated the following errors:\nbad config\n"));
    assert!(source.calls_to("stash_changes").is_empty());
}

#[test]
fn test_existing_tag_fails_and_unstashes() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    source.state().has_changes = true;
    source.state().remote_tags.insert("4.6.0".to_string());
    let (io, console) = scripted(&["accept", ""]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    assert!(console.output().contains(
        "ERROR: Tag 4.6.0 already exists locally or remotely (or both). Cannot create version.\n"
    ));
    assert!(source.calls_to("commit").is_empty());
    assert_eq!(source.calls().last().unwrap(), "unstash_changes()");
}

#[test]
fn test_no_stash_skips_stash() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, _console) = scripted(&["accept", "", "n"]);

    let outcome = release(
        &config,
        &source,
        io,
        TaskOptions {
            verbose: false,
            no_stash: true,
        },
    );

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert!(source.calls_to("stash_changes").is_empty());
    assert!(source.calls_to("unstash_changes").is_empty());
}

#[test]
fn test_declining_commit_writes_nothing() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "n"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert_eq!(
        console.prompts()[2],
        "The changes to release files have not yet been committed. Are you ready to commit them? (Y/n):"
    );
    assert!(console.output().ends_with("Canceling release!\n"));
    assert_eq!(read(&config.version_file_name), "4.5.1");
    assert_eq!(read(&config.changelog_file_name), CHANGELOG_WITH_DETAILS);
    assert!(source.calls_to("commit").is_empty());
}

#[test]
fn test_exit_at_manual_version_prompt() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "n", "exit"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert_eq!(console.prompts()[2], "Enter a new version (or \"exit\"):");
    assert!(source.calls_to("tag_exists_locally").is_empty());
}

#[test]
fn test_invalid_manual_version() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["n", "4.5.0"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    assert_eq!(
        console.prompts()[0],
        "Would you like to enter changelog details for this release? (Y/n/exit):"
    );
    assert!(console
        .output()
        .contains("ERROR: New version number 4.5.0 is not greater than current version 4.5.1.\n"));
}

#[test]
fn test_release_without_changelog_details() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, _console) = scripted(&["n", "4.5.2", "y", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(
        source.calls_to("commit"),
        vec![
            "commit([extra_library/version.txt, CHANGELOG.txt], Released My Extra Library version 4.5.2, signed=false)"
                .to_string()
        ]
    );
    let changelog = read(&config.changelog_file_name);
    assert!(changelog.contains("(No changelog details)\n\n4.5.1 (2020-04-02)"));
}

#[test]
fn test_push_declined_prints_manual_commands() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y", "n"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert!(source.calls_to("push").is_empty());
    assert_eq!(source.calls_to("create_tag").len(), 1);
    let output = console.output();
    assert!(output.contains("Make sure you remember to explicitly push master and the tag"));
    assert!(output.contains("    git push origin master:master\n"));
    assert!(output.contains("    git push origin \"refs/tags/4.6.0:refs/tags/4.6.0\"\n"));
    assert_eq!(
        plugin.events().last().unwrap(),
        "post_release(4.5.1, 4.6.0, NOT_PUSHED)"
    );
}

#[test]
fn test_push_rollback_undoes_commit_and_tag() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y", "rollback"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert_eq!(source.calls_to("delete_last_local_commit").len(), 1);
    assert_eq!(
        source.calls_to("delete_tag_locally"),
        vec!["delete_tag_locally(4.6.0)".to_string()]
    );
    assert!(source.calls_to("push").is_empty());
    assert!(console.output().ends_with("Canceling release!\n"));
    assert_eq!(
        plugin.events().last().unwrap(),
        "post_release(4.5.1, 4.6.0, ROLLED_BACK)"
    );
}

#[test]
fn test_interrupted_push_decision_rolls_back() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Canceled);
    assert_eq!(source.calls_to("delete_last_local_commit").len(), 1);
    assert_eq!(source.calls_to("delete_tag_locally").len(), 1);
    assert!(source.calls_to("push").is_empty());
    assert!(console.output().ends_with("Canceling release!\n"));
}

#[test]
fn test_gpg_alternate_key_signs_commit_and_tag() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let mut config = configure(dir.path());
    config.gpg_command = Some(PathBuf::from("/usr/bin/gpg"));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y", "A8D72EF139CC0013", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(
        console.prompts()[3],
        "Would you like to use GPG to sign this release with the key matching your committer email? \
         (y/N/[alternative key ID]):"
    );
    assert!(source.calls_to("commit")[0].ends_with("signed=true)"));
    assert!(source.calls_to("create_tag")[0].ends_with("signed=true)"));
}

#[test]
fn test_gpg_declined_does_not_sign() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let mut config = configure(dir.path());
    config.gpg_command = Some(PathBuf::from("/usr/bin/gpg"));
    let source = MockSourceControl::new(dir.path());
    let (io, _console) = scripted(&["accept", "", "y", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert!(source.calls_to("commit")[0].ends_with("signed=false)"));
}

#[test]
fn test_pre_commit_failure_resets_pending_changes() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin {
        fail_pre_commit: true,
        ..RecordingPlugin::default()
    };
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    assert_eq!(source.calls_to("reset_pending_changes").len(), 1);
    assert!(source.calls_to("commit").is_empty());
    assert!(console.output().ends_with("ERROR: Yikes!\n"));
}

#[test]
fn test_pre_push_failure_with_pull_request_cleans_up_branch() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin {
        fail_pre_push: true,
        ..RecordingPlugin::default()
    };
    let mut config = configure(dir.path());
    config.use_pull_request = true;
    config.plugins.push(Box::new(plugin));
    let source = MockSourceControl::new(dir.path());
    let (io, console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    let calls = source.calls();
    let tail: Vec<&str> = calls[calls.len() - 5..].iter().map(String::as_str).collect();
    assert_eq!(tail[0], "create_branch(invoke-release-master-4.6.0, HEAD, branch)");
    assert!(tail[1].starts_with("commit("));
    assert_eq!(
        &tail[2..],
        &[
            "delete_last_local_commit()",
            "checkout_item(master)",
            "delete_branch(invoke-release-master-4.6.0)",
        ]
    );
    assert!(source.calls_to("create_tag").is_empty());
    assert!(source.calls_to("reset_pending_changes").is_empty());
    assert!(console.output().ends_with("ERROR: Yikes!\n"));
}

#[test]
fn test_pull_request_opened_without_tag() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.use_pull_request = true;
    config.use_tag = false;
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    source.state().pull_request_url = Some("https://github.com/account/project/pull/12".to_string());
    let (io, console) = scripted(&["accept", "", "y", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(
        console.prompts()[3],
        "Push release changes to remote origin (branch \"invoke-release-master-4.6.0\")? (y/N/rollback):"
    );
    assert!(source.calls_to("create_tag").is_empty());

    let calls = source.calls();
    assert_eq!(
        &calls[calls.len() - 4..],
        &[
            "push(invoke-release-master-4.6.0, branch, false)".to_string(),
            "open_pull_request(Released My Extra Library version 4.6.0, master, invoke-release-master-4.6.0)"
                .to_string(),
            "checkout_item(master)".to_string(),
            "delete_branch(invoke-release-master-4.6.0)".to_string(),
        ]
    );
    assert!(console
        .output()
        .ends_with("GitHub PR created successfully. URL: https://github.com/account/project/pull/12\n"));
    assert_eq!(
        plugin.events().last().unwrap(),
        "post_release(4.5.1, 4.6.0, PUSHED)"
    );
}

#[test]
fn test_pull_request_failure_asks_for_manual_pull_request() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let mut config = configure(dir.path());
    config.use_pull_request = true;
    config.use_tag = false;
    let source = MockSourceControl::new(dir.path());
    source.fail_on("open_pull_request", "Could not open Github PR due to error: boom");
    let (io, console) = scripted(&["accept", "", "y", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Completed);
    assert_eq!(source.calls_to("delete_branch").len(), 1);
    let output = console.output();
    assert!(output.contains("ERROR: Could not open Github PR due to error: boom\n"));
    assert!(output.ends_with(
        "You're almost done! The release process will be complete when you manually create a pull request \
         and it is merged.\n"
    ));
}

#[test]
fn test_commit_failure_discards_release_changes() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    source.state().has_changes = true;
    source.fail_on("commit", "Failed to commit changes due to error signing with GPG.");
    let (io, console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    let calls = source.calls();
    let tail: Vec<&str> = calls[calls.len() - 5..].iter().map(String::as_str).collect();
    assert!(tail[0].starts_with("commit("));
    assert_eq!(
        &tail[1..],
        &[
            "get_last_commit_identifier()",
            "get_commit_title(a1b2c3d4e5f6)",
            "reset_pending_changes()",
            "unstash_changes()",
        ]
    );
    assert!(source.calls_to("delete_last_local_commit").is_empty());
    assert!(source.calls_to("create_tag").is_empty());
    assert!(source.calls_to("push").is_empty());
    assert_eq!(plugin.events(), vec!["pre_release(4.5.1)", "pre_commit(4.5.1, 4.6.0)"]);

    let output = console.output();
    assert!(output.contains("ERROR: Failed to commit changes due to error signing with GPG.\n"));
    assert!(output.ends_with("The release changes have been discarded. Nothing was committed or pushed.\n"));
}

#[test]
fn test_unverified_commit_is_deleted_with_pull_request_branch() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let mut config = configure(dir.path());
    config.use_pull_request = true;
    let source = MockSourceControl::new(dir.path());
    // The commit was made before its signature failed to verify
    source.state().commit_title = "Released My Extra Library version 4.6.0".to_string();
    source.fail_on(
        "commit",
        "Successfully committed the release changes, but failed to verify the commit signature. \
         Please investigate.",
    );
    let (io, _console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    let calls = source.calls();
    let tail: Vec<&str> = calls[calls.len() - 6..].iter().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "get_last_commit_identifier()",
            "get_commit_title(a1b2c3d4e5f6)",
            "delete_last_local_commit()",
            "reset_pending_changes()",
            "checkout_item(master)",
            "delete_branch(invoke-release-master-4.6.0)",
        ]
    );
}

#[test]
fn test_tag_failure_deletes_release_commit() {
    let dir = project("4.5.1", CHANGELOG_WITH_DETAILS);
    let plugin = RecordingPlugin::default();
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin.clone()));
    let source = MockSourceControl::new(dir.path());
    source.fail_on("create_tag", "Failed tagging release due to error signing with GPG.");
    let (io, console) = scripted(&["accept", "", "y"]);

    let outcome = release(&config, &source, io, options());

    assert_eq!(outcome, TaskOutcome::Failed);
    let calls = source.calls();
    let tail: Vec<&str> = calls[calls.len() - 4..].iter().map(String::as_str).collect();
    assert!(tail[0].starts_with("commit("));
    assert!(tail[1].starts_with("create_tag(4.6.0, "));
    assert_eq!(&tail[2..], &["tag_exists_locally(4.6.0)", "delete_last_local_commit()"]);
    assert!(source.calls_to("delete_tag_locally").is_empty());
    assert!(source.calls_to("push").is_empty());
    assert_eq!(
        plugin.events(),
        vec!["pre_release(4.5.1)", "pre_commit(4.5.1, 4.6.0)", "pre_push(4.5.1, 4.6.0)"]
    );

    let output = console.output();
    assert!(output.contains("ERROR: Failed tagging release due to error signing with GPG.\n"));
    assert!(output.ends_with("The release commit and tag have been deleted locally. Nothing was pushed.\n"));
}
