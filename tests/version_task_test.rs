mod common;

use std::fs;

use common::{configure, project, RecordingPlugin, CHANGELOG_WITHOUT_DETAILS};
use git_release::git::MockSourceControl;
use git_release::tasks::{version, TaskOutcome};
use git_release::ui::{IoUtils, ScriptedConsole};

#[test]
fn test_version_reports_detected_project() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let console = ScriptedConsole::new(&[]);
    let io = IoUtils::with_console(false, console.clone());

    let outcome = version(&config, &source, io);

    assert_eq!(outcome, TaskOutcome::Completed);
    let output = console.output();
    assert!(output.starts_with("Source control: git version 2.43.0\n"));
    assert!(output.contains(&format!("Invoke Release: {}\n", env!("CARGO_PKG_VERSION"))));
    assert!(output.contains("Detected Project: My Extra Library 4.5.1\n"));
    assert!(output.contains("Detected Git branch: master\n"));
    assert!(output.contains("version.txt\n"));
    assert!(output.contains("CHANGELOG.txt\n"));
    assert!(!output.contains("DEBUG: "));
    assert!(!output.contains("ERROR: "));
}

#[test]
fn test_version_verbose_details() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    let console = ScriptedConsole::new(&[]);
    let io = IoUtils::with_console(true, console.clone());

    version(&config, &source, io);

    let output = console.output();
    assert!(output.contains("DEBUG: GPG: Not installed (won't be used)\n"));
    assert!(output.contains("DEBUG: TTY: None detected\n"));
    assert!(output.contains("DEBUG: Release commit message template: \"Released My Extra Library version {}\"\n"));
}

#[test]
fn test_version_reports_missing_files_and_plugin_errors() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let plugin = RecordingPlugin {
        errors: vec!["Plugin is misconfigured".to_string()],
        ..RecordingPlugin::default()
    };
    let mut config = configure(dir.path());
    config.plugins.push(Box::new(plugin));
    fs::remove_file(dir.path().join("CHANGELOG.txt")).unwrap();
    fs::remove_file(dir.path().join("extra_library").join("version.txt")).unwrap();
    let source = MockSourceControl::new(dir.path());
    let console = ScriptedConsole::new(&[]);
    let io = IoUtils::with_console(false, console.clone());

    let outcome = version(&config, &source, io);

    assert_eq!(outcome, TaskOutcome::Completed);
    let output = console.output();
    assert!(output.contains("Detected Project: My Extra Library [Error: Could not read version: "));
    assert!(output.contains("ERROR: Version file "));
    assert!(output.contains("Changelog file "));
    assert!(output.contains("ERROR: Plugin is misconfigured\n"));
}

#[test]
fn test_version_reports_source_control_errors() {
    let dir = project("4.5.1", CHANGELOG_WITHOUT_DETAILS);
    let config = configure(dir.path());
    let source = MockSourceControl::new(dir.path());
    source.fail_on("get_branch_name", "not a git repository");
    let console = ScriptedConsole::new(&[]);
    let io = IoUtils::with_console(false, console.clone());

    version(&config, &source, io);

    assert!(console
        .output()
        .contains("Detected Git branch: [Error: "));
}
