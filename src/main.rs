use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use git_release::config::{self, Configuration};
use git_release::git::{github, GitSourceControl};
use git_release::tasks::{self, TaskOptions};
use git_release::ui::IoUtils;

#[derive(Parser)]
#[command(
    name = "git-release",
    version,
    about = "Release a project with a changelog, a version bump and a git tag"
)]
struct Args {
    #[arg(short, long, global = true, help = "Custom configuration file path")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Release a new version of the project
    Release(TaskArgs),

    /// Roll back the most recent release commit and tag
    #[command(name = "rollback-release")]
    RollbackRelease(TaskArgs),

    /// Create a version branch from a release tag
    Branch(TaskArgs),

    /// Show the detected tool, repository and project details
    Version {
        #[arg(short, long, help = "Show debug output")]
        verbose: bool,
    },
}

#[derive(clap::Args)]
struct TaskArgs {
    #[arg(short, long, help = "Show debug output")]
    verbose: bool,

    #[arg(long, help = "Leave uncommitted changes in place instead of stashing them")]
    no_stash: bool,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Release(_) => "release",
            Command::RollbackRelease(_) => "rollback_release",
            Command::Branch(_) => "branch",
            Command::Version { .. } => "version",
        }
    }

    fn verbose(&self) -> bool {
        match self {
            Command::Release(a) | Command::RollbackRelease(a) | Command::Branch(a) => a.verbose,
            Command::Version { verbose } => *verbose,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    let verbose = args.command.verbose();
    init_tracing(verbose);

    let mut io = IoUtils::new(verbose);

    let cwd = std::env::current_dir().context("Could not determine the current directory")?;
    let root = match GitSourceControl::find_root(&cwd) {
        Ok(root) => root,
        Err(e) => io.error_output_exit(&e.to_string()),
    };

    let settings = match config::load_settings(args.config.as_deref(), Some(&root)) {
        Ok(Some(settings)) => settings,
        Ok(None) => io.error_output_exit(&tasks::not_configured_message(args.command.name())),
        Err(e) => io.error_output_exit(&e.to_string()),
    };

    let config = match Configuration::configure(settings, &root) {
        Ok(config) => config,
        Err(e) => io.error_output_exit(&e.to_string()),
    };

    let mut source = GitSourceControl::new(&config.root_directory, &config.release_message_template);
    if let Ok(api_url) = std::env::var(github::API_URL_ENV_VAR) {
        source = source.with_github_api_url(api_url);
    }

    let outcome = match args.command {
        Command::Release(a) => tasks::release(&config, &source, io, options(&a)),
        Command::RollbackRelease(a) => tasks::rollback_release(&config, &source, io, options(&a)),
        Command::Branch(a) => tasks::branch(&config, &source, io, options(&a)),
        Command::Version { .. } => tasks::version(&config, &source, io),
    };

    process::exit(outcome.exit_code())
}

fn options(args: &TaskArgs) -> TaskOptions {
    TaskOptions {
        verbose: args.verbose,
        no_stash: args.no_stash,
    }
}
