//! Task orchestration.
//!
//! Each task is a linear, interactive state machine over a [`SourceControl`]
//! and an [`IoUtils`]:
//!
//! - [`release`](release::release): changelog, version bump, commit, tag, push
//! - [`rollback_release`](rollback::rollback_release): undo the last release commit and tag
//! - [`branch`](branch::branch): create a version branch from a release tag
//! - [`version`](version::version): print what the tool detected about the project
//!
//! Steps return [`Step`], so an operator cancellation and a failure travel the
//! same `?` path and are told apart once, in [`finish`].

pub mod branch;
pub mod release;
pub mod rollback;
pub mod version;

pub use branch::branch;
pub use release::release;
pub use rollback::rollback_release;
pub use version::version;

use tracing::{debug, warn};

use crate::context::TaskContext;
use crate::error::{Halt, Step};
use crate::git::SourceControl;

/// Flags shared by the interactive tasks
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskOptions {
    /// Print `DEBUG:` progress lines
    pub verbose: bool,
    /// Leave uncommitted changes in the working copy instead of stashing them
    pub no_stash: bool,
}

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    /// The task ran to the end
    Completed,
    /// The operator canceled, or declined a confirmation
    Canceled,
    /// A step failed; the error was reported and cleanup ran
    Failed,
    /// A precondition failed before anything was changed
    Aborted,
}

impl TaskOutcome {
    /// Process exit code for this outcome.
    ///
    /// Failures during an active task were already reported interactively, so
    /// only an aborted task exits non-zero.
    pub fn exit_code(self) -> i32 {
        match self {
            TaskOutcome::Aborted => 1,
            _ => 0,
        }
    }
}

/// Message shown when a task runs in a project without a `release.toml`
pub fn not_configured_message(task: &str) -> String {
    format!(
        "Cannot `{}` before the project is configured (no release.toml found).",
        task
    )
}

/// Heading printed when every task starts
pub(crate) fn print_banner(ctx: &mut TaskContext<'_>) {
    ctx.io
        .standard_output(&format!("Invoke Release {}", env!("CARGO_PKG_VERSION")));
}

/// Stash uncommitted changes unless the operator opted out.
pub(crate) fn stash(source: &dyn SourceControl, no_stash: bool) -> Step<bool> {
    if no_stash {
        return Ok(false);
    }
    let stashed = source.stash_changes()?;
    debug!(stashed, "stash");
    Ok(stashed)
}

/// Report how the task body ended and restore stashed changes.
pub(crate) fn finish(
    ctx: &mut TaskContext<'_>,
    source: &dyn SourceControl,
    stashed: bool,
    result: Step<TaskOutcome>,
    cancel_message: &str,
) -> TaskOutcome {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(Halt::Cancel) => {
            ctx.io.standard_output(cancel_message);
            TaskOutcome::Canceled
        }
        Err(Halt::Fail(e)) => {
            ctx.io.error_output(&e.to_string());
            TaskOutcome::Failed
        }
    };

    if stashed {
        if let Err(e) = source.unstash_changes() {
            warn!("unstash failed: {}", e);
            ctx.io.error_output(&e.to_string());
        }
    }

    debug!(?outcome, "task finished");
    outcome
}

/// Whether a y/N style answer is affirmative
pub(crate) fn is_yes(answer: &str) -> bool {
    answer.starts_with('y')
}
