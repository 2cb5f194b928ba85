//! Interactive, changelog-driven release workflow for git repositories.
//!
//! The [`tasks`] run as linear state machines over a [`git::SourceControl`]
//! and an [`ui::IoUtils`], so every prompt and repository operation can be
//! scripted in tests.

pub mod changelog;
pub mod config;
pub mod context;
pub mod error;
pub mod git;
pub mod plugins;
pub mod tasks;
pub mod ui;
pub mod version;

pub use config::{Configuration, ReleaseSettings};
pub use error::{Halt, ReleaseError, Result, Step};
pub use tasks::{TaskOptions, TaskOutcome};
