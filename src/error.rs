use thiserror::Error;

/// Unified error type for release operations
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed or disallowed version transition, or a missing version file
    #[error("{0}")]
    Version(String),

    /// A git, GPG or hosting-provider operation failed
    #[error("{0}")]
    SourceControl(String),

    /// A business rule rejected the release (hook failure, tag collision, ...)
    #[error("{0}")]
    Failure(String),

    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in git-release
pub type Result<T> = std::result::Result<T, ReleaseError>;

impl ReleaseError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        ReleaseError::Config(msg.into())
    }

    /// Create a version error with context
    pub fn version(msg: impl Into<String>) -> Self {
        ReleaseError::Version(msg.into())
    }

    /// Create a source control error with context
    pub fn source_control(msg: impl Into<String>) -> Self {
        ReleaseError::SourceControl(msg.into())
    }

    /// Create a release failure with context
    pub fn failure(msg: impl Into<String>) -> Self {
        ReleaseError::Failure(msg.into())
    }
}

/// Control signal propagated out of a task step.
///
/// Cancellation is kept apart from failure so the task's top-level handler can
/// print a neutral "canceling" message instead of an error.
#[derive(Debug)]
pub enum Halt {
    /// The operator answered "exit" or interrupted a prompt
    Cancel,
    /// The step failed
    Fail(ReleaseError),
}

impl From<ReleaseError> for Halt {
    fn from(err: ReleaseError) -> Self {
        Halt::Fail(err)
    }
}

impl From<std::io::Error> for Halt {
    fn from(err: std::io::Error) -> Self {
        Halt::Fail(ReleaseError::Io(err))
    }
}

/// Result of a single task step
pub type Step<T> = std::result::Result<T, Halt>;
