//! Error types for the gitrecover core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Failures that happen *inside* a recovery (status lookups, deletions) are
//! not errors at this level: they are caught per path and aggregated into
//! the recovery result. Only misuse of the recovery session surfaces as
//! [`RecoveryError`].

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Process(#[from] ProcessError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Recovery(#[from] RecoveryError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Process errors
// ---------------------------------------------------------------------------

/// Errors from spawning and streaming the git executable.
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The executable was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// The process could not be started.
    #[error("failed to spawn '{program}': {source}")]
    SpawnFailed {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Reading output or writing input failed mid-stream.
    #[error("process I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from local repository (git2) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// The path does not exist or is not inside a git repository.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// The repository has no working directory (bare repository).
    #[error("repository at '{0}' has no working tree")]
    BareRepository(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),
}

// ---------------------------------------------------------------------------
// Per-path recovery failures
// ---------------------------------------------------------------------------

/// Failure to determine whether a path is tracked or new.
///
/// Recoverable: the path is excluded from the recovery plan.
#[derive(Debug, Error)]
pub enum StatusLookupError {
    /// Git does not know the path and it is not on disk.
    #[error("no status for '{0}'")]
    NotFound(String),

    /// libgit2 rejected the lookup (ambiguous path, unreadable index, ...).
    #[error("status lookup failed for '{path}': {source}")]
    Git2 {
        path: String,
        #[source]
        source: git2::Error,
    },
}

/// Failure to delete an untracked file or directory.
///
/// Both kinds are recoverable; they differ only in how they are reported.
#[derive(Debug, Error)]
pub enum DeleteError {
    /// The file is held open elsewhere or another I/O error occurred.
    #[error("'{path}' is in use: {source}")]
    Locked {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The process lacks permission to remove the path.
    #[error("permission denied deleting '{path}': {source}")]
    PermissionDenied {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DeleteError {
    /// Classify an I/O error raised while deleting `path`.
    pub fn from_io(path: impl Into<String>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path, source },
            _ => Self::Locked { path, source },
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery session errors
// ---------------------------------------------------------------------------

/// Errors from driving the recovery session out of order.
#[derive(Debug, Error)]
pub enum RecoveryError {
    /// `recover` was called while no recovery is on offer.
    #[error("no recovery is currently offered (state: {state})")]
    NotOffered { state: String },

    /// Another recovery is executing against the same session.
    #[error("a recovery is already in progress")]
    AlreadyRunning,

    /// Files in use were reported and the user has not dismissed them yet.
    #[error("files in use must be acknowledged before another attempt")]
    AwaitingAcknowledgement,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}
