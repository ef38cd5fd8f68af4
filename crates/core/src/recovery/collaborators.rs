//! Seams between the recovery workflow and the outside world.
//!
//! The workflow itself never touches the filesystem, the repository, or the
//! terminal directly; it goes through these traits so that each side effect
//! can be observed (and faked) in isolation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::errors::{DeleteError, StatusLookupError};

/// Whether git already knows a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    /// Untracked, or staged as an addition: not in any commit yet.
    New,
    /// Recorded in history; can be reset in place.
    Tracked,
}

/// The user's answer to "reset and retry?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserChoice {
    Cancel,
    ResetOnly,
    ResetAndDelete,
}

impl std::fmt::Display for UserChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cancel => write!(f, "cancel"),
            Self::ResetOnly => write!(f, "reset_only"),
            Self::ResetAndDelete => write!(f, "reset_and_delete"),
        }
    }
}

/// Classifies a repository-relative path as tracked or new.
pub trait StatusLookup {
    fn status(&self, path: &str) -> Result<FileStatus, StatusLookupError>;
}

/// Removes an untracked file or directory.
pub trait Deleter {
    fn delete(&self, path: &str) -> Result<(), DeleteError>;
}

/// Restores tracked files to their recorded content.
///
/// Called once per recovery with every path to reset. The returned text is
/// shown to the user as-is, error messages included.
pub trait Resetter {
    fn reset(&self, paths: &[String]) -> String;
}

/// Asks the user which recovery to apply.
pub trait ConfirmPrompt {
    fn choose(&self, has_tracked: bool, has_new: bool) -> UserChoice;
}

/// A prompt that always gives the same answer.
///
/// A `ResetAndDelete` answer degrades to `ResetOnly` when there is nothing
/// new to delete, matching what an interactive prompt would offer.
#[derive(Debug, Clone, Copy)]
pub struct FixedChoice(pub UserChoice);

impl ConfirmPrompt for FixedChoice {
    fn choose(&self, _has_tracked: bool, has_new: bool) -> UserChoice {
        match self.0 {
            UserChoice::ResetAndDelete if !has_new => UserChoice::ResetOnly,
            choice => choice,
        }
    }
}

// ---------------------------------------------------------------------------
// Filesystem deleter
// ---------------------------------------------------------------------------

/// Deletes paths relative to a working directory.
#[derive(Debug, Clone)]
pub struct FsDeleter {
    working_dir: PathBuf,
}

impl FsDeleter {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
        }
    }

    /// Resolve a repository-relative name to an absolute path.
    pub fn resolve(&self, name: &str) -> PathBuf {
        self.working_dir.join(name)
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

impl Deleter for FsDeleter {
    #[instrument(skip(self))]
    fn delete(&self, path: &str) -> Result<(), DeleteError> {
        let full = self.resolve(path);
        // Symlinks are removed themselves, never followed.
        let metadata = match std::fs::symlink_metadata(&full) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %full.display(), "nothing to delete");
                return Ok(());
            }
            Err(e) => return Err(DeleteError::from_io(path, e)),
        };

        let result = if metadata.is_dir() {
            std::fs::remove_dir_all(&full)
        } else {
            std::fs::remove_file(&full)
        };

        result.map_err(|e| DeleteError::from_io(path, e))?;
        debug!(path = %full.display(), "deleted");
        Ok(())
    }
}
