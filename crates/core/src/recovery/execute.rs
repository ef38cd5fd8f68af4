//! Applying a recovery plan to the working tree.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collaborators::{Deleter, Resetter, UserChoice};
use super::plan::RecoveryPlan;
use crate::errors::DeleteError;

/// Outcome of one recovery execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Text returned by the reset, shown to the user unparsed.
    pub output: String,
    /// New paths that could not be deleted because they are in use.
    pub files_in_use: Vec<String>,
    /// New paths that were deleted.
    pub deleted: Vec<String>,
    /// New paths skipped for lack of permission. Not shown to the user.
    pub permission_denied: Vec<String>,
}

impl ExecutionResult {
    /// Whether the original git command should be re-run.
    pub fn should_retry(&self) -> bool {
        self.files_in_use.is_empty()
    }

    /// Warning listing files in use, one bullet per line.
    pub fn in_use_warning(&self) -> Option<String> {
        if self.files_in_use.is_empty() {
            return None;
        }
        let mut msg =
            String::from("The following files are currently in use and will not be reset:");
        for file in &self.files_in_use {
            msg.push('\n');
            msg.push_str("\u{2022} ");
            msg.push_str(file);
        }
        Some(msg)
    }
}

/// Apply `plan` according to the user's `choice`.
///
/// Deletion failures are collected rather than propagated; the reset runs
/// whatever happened to the deletions. Nothing already deleted is restored.
pub fn execute(
    plan: &RecoveryPlan,
    choice: UserChoice,
    deleter: &dyn Deleter,
    resetter: &dyn Resetter,
) -> ExecutionResult {
    let mut result = ExecutionResult::default();

    if choice == UserChoice::Cancel {
        debug!("recovery cancelled before any change");
        return result;
    }

    if choice == UserChoice::ResetAndDelete {
        for path in &plan.delete_candidates {
            match deleter.delete(path) {
                Ok(()) => result.deleted.push(path.clone()),
                Err(DeleteError::Locked { source, .. }) => {
                    warn!(path = %path, error = %source, "file in use, not deleted");
                    result.files_in_use.push(path.clone());
                }
                Err(DeleteError::PermissionDenied { source, .. }) => {
                    warn!(path = %path, error = %source, "permission denied, skipping");
                    result.permission_denied.push(path.clone());
                }
            }
        }
    }

    if plan.has_reset_targets() {
        result.output = resetter.reset(&plan.reset_targets);
    }

    info!(
        %choice,
        reset = plan.reset_targets.len(),
        deleted = result.deleted.len(),
        in_use = result.files_in_use.len(),
        "recovery executed"
    );
    result
}
