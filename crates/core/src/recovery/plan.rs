//! Partitioning of conflicting paths into reset and delete sets.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::collaborators::{FileStatus, StatusLookup};

/// What a single recovery attempt will touch.
///
/// Built fresh for every attempt and discarded afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPlan {
    /// Tracked paths, reset together in one call.
    pub reset_targets: Vec<String>,
    /// New paths, deleted only when the user asks for it.
    pub delete_candidates: Vec<String>,
    /// Paths whose status could not be determined; left alone.
    pub lookup_failures: Vec<String>,
}

impl RecoveryPlan {
    pub fn has_reset_targets(&self) -> bool {
        !self.reset_targets.is_empty()
    }

    pub fn has_delete_candidates(&self) -> bool {
        !self.delete_candidates.is_empty()
    }

    /// True when there is nothing to reset and nothing to delete.
    pub fn is_empty(&self) -> bool {
        self.reset_targets.is_empty() && self.delete_candidates.is_empty()
    }
}

/// Classify each path through `lookup`.
///
/// Order is preserved and repeated paths are planned once. A failed lookup
/// excludes that path only; the rest of the plan is still built.
pub fn build_plan(paths: &[String], lookup: &dyn StatusLookup) -> RecoveryPlan {
    let mut plan = RecoveryPlan::default();

    for path in paths {
        if plan.reset_targets.contains(path)
            || plan.delete_candidates.contains(path)
            || plan.lookup_failures.contains(path)
        {
            continue;
        }

        match lookup.status(path) {
            Ok(FileStatus::New) => {
                debug!(path = %path, "planned for deletion");
                plan.delete_candidates.push(path.clone());
            }
            Ok(FileStatus::Tracked) => {
                debug!(path = %path, "planned for reset");
                plan.reset_targets.push(path.clone());
            }
            Err(e) => {
                warn!(path = %path, error = %e, "status lookup failed, excluding path");
                plan.lookup_failures.push(path.clone());
            }
        }
    }

    info!(
        reset = plan.reset_targets.len(),
        delete = plan.delete_candidates.len(),
        excluded = plan.lookup_failures.len(),
        "recovery plan built"
    );
    plan
}
