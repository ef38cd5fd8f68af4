//! Detection of, and recovery from, "would be overwritten by merge" failures.
//!
//! The recovery subsystem is responsible for:
//! 1. **Classification** -- reading git output line by line and collecting
//!    the files git refused to overwrite.
//! 2. **Planning** -- splitting those files into tracked (reset) and new
//!    (optionally deleted).
//! 3. **Execution** -- deleting and resetting, tolerating per-file failures.
//! 4. **Session** -- gating all of the above behind an explicit state machine
//!    that allows at most one recovery at a time.

pub mod classifier;
pub mod collaborators;
pub mod execute;
pub mod plan;
pub mod session;

pub use classifier::{classify_transcript, ClassifierReport, OutputClassifier};
pub use collaborators::{
    ConfirmPrompt, Deleter, FileStatus, FixedChoice, FsDeleter, Resetter, StatusLookup,
    UserChoice,
};
pub use execute::{execute, ExecutionResult};
pub use plan::{build_plan, RecoveryPlan};
pub use session::{RecoveryOutcome, RecoveryReport, RecoverySession, RecoveryState};
