//! The "reset and retry" affordance as an explicit state machine.
//!
//! ```text
//! Idle --(git aborted after listing files)--> Offered
//! Offered --(recover)--> Planning --> Executing --> Retrying
//!                                             \--> AwaitingUserAck --(acknowledge)--> Offered
//! Planning --(user cancels)--> Offered
//! ```
//!
//! A session lives across process attempts. Each attempt gets a fresh
//! [`OutputClassifier`], and each recovery builds a fresh [`RecoveryPlan`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::classifier::OutputClassifier;
use super::collaborators::{ConfirmPrompt, Deleter, Resetter, StatusLookup, UserChoice};
use super::execute::{execute, ExecutionResult};
use super::plan::{build_plan, RecoveryPlan};
use crate::errors::RecoveryError;
use crate::process::{OutputLine, ProcessExit, Stream};

/// Where the recovery affordance currently stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryState {
    Idle,
    Offered,
    Planning,
    Executing,
    Retrying,
    AwaitingUserAck(Vec<String>),
}

impl std::fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Offered => write!(f, "offered"),
            Self::Planning => write!(f, "planning"),
            Self::Executing => write!(f, "executing"),
            Self::Retrying => write!(f, "retrying"),
            Self::AwaitingUserAck(_) => write!(f, "awaiting_user_ack"),
        }
    }
}

/// Everything one executed recovery did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub plan: RecoveryPlan,
    pub choice: UserChoice,
    pub result: ExecutionResult,
}

/// How a call to [`RecoverySession::recover`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// The user declined; the offer stands.
    Cancelled,
    /// Every collected path failed its status lookup.
    NothingToRecover(RecoveryPlan),
    /// Recovery succeeded; re-run the original command.
    Retry(RecoveryReport),
    /// Some files were in use; the user must acknowledge them first.
    AwaitingAcknowledgement(RecoveryReport),
}

/// Drives classification and recovery for one git command.
#[derive(Debug)]
pub struct RecoverySession {
    classifier: OutputClassifier,
    state: RecoveryState,
    attempts: u32,
    /// Held while a recovery is planning or executing. `&mut self` already
    /// serialises one session; the flag spans every session sharing it.
    in_flight: Arc<AtomicBool>,
}

impl Default for RecoverySession {
    fn default() -> Self {
        Self::new()
    }
}

impl RecoverySession {
    pub fn new() -> Self {
        Self {
            classifier: OutputClassifier::new(),
            state: RecoveryState::Idle,
            attempts: 0,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A session that shares its in-flight guard with others working on the
    /// same tree, so at most one of them recovers at a time.
    pub fn with_guard(guard: Arc<AtomicBool>) -> Self {
        Self {
            in_flight: guard,
            ..Self::new()
        }
    }

    /// The in-flight guard, for handing to [`Self::with_guard`].
    pub fn guard(&self) -> Arc<AtomicBool> {
        self.in_flight.clone()
    }

    pub fn state(&self) -> &RecoveryState {
        &self.state
    }

    /// Number of process attempts started so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_offered(&self) -> bool {
        self.state == RecoveryState::Offered
    }

    /// Check if a recovery is currently planning or executing.
    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn classifier(&self) -> &OutputClassifier {
        &self.classifier
    }

    /// Paths the current attempt's output listed.
    pub fn collected_paths(&self) -> &[String] {
        self.classifier.collected_paths()
    }

    /// Prepare for a new run of the git process.
    pub fn start_attempt(&mut self) -> Result<(), RecoveryError> {
        if matches!(self.state, RecoveryState::AwaitingUserAck(_)) {
            return Err(RecoveryError::AwaitingAcknowledgement);
        }
        self.attempts += 1;
        self.classifier = OutputClassifier::new();
        self.state = RecoveryState::Idle;
        debug!(attempt = self.attempts, "starting attempt");
        Ok(())
    }

    /// Forward one line of process output to the classifier.
    pub fn feed_line(&mut self, line: &str) {
        self.classifier.feed_line(line);
    }

    /// Forward a streamed line, keeping only stderr.
    ///
    /// git prints the overwrite blocks on stderr, while stdout is buffered
    /// separately and can surface in the middle of a block.
    pub fn feed_output(&mut self, line: &OutputLine) {
        match line.stream {
            Stream::Stderr => self.classifier.feed_line(&line.text),
            Stream::Stdout => {}
        }
    }

    /// Record that the process exited. Returns whether recovery is offered.
    pub fn finish_attempt(&mut self, exit: &ProcessExit) -> bool {
        if self.classifier.has_recoverable_conflict() {
            info!(
                code = ?exit.code,
                paths = self.classifier.collected_paths().len(),
                "overwrite conflict detected, offering recovery"
            );
            self.state = RecoveryState::Offered;
            true
        } else {
            debug!(code = ?exit.code, "no recoverable conflict");
            self.state = RecoveryState::Idle;
            false
        }
    }

    /// Plan, confirm, and execute a recovery.
    ///
    /// Only valid while [`RecoveryState::Offered`]. Blocking: call it after
    /// the process has exited, off any line-delivery path.
    pub fn recover(
        &mut self,
        lookup: &dyn StatusLookup,
        prompt: &dyn ConfirmPrompt,
        deleter: &dyn Deleter,
        resetter: &dyn Resetter,
    ) -> Result<RecoveryOutcome, RecoveryError> {
        if self.state != RecoveryState::Offered {
            return Err(RecoveryError::NotOffered {
                state: self.state.to_string(),
            });
        }

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RecoveryError::AlreadyRunning);
        }
        let _guard = InFlightGuard(self.in_flight.clone());

        self.state = RecoveryState::Planning;
        let plan = build_plan(self.classifier.collected_paths(), lookup);

        if plan.is_empty() {
            warn!(
                excluded = plan.lookup_failures.len(),
                "no collected path could be classified, nothing to recover"
            );
            self.state = RecoveryState::Idle;
            return Ok(RecoveryOutcome::NothingToRecover(plan));
        }

        let choice = prompt.choose(plan.has_reset_targets(), plan.has_delete_candidates());
        if choice == UserChoice::Cancel {
            info!("recovery declined");
            self.state = RecoveryState::Offered;
            return Ok(RecoveryOutcome::Cancelled);
        }

        self.state = RecoveryState::Executing;
        let result = execute(&plan, choice, deleter, resetter);

        let report = RecoveryReport {
            plan,
            choice,
            result,
        };
        if report.result.should_retry() {
            self.state = RecoveryState::Retrying;
            Ok(RecoveryOutcome::Retry(report))
        } else {
            self.state = RecoveryState::AwaitingUserAck(report.result.files_in_use.clone());
            Ok(RecoveryOutcome::AwaitingAcknowledgement(report))
        }
    }

    /// Dismiss the files-in-use warning so recovery can be offered again.
    pub fn acknowledge(&mut self) {
        if let RecoveryState::AwaitingUserAck(files) = &self.state {
            debug!(count = files.len(), "files in use acknowledged");
            self.state = RecoveryState::Offered;
        }
    }
}

/// Drop guard that resets the in-flight flag to `false`.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
