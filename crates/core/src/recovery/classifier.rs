//! Streaming classifier for git's "would be overwritten by merge" output.
//!
//! Git refuses to merge when the incoming changes would clobber local
//! modifications or untracked files, and prints a block like:
//!
//! ```text
//! error: Your local changes to the following files would be overwritten by merge:
//! 	foo.txt
//! 	bar/baz.txt
//! Please commit your changes or stash them before you merge.
//! Aborting
//! ```
//!
//! [`OutputClassifier`] consumes that output one line at a time and collects
//! the file names listed between a trigger line and its terminator.

use serde::{Deserialize, Serialize};

/// A message block git prints around a list of conflicting files.
#[derive(Debug, Clone, Copy)]
pub struct OverwriteBlock {
    /// Substring of the line that opens the file list.
    pub trigger: &'static str,
    /// Substring of the line that closes it.
    pub terminator: &'static str,
}

/// Every block the classifier recognises. New message variants go here.
pub const OVERWRITE_BLOCKS: &[OverwriteBlock] = &[
    OverwriteBlock {
        trigger: "local changes to the following files would be overwritten by merge",
        terminator: "commit your changes or stash them before you merge",
    },
    OverwriteBlock {
        trigger: "untracked working tree files would be overwritten by merge",
        terminator: "move or remove them before you merge",
    },
];

/// Marker git prints once it has given up on the operation.
pub const ABORT_MARKER: &str = "Aborting";

/// Line-at-a-time state machine over git output.
///
/// While a block is open, every line that is not a terminator is recorded as
/// a file name. Names are recorded across all blocks in arrival order,
/// duplicates included.
#[derive(Debug, Default)]
pub struct OutputClassifier {
    collecting: bool,
    collected_paths: Vec<String>,
    abort_seen: bool,
}

impl OutputClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw output line, including its trailing newline.
    ///
    /// Never blocks and never logs: irrelevant lines are dropped silently.
    pub fn feed_line(&mut self, line: &str) {
        if !self.collecting && is_trigger(line) {
            self.collecting = true;
        } else if self.collecting && is_terminator(line) {
            self.collecting = false;
        } else if self.collecting {
            self.collected_paths.push(strip_record(line).to_string());
        }

        if line.contains(ABORT_MARKER) && !self.collected_paths.is_empty() {
            self.abort_seen = true;
        }
    }

    /// True once git aborted after listing at least one file.
    pub fn has_recoverable_conflict(&self) -> bool {
        self.abort_seen && !self.collected_paths.is_empty()
    }

    /// Paths collected so far. Reading does not clear them.
    pub fn collected_paths(&self) -> &[String] {
        &self.collected_paths
    }

    pub fn is_collecting(&self) -> bool {
        self.collecting
    }

    pub fn abort_seen(&self) -> bool {
        self.abort_seen
    }

    /// Snapshot of the classifier's conclusions.
    pub fn report(&self) -> ClassifierReport {
        ClassifierReport {
            paths: self.collected_paths.clone(),
            abort_seen: self.abort_seen,
            recoverable: self.has_recoverable_conflict(),
        }
    }
}

/// Serializable summary of a classified transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierReport {
    pub paths: Vec<String>,
    pub abort_seen: bool,
    pub recoverable: bool,
}

/// Classify a complete transcript in one go.
pub fn classify_transcript<I, S>(lines: I) -> ClassifierReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut classifier = OutputClassifier::new();
    for line in lines {
        classifier.feed_line(line.as_ref());
    }
    classifier.report()
}

fn is_trigger(line: &str) -> bool {
    OVERWRITE_BLOCKS.iter().any(|b| line.contains(b.trigger))
}

fn is_terminator(line: &str) -> bool {
    OVERWRITE_BLOCKS.iter().any(|b| line.contains(b.terminator))
}

/// Drop exactly the first and last character: git's leading tab and the
/// line terminator. Positional on purpose; inner whitespace is kept.
fn strip_record(line: &str) -> &str {
    let mut chars = line.chars();
    chars.next();
    chars.next_back();
    chars.as_str()
}
