//! gitrecover core library.
//!
//! This crate provides the pieces behind the `gitrecover` front end: running
//! git while streaming its output, recognising "would be overwritten by
//! merge" failures in that output, and recovering the working tree so the
//! command can be retried.

pub mod config;
pub mod errors;
pub mod git;
pub mod models;
pub mod process;
pub mod recovery;

// Re-exports for convenience.
pub use config::RecoverConfig;
pub use git::{GitResetter, WorkTree};
pub use process::GitRunner;
pub use recovery::{OutputClassifier, RecoverySession};
