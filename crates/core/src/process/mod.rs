//! Spawning git and streaming its output.

pub mod runner;

pub use runner::{GitRunner, OutputLine, ProcessExit, Stream};
