//! Asynchronous git CLI runner with line-by-line output streaming.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, instrument, warn};

use crate::errors::ProcessError;

/// Which pipe a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stream {
    Stdout,
    Stderr,
}

/// One line of process output, terminator included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: Stream,
    pub text: String,
}

/// How the process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessExit {
    /// Exit code, or `None` when killed by a signal.
    pub code: Option<i32>,
    pub success: bool,
}

/// Runs the git executable in a working directory.
#[derive(Debug, Clone)]
pub struct GitRunner {
    program: String,
    working_dir: PathBuf,
}

impl GitRunner {
    /// Create a runner for `program` (usually `git`) in `working_dir`.
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        let runner = Self {
            program: program.into(),
            working_dir: working_dir.into(),
        };
        debug!(program = %runner.program, dir = %runner.working_dir.display(), "created GitRunner");
        runner
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run `git <args>` and hand every output line to `sink` as it arrives.
    ///
    /// Stdout and stderr are read concurrently; `sink` is always called from
    /// this task, one line at a time, in the order lines become available.
    /// Lines keep their trailing `\n`. When `input` is given it is written to
    /// the child's stdin, which is then closed.
    #[instrument(skip(self, input, sink), fields(program = %self.program, dir = %self.working_dir.display()))]
    pub async fn run<F>(
        &self,
        args: &[String],
        input: Option<&str>,
        mut sink: F,
    ) -> Result<ProcessExit, ProcessError>
    where
        F: FnMut(OutputLine),
    {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.working_dir)
            .args(args)
            // The classifier matches git's untranslated messages.
            .env("LC_ALL", "C")
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!(cmd = ?format!("{} {}", self.program, args.join(" ")), "running git command");
        let mut child = cmd.spawn().map_err(|e| self.spawn_error(e))?;

        if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
            stdin.write_all(text.as_bytes()).await?;
            // Dropping stdin closes the pipe.
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ProcessError::IoError(std::io::Error::other("stdout not captured")))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ProcessError::IoError(std::io::Error::other("stderr not captured")))?;

        let mut out_reader = BufReader::new(stdout);
        let mut err_reader = BufReader::new(stderr);
        let mut out_buf = Vec::new();
        let mut err_buf = Vec::new();
        let mut out_open = true;
        let mut err_open = true;
        let mut lines = 0usize;

        while out_open || err_open {
            tokio::select! {
                read = out_reader.read_until(b'\n', &mut out_buf), if out_open => {
                    if read? == 0 {
                        out_open = false;
                    } else {
                        sink(take_line(Stream::Stdout, &mut out_buf));
                        lines += 1;
                    }
                }
                read = err_reader.read_until(b'\n', &mut err_buf), if err_open => {
                    if read? == 0 {
                        err_open = false;
                    } else {
                        sink(take_line(Stream::Stderr, &mut err_buf));
                        lines += 1;
                    }
                }
            }
        }

        let status = child.wait().await?;
        let exit = ProcessExit {
            code: status.code(),
            success: status.success(),
        };

        if exit.success {
            debug!(lines, "git command succeeded");
        } else {
            warn!(code = ?exit.code, lines, "git command failed");
        }
        Ok(exit)
    }

    fn spawn_error(&self, e: std::io::Error) -> ProcessError {
        if e.kind() == std::io::ErrorKind::NotFound {
            ProcessError::BinaryNotFound(self.program.clone())
        } else {
            ProcessError::SpawnFailed {
                program: self.program.clone(),
                source: e,
            }
        }
    }
}

/// Drain `buf` into an [`OutputLine`], decoding lossily.
fn take_line(stream: Stream, buf: &mut Vec<u8>) -> OutputLine {
    let text = String::from_utf8_lossy(buf).into_owned();
    buf.clear();
    OutputLine { stream, text }
}
