//! Batched reset of tracked files through the git executable.

use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::{info, instrument, warn};

use crate::recovery::Resetter;

/// Arguments placed before the `--` path separator.
const RESET_ARGS: &[&str] = &["checkout-index", "--index", "--force"];

/// Restores tracked files from the index with a single git invocation.
#[derive(Debug, Clone)]
pub struct GitResetter {
    program: String,
    working_dir: PathBuf,
}

impl GitResetter {
    pub fn new(program: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            working_dir: working_dir.into(),
        }
    }

    /// The full argument list for resetting `paths`.
    pub fn args_for(paths: &[String]) -> Vec<String> {
        RESET_ARGS
            .iter()
            .map(|a| a.to_string())
            .chain(std::iter::once("--".to_string()))
            .chain(paths.iter().cloned())
            .collect()
    }
}

impl Resetter for GitResetter {
    #[instrument(skip(self, paths), fields(count = paths.len()))]
    fn reset(&self, paths: &[String]) -> String {
        let output = Command::new(&self.program)
            .current_dir(&self.working_dir)
            .args(Self::args_for(paths))
            .stdin(Stdio::null())
            .output();

        match output {
            Ok(output) => {
                let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
                text.push_str(&String::from_utf8_lossy(&output.stderr));
                if output.status.success() {
                    info!("tracked files reset");
                } else {
                    warn!(code = ?output.status.code(), "reset command failed");
                }
                text
            }
            Err(e) => {
                warn!(error = %e, "failed to spawn reset command");
                format!("failed to run {}: {}\n", self.program, e)
            }
        }
    }
}
