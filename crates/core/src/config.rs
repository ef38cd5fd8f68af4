//! Configuration for gitrecover.
//!
//! The configuration is loaded from a TOML file. Every section has defaults,
//! so an empty file (or no file at all) yields a usable configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;
use crate::recovery::UserChoice;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecoverConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// How the git executable is located and invoked.
    #[serde(default)]
    pub git: GitConfig,

    /// Recovery workflow behaviour.
    #[serde(default)]
    pub recovery: RecoveryConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

// ---------------------------------------------------------------------------
// Git
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitConfig {
    /// Name or path of the git executable.
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Environment variable that, when set, overrides `executable`.
    #[serde(default)]
    pub executable_env: Option<String>,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            executable_env: None,
        }
    }
}

fn default_executable() -> String {
    "git".into()
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

/// What to do when a recoverable conflict is detected.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// Prompt the user.
    #[default]
    Ask,
    /// Never recover.
    Cancel,
    /// Reset tracked files only.
    Reset,
    /// Reset tracked files and delete new ones.
    ResetAndDelete,
}

impl ConflictPolicy {
    /// The fixed choice this policy stands for, or `None` for [`Self::Ask`].
    pub fn fixed_choice(self) -> Option<UserChoice> {
        match self {
            Self::Ask => None,
            Self::Cancel => Some(UserChoice::Cancel),
            Self::Reset => Some(UserChoice::ResetOnly),
            Self::ResetAndDelete => Some(UserChoice::ResetAndDelete),
        }
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ask" => Ok(Self::Ask),
            "cancel" => Ok(Self::Cancel),
            "reset" => Ok(Self::Reset),
            "reset-and-delete" => Ok(Self::ResetAndDelete),
            other => Err(ConfigError::InvalidValue {
                field: "on_conflict".into(),
                detail: format!(
                    "'{}' is not one of ask, cancel, reset, reset-and-delete",
                    other
                ),
            }),
        }
    }
}

impl std::fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => write!(f, "ask"),
            Self::Cancel => write!(f, "cancel"),
            Self::Reset => write!(f, "reset"),
            Self::ResetAndDelete => write!(f, "reset-and-delete"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Re-run the original command after a recovery with no files in use.
    #[serde(default = "default_true")]
    pub auto_retry: bool,

    /// Upper bound on git runs per invocation, retries included.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Default conflict policy; overridable on the command line.
    #[serde(default)]
    pub on_conflict: ConflictPolicy,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            auto_retry: true,
            max_attempts: default_max_attempts(),
            on_conflict: ConflictPolicy::Ask,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl RecoverConfig {
    /// Load a [`RecoverConfig`] from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: RecoverConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Apply the `git.executable_env` override, if configured and set.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        let Some(env_name) = self.git.executable_env.as_deref() else {
            return Ok(());
        };

        match std::env::var(env_name) {
            Ok(val) if !val.is_empty() => {
                debug!(env_name, executable = %val, "git executable overridden from env");
                self.git.executable = val;
            }
            Ok(_) => warn!(env_name, "env var is set but empty"),
            Err(_) => debug!(env_name, "env var not set, keeping configured executable"),
        }
        Ok(())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.general.log_level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "general.log_level".into(),
                detail: format!(
                    "'{}' is not one of {}",
                    self.general.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }
        if self.git.executable.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "git.executable".into(),
                detail: "git executable must not be empty".into(),
            });
        }
        if self.recovery.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "recovery.max_attempts".into(),
                detail: "max attempts must be >= 1".into(),
            });
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# gitrecover configuration

[general]
log_level = "warn"

[git]
executable = "git"
# executable_env = "GITRECOVER_GIT"

[recovery]
auto_retry = true
max_attempts = 3
# ask | cancel | reset | reset-and-delete
on_conflict = "ask"
"#
    }
}
