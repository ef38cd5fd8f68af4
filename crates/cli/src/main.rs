//! gitrecover command-line front end.
//!
//! Runs git commands and, when git refuses to proceed because local
//! changes or untracked files would be overwritten, offers to reset those
//! files and retry. Also provides transcript scanning and configuration
//! helpers.

mod prompt;
mod recover;
mod style;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use gitrecover_core::config::{ConflictPolicy, RecoverConfig};
use gitrecover_core::recovery::classify_transcript;

use recover::RunOptions;

const DEFAULT_CONFIG_PATH: &str = "~/.config/gitrecover/config.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// gitrecover command-line front end.
#[derive(Parser, Debug)]
#[command(
    name = "gitrecover",
    version,
    about = "Run git commands and recover from \"would be overwritten\" failures"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Run as if gitrecover was started in this directory.
    #[arg(short = 'C', long = "work-dir", global = true, default_value = ".")]
    work_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run any git command with conflict recovery.
    Run {
        /// What to do on a recoverable conflict: ask, cancel, reset, reset-and-delete.
        #[arg(long)]
        on_conflict: Option<ConflictPolicy>,

        /// Text written to git's standard input.
        #[arg(long)]
        input: Option<String>,

        /// Arguments passed to git, after `--`.
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },

    /// Shorthand for `run -- merge ...`.
    Merge {
        /// What to do on a recoverable conflict: ask, cancel, reset, reset-and-delete.
        #[arg(long)]
        on_conflict: Option<ConflictPolicy>,

        /// Arguments passed to `git merge`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Shorthand for `run -- pull ...`.
    Pull {
        /// What to do on a recoverable conflict: ask, cancel, reset, reset-and-delete.
        #[arg(long)]
        on_conflict: Option<ConflictPolicy>,

        /// Arguments passed to `git pull`.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Classify a saved git transcript and print the result as JSON.
    Scan {
        /// Transcript file; standard input when omitted.
        file: Option<PathBuf>,
    },

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        output: String,
    },

    /// Validate the configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init { output } => {
            init_tracing("warn");
            cmd_init(&output).map(|()| ExitCode::SUCCESS)
        }
        Commands::Validate => {
            init_tracing("warn");
            cmd_validate(&cli.config).map(|()| ExitCode::SUCCESS)
        }
        Commands::Scan { file } => {
            init_tracing("warn");
            cmd_scan(file.as_deref()).map(|()| ExitCode::SUCCESS)
        }
        Commands::Run {
            on_conflict,
            input,
            args,
        } => git_command(&cli.config, &cli.work_dir, args, input, on_conflict).await,
        Commands::Merge { on_conflict, args } => {
            git_command(&cli.config, &cli.work_dir, with_verb("merge", args), None, on_conflict)
                .await
        }
        Commands::Pull { on_conflict, args } => {
            git_command(&cli.config, &cli.work_dir, with_verb("pull", args), None, on_conflict)
                .await
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();
}

fn with_verb(verb: &str, args: Vec<String>) -> Vec<String> {
    std::iter::once(verb.to_string()).chain(args).collect()
}

async fn git_command(
    config_path: &str,
    work_dir: &Path,
    args: Vec<String>,
    input: Option<String>,
    on_conflict: Option<ConflictPolicy>,
) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    init_tracing(&config.general.log_level);

    if !work_dir.is_dir() {
        anyhow::bail!("working directory does not exist: {}", work_dir.display());
    }

    let opts = RunOptions {
        args,
        input,
        policy: on_conflict.unwrap_or(config.recovery.on_conflict),
    };
    recover::run_git(&config, work_dir, opts).await
}

// ---------------------------------------------------------------------------
// Config helpers
// ---------------------------------------------------------------------------

/// Load and validate the config. A missing file at the default location
/// yields the defaults.
fn load_config(config_path: &str) -> Result<RecoverConfig> {
    let resolved = expand_tilde(config_path);
    if config_path == DEFAULT_CONFIG_PATH && !Path::new(&resolved).exists() {
        let mut config = RecoverConfig::default();
        config
            .resolve_env_vars()
            .context("failed to resolve environment variables")?;
        return Ok(config);
    }
    RecoverConfig::load_and_resolve(&resolved).context("failed to load configuration file")
}

/// Expand `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return format!("{}/{}", home.display(), rest);
        }
    }
    path.to_string()
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_init(output: &str) -> Result<()> {
    let path = PathBuf::from(expand_tilde(output));

    if path.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            path.display()
        );
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&path, RecoverConfig::default_template())
        .context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", path.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Pick a default conflict policy under [recovery]");
    println!(
        "  2. Validate with: gitrecover validate --config {}",
        path.display()
    );
    println!("  3. Run a command: gitrecover merge <branch>");

    Ok(())
}

fn cmd_validate(config_path: &str) -> Result<()> {
    let resolved = expand_tilde(config_path);
    println!("Validating configuration: {}", resolved);
    println!();

    let mut config =
        RecoverConfig::load_from_file(&resolved).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => println!("  [OK] All fields are valid"),
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    println!();
    println!("Configuration summary:");
    println!("  Log level     : {}", config.general.log_level);
    println!("  Git executable: {}", config.git.executable);
    println!(
        "  Executable env: {}",
        config.git.executable_env.as_deref().unwrap_or("not set")
    );
    println!("  Auto retry    : {}", config.recovery.auto_retry);
    println!("  Max attempts  : {}", config.recovery.max_attempts);
    println!("  On conflict   : {}", config.recovery.on_conflict);
    println!();
    println!("Configuration is valid.");

    Ok(())
}

fn cmd_scan(file: Option<&Path>) -> Result<()> {
    let transcript = match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read standard input")?;
            buf
        }
    };

    let report = classify_transcript(transcript.split_inclusive('\n'));
    let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
    println!("{}", json);
    Ok(())
}
