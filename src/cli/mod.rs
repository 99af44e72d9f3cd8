//! CLI module for the harness
//!
//! Invoking the binary with no arguments builds the toolchain and runs the full suite from the
//! nearest enclosing harness root. Optional flags select another root, a config file, the output format, or a
//! subset of cases.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use std::env;
use std::fmt;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};

use crate::harness::{
    ConsoleReporter, HarnessConfig, JsonReporter, ProcessExecutor, Reporter, SuiteDriver, find_harness_root,
};

// ============================================================================
// CLI Error handling
// ============================================================================

/// Exit code for CLI operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(pub i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const FAILURE: ExitCode = ExitCode(1);
}

/// Error type for CLI operations.
///
/// Contains a user-facing message and an exit code. The CLI entry point
/// catches these errors, prints the message, and exits with the code.
#[derive(Debug)]
pub struct CliError {
    /// User-facing error message (already formatted for display)
    pub message: String,
    /// Exit code to return to the shell
    pub exit_code: ExitCode,
}

impl CliError {
    pub fn new(message: impl Into<String>, exit_code: ExitCode) -> Self {
        Self {
            message: message.into(),
            exit_code,
        }
    }

    /// Create a failure error (exit code 1).
    pub fn failure(message: impl Into<String>) -> Self {
        Self::new(message, ExitCode::FAILURE)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Clap CLI definition
// ============================================================================

/// Output format for suite events
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable progress and summary
    #[default]
    Console,
    /// One JSON object per event
    Json,
}

/// Run every configured case through the interpreter and the compiler
#[derive(Parser, Debug)]
#[command(name = "jimple-harness")]
#[command(version = VERSION)]
#[command(about = "Dual-mode (interpret + compile) test harness for the Jimple toolchain", long_about = None)]
pub struct Cli {
    /// Harness root; commands run here and test paths resolve against it
    /// (default: the config file's directory, else the nearest enclosing directory holding a
    /// harness.toml, else the current directory)
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Config file (default: <root>/harness.toml when present, else built-in defaults)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Console)]
    pub format: OutputFormat,

    /// Disable ANSI colors in console output
    #[arg(long)]
    pub no_color: bool,

    /// Print captured stderr of failed phases
    #[arg(short, long)]
    pub verbose: bool,

    /// Only run cases whose name contains EXPR
    #[arg(short = 'k', value_name = "EXPR")]
    pub filter: Option<String>,
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called.
pub fn run() {
    let cli = Cli::parse();

    match execute(cli) {
        Ok(exit_code) => {
            if exit_code.0 != 0 {
                process::exit(exit_code.0);
            }
        }
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("{}", e.message);
            }
            process::exit(e.exit_code.0);
        }
    }
}

/// Execute the suite described by `cli` and return its exit code.
pub fn execute(cli: Cli) -> CliResult<ExitCode> {
    let root = resolve_root(cli.root, cli.config.as_deref())?;
    let config = HarnessConfig::discover(&root, cli.config.as_deref())
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?;

    let reporter: Box<dyn Reporter> = match cli.format {
        OutputFormat::Console => {
            let color = !cli.no_color && io::stdout().is_terminal();
            Box::new(ConsoleReporter::stdout(color, cli.verbose))
        }
        OutputFormat::Json => Box::new(JsonReporter::stdout()),
    };

    let executor = ProcessExecutor::new(&root);
    let mut driver = SuiteDriver::new(config, root, executor, reporter)
        .map_err(|e| CliError::failure(format!("Error: {}", e)))?
        .with_filter(cli.filter);

    // Build failures were already reported
    Ok(ExitCode(driver.run()))
}

/// Pick the harness root so that it does not depend on where the binary is invoked from.
fn resolve_root(root: Option<PathBuf>, config: Option<&Path>) -> CliResult<PathBuf> {
    if let Some(root) = root {
        return canonicalize_root(&root);
    }
    if let Some(config) = config {
        let config = config
            .canonicalize()
            .map_err(|e| CliError::failure(format!("Error: cannot read config {}: {}", config.display(), e)))?;
        if let Some(dir) = config.parent() {
            return Ok(dir.to_path_buf());
        }
    }
    let cwd = env::current_dir()
        .map_err(|e| CliError::failure(format!("Error: cannot determine current directory: {}", e)))?;
    let cwd = canonicalize_root(&cwd)?;
    Ok(find_harness_root(&cwd).unwrap_or(cwd))
}

fn canonicalize_root(root: &Path) -> CliResult<PathBuf> {
    root.canonicalize()
        .map_err(|e| CliError::failure(format!("Error: invalid harness root {}: {}", root.display(), e)))
}

// ============================================================================
// Tests
// ============================================================================
