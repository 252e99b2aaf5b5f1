//! CLI module for the spindle test engine
//!
//! ## Commands
//!
//! - `list [ARTIFACT]...` - Discover test units and print them
//! - `run [ARTIFACT]...` - Discover and run test units (pytest-style output)
//!
//! Both commands work against the built-in demo artifact registry; with no artifact arguments every registered
//! artifact is used.
//!
//! ## Design
//!
//! The CLI uses clap for argument parsing with derive macros.
//! Command functions return `CliResult<T>` instead of calling `process::exit`.
//! Only the top-level `run()` function handles errors and exits.

// Enforce explicit error handling - no panicking in production code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod commands;

use std::fmt;
use std::process;

use clap::{Parser, Subcommand};

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

    pub fn with_code(message: impl Into<String>, code: i32) -> Self {
        Self::new(message, ExitCode(code))
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

/// Reflection-driven test discovery and execution
#[derive(Parser, Debug)]
#[command(name = "spindle")]
#[command(version = VERSION)]
#[command(about = "Reflection-driven test discovery and execution", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Discover test units and print them
    List {
        /// Artifacts to inspect (default: every registered artifact)
        #[arg(value_name = "ARTIFACT")]
        artifacts: Vec<String>,
    },

    /// Discover and run test units (pytest-style)
    Run {
        /// Artifacts to run (default: every registered artifact)
        #[arg(value_name = "ARTIFACT")]
        artifacts: Vec<String>,
        /// Verbose output
        #[arg(short, long)]
        verbose: bool,
        /// Filter units by keyword expression
        #[arg(short = 'k', value_name = "EXPR")]
        filter: Option<String>,
        /// Emit one JSON object per host event instead of console output
        #[arg(long)]
        json: bool,
        /// Join each unit before starting the next
        #[arg(long)]
        sequential: bool,
        /// Skip the start-of-unit clock alignment wait
        #[arg(long = "no-align")]
        no_align: bool,
    },
}

// ============================================================================
// CLI entry point
// ============================================================================

/// Main CLI entry point.
///
/// This is the only place where `process::exit` is called. All command
/// implementations return `CliResult` and errors are handled here.
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

/// Execute the CLI command and return result.
fn execute(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Some(Command::List { artifacts }) => commands::list_units(&artifacts),
        Some(Command::Run {
            artifacts,
            verbose,
            filter,
            json,
            sequential,
            no_align,
        }) => commands::run_units(&commands::RunOptions {
            artifacts,
            verbose,
            filter,
            json,
            sequential,
            align: !no_align,
        }),
        None => Err(CliError::failure("no command given; try `spindle --help`")),
    }
}

// ============================================================================
// Tests
// ============================================================================
