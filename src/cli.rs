//! Command-line flags.
use std::path::PathBuf;

use clap::Parser;

/// Version string embedded by the build script, falling back to the crate
/// version.
pub const VERSION: &str = match option_env!("SYSTEM_SETUP_VERSION") {
    Some(version) => version,
    None => env!("CARGO_PKG_VERSION"),
};

/// Cross-platform system setup and configuration tool.
#[derive(Parser, Debug, Clone, Default)]
#[command(
    name = "system-setup",
    about = "Cross-platform system setup and configuration tool",
    version = VERSION,
    after_help = "Exit codes: 0 success, 1 task failure, 2 invalid arguments, 130 interrupted"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Auto-answer yes to all prompts (unattended mode)
    #[arg(short = 'y', long = "yes")]
    pub auto_yes: bool,

    /// Show what would be done without doing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Comma-separated list of tasks to run, in this order
    #[arg(long, value_delimiter = ',', value_name = "TASKS")]
    pub only: Vec<String>,

    /// Comma-separated list of tasks to skip
    #[arg(long, value_delimiter = ',', value_name = "TASKS")]
    pub skip: Vec<String>,

    /// Use a predefined profile (server, desktop, developer, minimal)
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// List all available tasks with descriptions
    #[arg(long)]
    pub list_tasks: bool,

    /// List available profiles with descriptions
    #[arg(long)]
    pub list_profiles: bool,

    /// Show previously completed steps before running
    #[arg(long)]
    pub resume: bool,

    /// Clear the state file and exit
    #[arg(long)]
    pub reset: bool,

    /// Path to configuration file (skips the default search)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only show warnings and errors on the console (the log file is complete)
    #[arg(long)]
    pub quiet: bool,

    /// Path to log file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// `--only` with blank entries dropped and whitespace trimmed.
    #[must_use]
    pub fn only_tasks(&self) -> Vec<String> {
        normalize(&self.only)
    }

    /// `--skip` with blank entries dropped and whitespace trimmed.
    #[must_use]
    pub fn skip_tasks(&self) -> Vec<String> {
        normalize(&self.skip)
    }
}

fn normalize(names: &[String]) -> Vec<String> {
    names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .map(String::from)
        .collect()
}
