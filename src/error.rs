//! Domain-specific error types for the provisioning engine.
//!
//! Internal modules return typed errors (e.g., [`ConfigError`],
//! [`CommandError`]) while task bodies and the CLI boundary work with
//! [`anyhow::Error`] via the standard `?` operator.
//!
//! # Error hierarchy
//!
//! ```text
//! SetupError
//! ├── Config(ConfigError)     — YAML parsing, profile and task-name validation
//! ├── State(StateError)       — ledger persistence (fatal)
//! ├── Command(CommandError)   — subprocess failure, timeout, interrupt
//! ├── Task(TaskError)         — task execution and dependency issues
//! ├── Resource(ResourceError) — downloads, checksums, package installs
//! └── Platform(PlatformError) — OS-specific operation failures
//! ```

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Top-level error type for the provisioning engine.
#[derive(Error, Debug)]
pub enum SetupError {
    /// Configuration-related error (parsing, profile resolution, task names).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The completion ledger could not be persisted.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// A subprocess failed, timed out or was interrupted.
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    /// Task execution error (failure, missing dependency, dependency cycle).
    #[error("Task execution error: {0}")]
    Task(#[from] TaskError),

    /// Resource operation error (download, checksum, package install).
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Platform-specific operation error.
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),
}

impl SetupError {
    /// Whether the error describes bad input (configuration, profile, task
    /// names or dependency declarations) rather than a failed operation.
    #[must_use]
    pub const fn is_usage_error(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Task(_))
    }
}

/// Errors that arise from configuration loading, profiles and task selection.
///
/// Every variant maps to exit code `2` at the CLI boundary.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested profile is not defined under `profiles:`.
    #[error("Unknown profile: {name}. Available profiles: {available}")]
    UnknownProfile {
        /// Name passed via `--profile`.
        name: String,
        /// Comma-separated list of defined profiles.
        available: String,
    },

    /// One or more names passed via `--only` are not registered.
    #[error("Unknown task(s): {unknown}. Available tasks: {available}")]
    UnknownTasks {
        /// Comma-separated unknown names.
        unknown: String,
        /// Comma-separated registered names.
        available: String,
    },

    /// A YAML document could not be parsed.
    #[error("Invalid YAML in {path}: {source}")]
    InvalidYaml {
        /// Path (or `<defaults>`) of the offending document.
        path: String,
        /// Underlying parser error.
        source: serde_yaml::Error,
    },

    /// An I/O error occurred while reading a config file.
    #[error("IO error reading config file {path}: {source}")]
    Io {
        /// Path to the file that could not be read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// The completion ledger could not be written.
///
/// Always fatal: losing a write would break the skip-if-complete contract.
#[derive(Error, Debug)]
#[error("Failed to save state to {path}: {source}")]
pub struct StateError {
    /// Ledger path.
    pub path: PathBuf,
    /// Underlying I/O or serialization error.
    pub source: std::io::Error,
}

/// Errors raised by [`CommandRunner`](crate::exec::CommandRunner).
#[derive(Error, Debug)]
pub enum CommandError {
    /// The command exited non-zero while `check` was requested.
    #[error("{command} failed (exit {code}): {stderr}")]
    Failed {
        /// Command line as displayed to the user.
        command: String,
        /// Exit code, `-1` when terminated by a signal.
        code: i32,
        /// Trimmed standard error output.
        stderr: String,
    },

    /// A single attempt exceeded its timeout.
    #[error("{command} timed out after {}s", timeout.as_secs())]
    TimedOut {
        /// Command line as displayed to the user.
        command: String,
        /// Timeout that fired.
        timeout: Duration,
    },

    /// The process could not be started (e.g., program not on PATH).
    #[error("failed to execute {command}: {source}")]
    Spawn {
        /// Command line as displayed to the user.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The command string could not be tokenized.
    #[error("cannot parse command line: {0}")]
    Parse(String),

    /// The run was interrupted by the user while the command was running.
    #[error("{0} interrupted")]
    Interrupted(String),
}

/// Errors that arise during task execution.
#[derive(Error, Debug)]
pub enum TaskError {
    /// A task failed to execute.
    #[error("Task '{task}' failed: {reason}")]
    ExecutionFailed {
        /// Name of the task that failed.
        task: String,
        /// Human-readable reason for the failure.
        reason: String,
    },

    /// The task dependency graph contains a cycle.
    #[error("Task dependency cycle detected: {0}")]
    DependencyCycle(String),

    /// A declared dependency is not registered.
    #[error("Task '{task}' depends on unknown task '{dependency}'")]
    MissingDependency {
        /// Task declaring the dependency.
        task: String,
        /// Name that is not registered.
        dependency: String,
    },
}

/// Errors that arise from resource operations (downloads, checksums, packages).
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Downloaded content does not match the expected digest.
    #[error("Checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// File that was verified.
        path: String,
        /// Expected SHA-256 (as configured).
        expected: String,
        /// Actual SHA-256 (lowercase hex).
        actual: String,
    },

    /// A download failed.
    #[error("Download of {url} failed: {reason}")]
    Download {
        /// Source URL or identifier.
        url: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A package installation failed.
    #[error("Package installation failed via {manager}: {packages}")]
    PackageInstall {
        /// Package manager name.
        manager: String,
        /// Space-separated package names.
        packages: String,
        /// Underlying command error.
        source: CommandError,
    },

    /// No package manager is available on this host.
    #[error("No suitable package manager found")]
    NoPackageManager,

    /// A required file was not found.
    #[error("File not found: {0}")]
    NotFound(String),

    /// A file operation on a downloaded or installed artifact failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// File being read, written or removed.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Errors that arise from platform-specific operations.
#[derive(Error, Debug)]
pub enum PlatformError {
    /// The requested operation is not supported on the current platform.
    #[error("Operation not supported on {platform}")]
    Unsupported {
        /// Name of the platform (e.g., `"windows"`).
        platform: String,
    },
}
