//! Core logging types: task entries, status, the run summary and the [`Log`] trait.

/// Task execution result for summary reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskEntry {
    /// Registered task name.
    pub name: String,
    /// Final status of the task.
    pub status: TaskStatus,
    /// Optional detail message (e.g., skip reason or error description).
    pub message: Option<String>,
}

/// Status of a processed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Task completed successfully.
    Ok,
    /// Task does not apply to the current platform.
    NotApplicable,
    /// Task was already recorded as complete in the ledger.
    AlreadyComplete,
    /// Task was skipped (declined by the user, disabled in config, ...).
    Skipped,
    /// Task ran in dry-run mode; no changes were applied.
    DryRun,
    /// Task encountered an error and could not complete.
    Failed,
}

/// Everything collected during a run for the final summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// One entry per processed task, in execution order.
    pub tasks: Vec<TaskEntry>,
    /// Stage headers emitted during the run.
    pub sections: Vec<String>,
    /// Packages installed.
    pub packages: Vec<String>,
    /// Settings groups applied.
    pub settings: Vec<String>,
    /// Every error message logged.
    pub errors: Vec<String>,
}

impl Summary {
    /// Number of failed tasks.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .count()
    }
}

/// Logging handle passed explicitly to the orchestrator and every task.
///
/// [`Logger`](super::logger::Logger) is the production implementation; tests
/// substitute recording implementations.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a task result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
    /// Record an installed package for the summary.
    fn record_package(&self, name: &str);
    /// Record an applied settings group for the summary.
    fn record_setting(&self, name: &str);
}
