//! Structured logger with dry-run awareness and summary collection.
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, Summary, TaskEntry, TaskStatus};
use super::utils::terminal_columns;

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
///
/// The `record_*` methods are **not** included because their signatures
/// differ from the `fn(&self, &str)` pattern shared by the display methods.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Whether events emitted on this thread reach a subscriber.
fn subscriber_installed() -> bool {
    tracing::dispatcher::get_default(|dispatch| {
        !dispatch.is::<tracing::subscriber::NoSubscriber>()
    })
}

/// Widest the summary rule is drawn.
const MAX_RULE_WIDTH: usize = 60;

/// Structured logger with dry-run awareness and summary collection.
///
/// Messages go through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) renders them on the
/// console and appends them to the log file.
#[derive(Debug, Default)]
pub struct Logger {
    summary: Mutex<Summary>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Create a new logger.
    ///
    /// `log_file` is only displayed in the summary; the file itself is
    /// written by the subscriber's file layer. A logger with a file must be
    /// created after [`init_subscriber`](super::subscriber::init_subscriber),
    /// otherwise its events would be dropped; debug builds assert this.
    #[must_use]
    pub fn new(log_file: Option<PathBuf>) -> Self {
        debug_assert!(
            log_file.is_none() || subscriber_installed(),
            "init_subscriber must run before a file-backed Logger is created"
        );
        Self {
            summary: Mutex::new(Summary::default()),
            log_file,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Summary> {
        self.summary.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn summary(&self) -> Summary {
        self.lock().clone()
    }

    /// Return a clone of all recorded task entries.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.lock().tasks.clone()
    }

    /// Log an error message and keep it for the summary.
    pub fn error(&self, msg: &str) {
        self.lock().errors.push(msg.to_string());
        tracing::error!("{msg}");
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    /// Log a stage header and remember it as a section of the run.
    pub fn stage(&self, msg: &str) {
        self.lock().sections.push(msg.to_string());
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    /// Log a debug message (suppressed on console unless verbose; always
    /// written to the log file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    /// Record a task result for the summary.
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.lock().tasks.push(TaskEntry {
            name: name.to_string(),
            status,
            message: message.map(String::from),
        });
    }

    /// Record an installed package for the summary.
    pub fn record_package(&self, name: &str) {
        self.lock().packages.push(name.to_string());
    }

    /// Record an applied settings group for the summary.
    pub fn record_setting(&self, name: &str) {
        self.lock().settings.push(name.to_string());
    }

    /// Return `true` if any recorded task has failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Count the number of failed tasks.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.lock().failure_count()
    }

    /// Print the summary of the run.
    pub fn print_summary(&self) {
        let summary = self.summary();
        if summary.tasks.is_empty() {
            return;
        }
        let width = terminal_columns().min(MAX_RULE_WIDTH);
        self.info(&format!("\x1b[2m{}\x1b[0m", "─".repeat(width)));
        tracing::info!(target: STAGE_TARGET, "Summary");
        for line in render_summary(&summary, self.log_file.as_ref()) {
            self.info(&line);
        }
    }
}

/// Render the summary body, one console line per element.
#[must_use]
pub fn render_summary(summary: &Summary, log_file: Option<&PathBuf>) -> Vec<String> {
    let mut lines = Vec::new();

    if !summary.sections.is_empty() {
        lines.push(format!("sections: {}", summary.sections.join(", ")));
    }

    let mut counts = [0usize; 6];
    for task in &summary.tasks {
        let (slot, icon, color) = match task.status {
            TaskStatus::Ok => (0, "✓", "\x1b[32m"),
            TaskStatus::AlreadyComplete => (1, "✓", "\x1b[2m"),
            TaskStatus::NotApplicable => (2, "·", "\x1b[2m"),
            TaskStatus::Skipped => (3, "○", "\x1b[33m"),
            TaskStatus::DryRun => (4, "~", "\x1b[37m"),
            TaskStatus::Failed => (5, "✗", "\x1b[31m"),
        };
        if let Some(count) = counts.get_mut(slot) {
            *count += 1;
        }
        let suffix = task
            .message
            .as_ref()
            .map_or_else(String::new, |msg| format!(" ({msg})"));
        lines.push(format!("{color}{icon} {}{suffix}\x1b[0m", task.name));
    }

    if !summary.packages.is_empty() {
        lines.push(format!(
            "packages installed ({}): {}",
            summary.packages.len(),
            summary.packages.join(", ")
        ));
    }
    if !summary.settings.is_empty() {
        lines.push(format!(
            "settings applied ({}): {}",
            summary.settings.len(),
            summary.settings.join(", ")
        ));
    }
    if !summary.errors.is_empty() {
        lines.push(format!("\x1b[31merrors ({}):\x1b[0m", summary.errors.len()));
        for error in &summary.errors {
            lines.push(format!("\x1b[31m  ✗ {error}\x1b[0m"));
        }
    }

    let [ok, complete, not_applicable, skipped, dry_run, failed] = counts;
    lines.push(format!(
        "{} tasks: \x1b[32m{ok} ok\x1b[0m, \x1b[2m{complete} already complete\x1b[0m, \x1b[2m{not_applicable} n/a\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m",
        summary.tasks.len()
    ));

    if let Some(path) = log_file {
        lines.push(format!("\x1b[2mlog: {}\x1b[0m", path.display()));
    }
    lines
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.record_task(name, status, message);
    }

    fn record_package(&self, name: &str) {
        self.record_package(name);
    }

    fn record_setting(&self, name: &str) {
        self.record_setting(name);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use crate::logging::utils::strip_ansi;
    use std::fs;

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "init_subscriber must run before")]
    fn file_backed_logger_without_subscriber_is_rejected() {
        let _ = Logger::new(Some(PathBuf::from("/tmp/setup.log")));
    }

    #[test]
    fn detached_logger_needs_no_subscriber() {
        let log = Logger::new(None);
        log.info("dropped quietly");
        assert!(log.summary().errors.is_empty());
    }

    fn plain(lines: &[String]) -> String {
        lines
            .iter()
            .map(|l| strip_ansi(l))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn logger_new() {
        let log = Logger::new(None);
        assert!(log.task_entries().is_empty(), "expected empty task list");
    }

    #[test]
    fn record_task_with_message() {
        let log = Logger::new(None);
        log.record_task("packages", TaskStatus::Skipped, Some("declined"));
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name, "packages");
        assert_eq!(tasks[0].message, Some("declined".to_string()));
    }

    #[test]
    fn failure_count_returns_correct_count() {
        let log = Logger::new(None);
        assert!(!log.has_failures());
        log.record_task("a", TaskStatus::Ok, None);
        log.record_task("b", TaskStatus::Failed, Some("error 1"));
        log.record_task("c", TaskStatus::Failed, Some("error 2"));
        log.record_task("d", TaskStatus::Skipped, None);
        assert_eq!(log.failure_count(), 2);
        assert!(log.has_failures());
    }

    #[test]
    fn stage_and_error_are_collected() {
        let log = Logger::new(None);
        log.stage("packages");
        log.error("fish: boom");
        log.warn("not collected");
        let summary = log.summary();
        assert_eq!(summary.sections, ["packages"]);
        assert_eq!(summary.errors, ["fish: boom"]);
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let log = Logger::new(None);
        let log_ref: &dyn Log = &log;
        log_ref.record_task("via-trait", TaskStatus::Ok, None);
        log_ref.record_package("git");
        log_ref.record_setting("Dock");
        let summary = log.summary();
        assert_eq!(summary.tasks.len(), 1);
        assert_eq!(summary.packages, ["git"]);
        assert_eq!(summary.settings, ["Dock"]);
    }

    #[test]
    fn render_summary_full_run() {
        let log = Logger::new(None);
        log.stage("packages");
        log.stage("fish");
        log.record_task("packages", TaskStatus::Ok, None);
        log.record_task("chezmoi", TaskStatus::AlreadyComplete, None);
        log.record_task("hyprland", TaskStatus::NotApplicable, Some("macos"));
        log.record_task("shell", TaskStatus::Skipped, Some("declined"));
        log.record_task("fish", TaskStatus::Failed, Some("chsh failed"));
        log.record_package("git");
        log.record_package("fish");
        log.record_setting("Dock");
        log.error("fish: chsh failed");

        let lines = render_summary(&log.summary(), Some(&PathBuf::from("/tmp/setup.log")));
        insta::assert_snapshot!(plain(&lines), @r"
        sections: packages, fish
        ✓ packages
        ✓ chezmoi
        · hyprland (macos)
        ○ shell (declined)
        ✗ fish (chsh failed)
        packages installed (2): git, fish
        settings applied (1): Dock
        errors (1):
          ✗ fish: chsh failed
        5 tasks: 1 ok, 1 already complete, 1 n/a, 1 skipped, 0 dry-run, 1 failed
        log: /tmp/setup.log
        ");
    }

    #[test]
    fn render_summary_clean_run_has_no_error_block() {
        let log = Logger::new(None);
        log.record_task("packages", TaskStatus::DryRun, None);
        let text = plain(&render_summary(&log.summary(), None));
        assert!(!text.contains("errors"));
        assert!(text.ends_with("1 tasks: 0 ok, 0 already complete, 0 n/a, 0 skipped, 1 dry-run, 0 failed"));
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(tmp.path().join("setup.log")).unwrap();
        assert!(
            contents.contains(&marker),
            "debug messages should always appear in the log file"
        );
    }

    #[test]
    fn levels_are_tagged_in_file() {
        let (log, tmp, _guard) = isolated_logger();
        log.warn("warn-marker");
        log.error("error-marker");
        log.stage("stage-marker");
        log.dry_run("dryrun-marker");
        let contents = fs::read_to_string(tmp.path().join("setup.log")).unwrap();
        assert!(contents.contains("[warn] warn-marker"));
        assert!(contents.contains("[error] error-marker"));
        assert!(contents.contains("==> stage-marker"));
        assert!(contents.contains("[dry run] dryrun-marker"));
    }
}
