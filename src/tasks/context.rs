//! Shared task context and interactive confirmation.
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;

use anyhow::{Context as _, Result};

use crate::config::Config;
use crate::error::StateError;
use crate::exec::{CommandRunner, POLL_INTERVAL};
use crate::logging::Log;
use crate::platform::Platform;
use crate::resources::PackageManager;
use crate::state::StateStore;

/// Source of yes/no answers for interactive confirmations.
#[cfg_attr(test, mockall::automock)]
pub trait Prompt: Send + Sync {
    /// Ask `question`. Anything but `y`/`yes` is a no.
    fn confirm(&self, question: &str) -> bool;
}

/// [`Prompt`] reading answers from the controlling terminal.
///
/// An interrupt while waiting for input counts as a no.
#[derive(Debug, Default)]
pub struct StdinPrompt {
    interrupt: Arc<AtomicBool>,
}

impl StdinPrompt {
    /// Create a prompt that stops waiting once `interrupt` is set.
    #[must_use]
    pub const fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self { interrupt }
    }
}

impl Prompt for StdinPrompt {
    #[allow(clippy::print_stdout)]
    fn confirm(&self, question: &str) -> bool {
        print!("{question} (y/N): ");
        if std::io::stdout().flush().is_err() {
            return false;
        }
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut line = String::new();
            let answer = match std::io::stdin().read_line(&mut line) {
                Ok(0) | Err(_) => None,
                Ok(_) => Some(line),
            };
            tx.send(answer).ok();
        });
        wait_for_answer(&rx, &self.interrupt).is_some_and(|answer| {
            matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
        })
    }
}

/// Block until the reader delivers a line or `interrupt` is set.
///
/// `None` for end of input, a read error or an interrupt.
fn wait_for_answer(rx: &Receiver<Option<String>>, interrupt: &AtomicBool) -> Option<String> {
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return None;
        }
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(answer) => return answer,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => return None,
        }
    }
}

/// The user's home directory.
///
/// # Errors
///
/// Returns an error if the HOME (or USERPROFILE on Windows) environment
/// variable is not set.
pub fn home_dir() -> Result<PathBuf> {
    let home = if cfg!(target_os = "windows") {
        std::env::var_os("USERPROFILE").or_else(|| std::env::var_os("HOME"))
    } else {
        std::env::var_os("HOME")
    };
    home.map(PathBuf::from)
        .ok_or_else(|| anyhow::anyhow!("HOME environment variable is not set"))
}

/// Shared context for task execution.
pub struct Context {
    /// Configuration for this run.
    pub config: Arc<Config>,
    /// Detected platform information.
    pub platform: Arc<Platform>,
    /// Completion ledger.
    pub state: Arc<StateStore>,
    /// Command runner (dry-run aware).
    pub runner: Arc<CommandRunner>,
    /// Logger for output and task recording.
    pub log: Arc<dyn Log>,
    /// Answers interactive confirmations.
    pub prompt: Arc<dyn Prompt>,
    /// Report intended actions instead of performing them.
    pub dry_run: bool,
    /// Answer every confirmation with yes.
    pub auto_yes: bool,
    /// User's home directory path.
    pub home: PathBuf,
    /// Parent of every scratch directory.
    pub scratch_root: PathBuf,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("config", &"<Config>")
            .field("platform", &self.platform)
            .field("state", &self.state.path())
            .field("runner", &self.runner)
            .field("log", &"<dyn Log>")
            .field("prompt", &"<dyn Prompt>")
            .field("dry_run", &self.dry_run)
            .field("auto_yes", &self.auto_yes)
            .field("home", &self.home)
            .field("scratch_root", &self.scratch_root)
            .finish()
    }
}

impl Context {
    /// Creates a new context that prompts on the terminal.
    ///
    /// Dry-run mode and the interrupt flag follow the runner.
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        platform: Arc<Platform>,
        state: Arc<StateStore>,
        runner: Arc<CommandRunner>,
        log: Arc<dyn Log>,
        home: PathBuf,
    ) -> Self {
        let dry_run = runner.is_dry_run();
        let prompt: Arc<dyn Prompt> = Arc::new(StdinPrompt::new(Arc::clone(runner.interrupt())));
        Self {
            config,
            platform,
            state,
            runner,
            log,
            prompt,
            dry_run,
            auto_yes: false,
            home,
            scratch_root: std::env::temp_dir(),
        }
    }

    /// Answer every confirmation with yes.
    #[must_use]
    pub const fn with_auto_yes(mut self, auto_yes: bool) -> Self {
        self.auto_yes = auto_yes;
        self
    }

    /// Keep scratch directories under `root` instead of the system temp dir.
    #[must_use]
    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = root;
        self
    }

    /// Replace the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: Arc<dyn Prompt>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Ask for confirmation of a side-effecting action.
    ///
    /// Auto-yes answers yes. Dry-run answers yes without asking, so the
    /// rest of the action is previewed.
    pub fn confirm(&self, question: &str) -> bool {
        if self.auto_yes {
            return true;
        }
        if self.dry_run {
            self.log.dry_run(&format!("Would ask: {question}"));
            return true;
        }
        self.prompt.confirm(question)
    }

    /// Log an action that dry-run mode skipped.
    pub fn would(&self, action: &str) {
        self.log.dry_run(&format!("Would {action}"));
    }

    /// `~/.config`.
    #[must_use]
    pub fn config_dir(&self) -> PathBuf {
        self.home.join(".config")
    }

    /// Scratch directory for `label`. It survives an interrupted run so the
    /// next one can pick up downloaded artifacts.
    #[must_use]
    pub fn scratch_dir(&self, label: &str) -> PathBuf {
        self.scratch_root.join(format!("system-setup-{label}"))
    }

    /// The package manager for this platform, if one is installed.
    #[must_use]
    pub fn package_manager(&self) -> Option<PackageManager> {
        PackageManager::detect(self.platform.os, &self.runner)
    }

    /// Write `contents` to `path`, creating parent directories.
    ///
    /// In dry-run mode nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or the file cannot be written.
    pub fn write_file(&self, path: &Path, contents: &str) -> Result<()> {
        if self.dry_run {
            self.would(&format!("write {}", path.display()));
            return Ok(());
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))?;
        self.log.info(&format!("Created {}", path.display()));
        Ok(())
    }

    /// Record a sub-step as complete. Dry-run never writes state.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the ledger cannot be written.
    pub fn mark_step(&self, step_id: &str) -> Result<(), StateError> {
        if self.dry_run {
            return Ok(());
        }
        self.state.mark_complete(step_id)
    }
}
