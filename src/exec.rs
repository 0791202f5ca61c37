//! Synchronous subprocess execution with dry-run interception, per-attempt
//! timeouts and bounded exponential-backoff retry.
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::CommandError;
use crate::logging::Log;

/// Default per-attempt timeout for commands that do not opt out of one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Default base delay between retries; doubled after every attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// How often a running child is polled for exit, timeout and interrupt.
pub(crate) const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long an unbounded command's output readers may outlive the child.
const PIPE_GRACE: Duration = Duration::from_secs(5);

/// A fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory, inherited when `None`.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Capture stdout/stderr instead of streaming them to the terminal.
    pub capture: bool,
}

impl Invocation {
    /// Build an invocation from an argument vector.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Parse`] if `argv` is empty.
    pub fn from_argv<S: AsRef<str>>(argv: &[S]) -> Result<Self, CommandError> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CommandError::Parse("empty command".to_string()))?;
        Ok(Self {
            program: program.as_ref().to_string(),
            args: args.iter().map(|a| a.as_ref().to_string()).collect(),
            cwd: None,
            env: Vec::new(),
            capture: true,
        })
    }

    /// Tokenize `command` with POSIX shell-word rules.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Parse`] on unbalanced quotes or an empty line.
    pub fn parse(command: &str) -> Result<Self, CommandError> {
        let argv = shlex::split(command)
            .ok_or_else(|| CommandError::Parse(format!("unbalanced quotes in: {command}")))?;
        Self::from_argv(&argv)
    }

    /// Pass `command` verbatim to the platform shell.
    #[must_use]
    pub fn shell(command: &str) -> Self {
        let (program, flag) = if cfg!(windows) {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };
        Self {
            program: program.to_string(),
            args: vec![flag.to_string(), command.to_string()],
            cwd: None,
            env: Vec::new(),
            capture: true,
        }
    }

    /// Prefix the invocation with `sudo`.
    #[must_use]
    pub fn elevated(self) -> Self {
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            ..self
        }
    }

    /// Command line as shown to the user.
    #[must_use]
    pub fn display(&self) -> String {
        let mut words = Vec::with_capacity(self.args.len() + 1);
        words.push(self.program.as_str());
        words.extend(self.args.iter().map(String::as_str));
        shlex::try_join(words.iter().copied()).unwrap_or_else(|_| words.join(" "))
    }
}

/// Raw outcome of one process run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Process-spawning seam so the runner can be tested without real processes.
#[cfg_attr(test, mockall::automock)]
pub trait Spawner: Send + Sync {
    /// Run `invocation` to completion, bounded by `timeout` when one is given.
    ///
    /// # Errors
    ///
    /// Returns [`CommandError::Spawn`], [`CommandError::TimedOut`] or
    /// [`CommandError::Interrupted`]. A non-zero exit is not an error here.
    fn spawn(&self, invocation: &Invocation, timeout: Option<Duration>)
    -> Result<ProcessOutput, CommandError>;

    /// Resolve `program` on `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;
}

/// Production [`Spawner`] backed by [`std::process`].
#[derive(Debug, Default)]
pub struct SystemSpawner {
    interrupt: Arc<AtomicBool>,
}

impl SystemSpawner {
    /// Create a spawner that kills its child once `interrupt` is set.
    #[must_use]
    pub const fn new(interrupt: Arc<AtomicBool>) -> Self {
        Self { interrupt }
    }
}

fn read_pipe(mut pipe: impl Read) -> String {
    let mut buf = Vec::new();
    pipe.read_to_end(&mut buf).ok();
    String::from_utf8_lossy(&buf).into_owned()
}

fn kill(child: &mut Child) {
    child.kill().ok();
    child.wait().ok();
}

/// Collect a pipe reader, giving up once `deadline` has passed.
///
/// A grandchild that inherited the pipe can hold it open after the child
/// exits; its output is abandoned rather than waited for.
fn collect(reader: Option<&Receiver<String>>, deadline: Option<Instant>) -> String {
    let Some(rx) = reader else {
        return String::new();
    };
    let wait = deadline.map_or(PIPE_GRACE, |d| {
        d.saturating_duration_since(Instant::now())
            .max(POLL_INTERVAL * 4)
    });
    rx.recv_timeout(wait).unwrap_or_default()
}

fn drain(pipe: impl Read + Send + 'static) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || tx.send(read_pipe(pipe)).ok());
    rx
}

impl Spawner for SystemSpawner {
    fn spawn(
        &self,
        invocation: &Invocation,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, CommandError> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }
        cmd.envs(invocation.env.iter().map(|(k, v)| (k, v)));
        if invocation.capture {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = cmd.spawn().map_err(|source| CommandError::Spawn {
            command: invocation.display(),
            source,
        })?;

        // Drain pipes on their own threads so a chatty child cannot block on
        // a full pipe buffer while we poll.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = timeout.map(|t| Instant::now() + t);
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(source) => {
                    kill(&mut child);
                    return Err(CommandError::Spawn {
                        command: invocation.display(),
                        source,
                    });
                }
            }
            if self.interrupt.load(Ordering::SeqCst) {
                kill(&mut child);
                return Err(CommandError::Interrupted(invocation.display()));
            }
            if let (Some(deadline), Some(timeout)) = (deadline, timeout)
                && Instant::now() >= deadline
            {
                kill(&mut child);
                return Err(CommandError::TimedOut {
                    command: invocation.display(),
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ProcessOutput {
            code: status.code(),
            stdout: collect(stdout.as_ref(), deadline),
            stderr: collect(stderr.as_ref(), deadline),
        })
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }
}

/// Outcome of a [`CommandRunner`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// Command line as displayed to the user.
    pub command: String,
    /// Exit code; `-1` when the process was terminated by a signal.
    pub return_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration of the final attempt.
    pub duration: Duration,
    /// Whether the command was simulated rather than executed.
    pub dry_run: bool,
}

impl CommandResult {
    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        self.return_code == 0
    }

    /// Trimmed standard output.
    #[must_use]
    pub fn output(&self) -> &str {
        self.stdout.trim()
    }

    fn simulated(command: String) -> Self {
        Self {
            command,
            return_code: 0,
            stdout: String::new(),
            stderr: String::new(),
            duration: Duration::ZERO,
            dry_run: true,
        }
    }
}

/// Per-call options for [`CommandRunner`].
///
/// Unset fields fall back to the runner's defaults.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Raise on non-zero exit. `run` defaults to `true`, `run_quiet` to `false`.
    pub check: Option<bool>,
    /// Per-attempt timeout.
    pub timeout: Option<Duration>,
    /// Let the command run for as long as it takes.
    pub unbounded: bool,
    /// Additional attempts after a non-zero exit (only with `check`).
    pub retries: Option<u32>,
    /// Working directory.
    pub cwd: Option<PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Pass the command string to the shell verbatim.
    pub shell: bool,
    /// Stream output to the terminal instead of capturing it.
    pub stream: bool,
}

impl RunOptions {
    /// Options with every field unset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override `check`.
    #[must_use]
    pub const fn check(mut self, check: bool) -> Self {
        self.check = Some(check);
        self
    }

    /// Override the per-attempt timeout.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Remove the timeout. For installers and builds whose duration depends
    /// on the network and the machine.
    #[must_use]
    pub const fn no_timeout(mut self) -> Self {
        self.unbounded = true;
        self
    }

    /// Override the retry count.
    #[must_use]
    pub const fn retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Run in `dir`.
    #[must_use]
    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.push((key.to_string(), value.to_string()));
        self
    }

    /// Interpret the command through the shell.
    #[must_use]
    pub const fn shell(mut self) -> Self {
        self.shell = true;
        self
    }

    /// Let the child write directly to the terminal.
    #[must_use]
    pub const fn stream(mut self) -> Self {
        self.stream = true;
        self
    }
}

/// Blocking command runner shared by every task.
pub struct CommandRunner {
    spawner: Arc<dyn Spawner>,
    log: Arc<dyn Log>,
    dry_run: bool,
    timeout: Duration,
    retries: u32,
    retry_delay: Duration,
    interrupt: Arc<AtomicBool>,
}

impl fmt::Debug for CommandRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRunner")
            .field("spawner", &"<dyn Spawner>")
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .field("timeout", &self.timeout)
            .field("retries", &self.retries)
            .field("retry_delay", &self.retry_delay)
            .field("interrupt", &self.interrupt)
            .finish()
    }
}

impl CommandRunner {
    /// Create a runner with default timeout, no retries and a 1s retry delay.
    #[must_use]
    pub fn new(spawner: Arc<dyn Spawner>, log: Arc<dyn Log>) -> Self {
        Self {
            spawner,
            log,
            dry_run: false,
            timeout: DEFAULT_TIMEOUT,
            retries: 0,
            retry_delay: DEFAULT_RETRY_DELAY,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Simulate every command instead of executing it.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Default per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Default retry count for checked commands.
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    /// Base delay between retries.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Share the process-wide interrupt flag.
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Arc<AtomicBool>) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Whether commands are simulated.
    #[must_use]
    pub const fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    /// The interrupt flag shared with the rest of the run.
    #[must_use]
    pub const fn interrupt(&self) -> &Arc<AtomicBool> {
        &self.interrupt
    }

    /// Run `command`, raising on non-zero exit unless `opts.check` is `Some(false)`.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] on parse failure, spawn failure, timeout,
    /// interrupt, or (with `check`) a non-zero exit after all retries.
    pub fn run(&self, command: &str, opts: &RunOptions) -> Result<CommandResult, CommandError> {
        let invocation = self.build(command, opts)?;
        self.execute(invocation, opts, opts.check.unwrap_or(true))
    }

    /// Like [`run`](Self::run) but `check` defaults to `false`.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`] on parse or spawn failure, timeout or
    /// interrupt; a non-zero exit is reported in the result.
    pub fn run_quiet(
        &self,
        command: &str,
        opts: &RunOptions,
    ) -> Result<CommandResult, CommandError> {
        let invocation = self.build(command, opts)?;
        self.execute(invocation, opts, opts.check.unwrap_or(false))
    }

    /// Like [`run`](Self::run) with the invocation prefixed by `sudo`.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_sudo(
        &self,
        command: &str,
        opts: &RunOptions,
    ) -> Result<CommandResult, CommandError> {
        let invocation = self.build(command, opts)?.elevated();
        self.execute(invocation, opts, opts.check.unwrap_or(true))
    }

    /// Run an explicit argument vector. `opts.shell` is ignored.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub fn run_argv<S: AsRef<str>>(
        &self,
        argv: &[S],
        opts: &RunOptions,
    ) -> Result<CommandResult, CommandError> {
        let mut invocation = Invocation::from_argv(argv)?;
        apply_options(&mut invocation, opts);
        self.execute(invocation, opts, opts.check.unwrap_or(true))
    }

    /// Resolve `program` on `PATH`. Probes the real system even in dry-run.
    #[must_use]
    pub fn which(&self, program: &str) -> Option<PathBuf> {
        self.spawner.which(program)
    }

    /// Whether `program` is on `PATH`.
    #[must_use]
    pub fn is_available(&self, program: &str) -> bool {
        self.which(program).is_some()
    }

    fn build(&self, command: &str, opts: &RunOptions) -> Result<Invocation, CommandError> {
        let mut invocation = if opts.shell {
            Invocation::shell(command)
        } else {
            Invocation::parse(command)?
        };
        apply_options(&mut invocation, opts);
        Ok(invocation)
    }

    fn execute(
        &self,
        invocation: Invocation,
        opts: &RunOptions,
        check: bool,
    ) -> Result<CommandResult, CommandError> {
        let display = invocation.display();
        if self.dry_run {
            self.log.dry_run(&format!("Would run: {display}"));
            return Ok(CommandResult::simulated(display));
        }

        let retries = if check {
            opts.retries.unwrap_or(self.retries)
        } else {
            0
        };
        let timeout = if opts.unbounded {
            None
        } else {
            Some(opts.timeout.unwrap_or(self.timeout))
        };
        self.log.debug(&format!("running: {display}"));

        let mut attempt = 0u32;
        loop {
            if self.interrupt.load(Ordering::SeqCst) {
                return Err(CommandError::Interrupted(display));
            }
            let start = Instant::now();
            let output = self.spawner.spawn(&invocation, timeout)?;
            let result = CommandResult {
                command: display.clone(),
                return_code: output.code.unwrap_or(-1),
                stdout: output.stdout,
                stderr: output.stderr,
                duration: start.elapsed(),
                dry_run: false,
            };

            if result.success() || !check {
                return Ok(result);
            }
            if attempt >= retries {
                return Err(CommandError::Failed {
                    command: display,
                    code: result.return_code,
                    stderr: result.stderr.trim().to_string(),
                });
            }

            let delay = self
                .retry_delay
                .saturating_mul(2u32.saturating_pow(attempt));
            attempt += 1;
            self.log.warn(&format!(
                "{display} failed (exit {}), retrying in {:.1}s ({attempt}/{retries})",
                result.return_code,
                delay.as_secs_f64()
            ));
            if !sleep_unless_interrupted(delay, &self.interrupt) {
                return Err(CommandError::Interrupted(display));
            }
        }
    }
}

/// Sleep for `delay`, waking early when `interrupt` is set.
///
/// Returns `false` if the sleep was cut short.
pub(crate) fn sleep_unless_interrupted(delay: Duration, interrupt: &AtomicBool) -> bool {
    let deadline = Instant::now() + delay;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return false;
        }
        let left = deadline.saturating_duration_since(Instant::now());
        if left.is_zero() {
            return true;
        }
        thread::sleep(left.min(POLL_INTERVAL));
    }
}

fn apply_options(invocation: &mut Invocation, opts: &RunOptions) {
    invocation.cwd.clone_from(&opts.cwd);
    invocation.env.clone_from(&opts.env);
    invocation.capture = !opts.stream;
}
