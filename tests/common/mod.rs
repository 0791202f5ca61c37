// Shared helpers for integration tests.
//
// Provides a scripted process spawner and a context factory backed by a
// temporary HOME so each integration test runs in isolation without
// touching the real system.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use system_setup::config::Config;
use system_setup::error::CommandError;
use system_setup::exec::{CommandRunner, Invocation, ProcessOutput, Spawner};
use system_setup::logging::{Log, Logger};
use system_setup::platform::{Architecture, Os, Platform};
use system_setup::state::StateStore;
use system_setup::tasks::Context;

/// Command lines recorded by a [`ScriptedSpawner`].
pub type Calls = Arc<Mutex<Vec<String>>>;

/// A [`Spawner`] that records every invocation and answers from a script.
///
/// Exit codes are taken from the front of `codes`; once the script runs out
/// every command exits with `fallback`.
#[derive(Debug, Default)]
pub struct ScriptedSpawner {
    available: Vec<String>,
    codes: Mutex<VecDeque<i32>>,
    fallback: i32,
    calls: Calls,
}

impl ScriptedSpawner {
    /// Spawner where every program in `available` resolves on `PATH`.
    pub fn new(available: &[&str]) -> Self {
        Self {
            available: available.iter().map(ToString::to_string).collect(),
            ..Self::default()
        }
    }

    /// Answer the next commands with `codes`, then with `fallback`.
    pub fn with_codes(self, codes: &[i32], fallback: i32) -> Self {
        Self {
            codes: Mutex::new(codes.iter().copied().collect()),
            fallback,
            ..self
        }
    }

    /// Shared handle to the recorded command lines.
    pub fn calls(&self) -> Calls {
        Arc::clone(&self.calls)
    }
}

impl Spawner for ScriptedSpawner {
    fn spawn(
        &self,
        invocation: &Invocation,
        _timeout: Option<Duration>,
    ) -> Result<ProcessOutput, CommandError> {
        let mut line = vec![invocation.program.clone()];
        line.extend(invocation.args.iter().cloned());
        self.calls.lock().expect("calls lock").push(line.join(" "));
        let code = self
            .codes
            .lock()
            .expect("codes lock")
            .pop_front()
            .unwrap_or(self.fallback);
        Ok(ProcessOutput {
            code: Some(code),
            stdout: String::new(),
            stderr: format!("exit {code}"),
        })
    }

    fn which(&self, program: &str) -> Option<PathBuf> {
        self.available
            .iter()
            .any(|p| p == program)
            .then(|| PathBuf::from("/usr/bin").join(program))
    }
}

/// An isolated provisioning environment.
pub struct Harness {
    /// Context handed to tasks.
    pub ctx: Context,
    /// Logger behind the context.
    pub log: Arc<Logger>,
    /// Command lines spawned so far.
    pub calls: Calls,
    /// Fake HOME; removed on drop.
    pub home: tempfile::TempDir,
}

impl Harness {
    /// Auto-yes harness on `platform` with `spawner` and `yaml` layered over
    /// the built-in defaults.
    pub fn new(platform: Platform, spawner: ScriptedSpawner, yaml: &str) -> Self {
        Self::build(platform, spawner, yaml, false)
    }

    /// Like [`Harness::new`] in dry-run mode.
    pub fn dry_run(platform: Platform, spawner: ScriptedSpawner, yaml: &str) -> Self {
        Self::build(platform, spawner, yaml, true)
    }

    fn build(platform: Platform, spawner: ScriptedSpawner, yaml: &str, dry_run: bool) -> Self {
        let home = tempfile::tempdir().expect("create temp home");
        let log = Arc::new(Logger::new(None));
        let calls = spawner.calls();
        let runner = CommandRunner::new(Arc::new(spawner), Arc::clone(&log) as Arc<dyn Log>)
            .with_dry_run(dry_run)
            .with_retry_delay(Duration::ZERO);
        let ctx = Context::new(
            Arc::new(Config::from_yaml(yaml).expect("valid yaml")),
            Arc::new(platform),
            Arc::new(StateStore::open_default(home.path())),
            Arc::new(runner),
            Arc::clone(&log) as Arc<dyn Log>,
            home.path().to_path_buf(),
        )
        .with_scratch_root(home.path().join("tmp"))
        .with_auto_yes(true);
        Self {
            ctx,
            log,
            calls,
            home,
        }
    }

    /// Snapshot of the spawned command lines.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }
}

/// An Arch Linux host.
pub fn arch_linux() -> Platform {
    Platform::new(Os::Linux, Architecture::X86_64, Some("arch"))
}
