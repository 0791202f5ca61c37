//! Named, idempotent provisioning tasks and the contract they run under.
pub mod chezmoi;
pub mod context;
pub mod dotfiles;
pub mod fish;
pub mod graph;
pub mod hyprland;
pub mod modern_tools;
pub mod packages;
pub mod registry;
pub mod settings;
pub mod shell;

pub use context::{Context, Prompt, StdinPrompt, home_dir};
pub use registry::{TaskInfo, TaskRegistry, default_registry};

use anyhow::Result;

use crate::error::StateError;
use crate::logging::TaskStatus;
use crate::platform::{Os, Platform};

/// Outcome of a task body that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskResult {
    /// All work done. The task's state key is marked complete.
    Ok,
    /// Deliberately not done (declined, disabled in config). The state key
    /// stays unset so a later run asks again.
    Skipped(String),
}

/// A named, idempotent unit of provisioning work.
///
/// Tasks are stateless: everything a run needs arrives through the
/// [`Context`], so one registry can build fresh instances for any run.
pub trait Task: Send + Sync {
    /// Stable identifier used for CLI selection.
    fn name(&self) -> &'static str;

    /// Human-readable description, also used as the stage header.
    fn description(&self) -> &'static str;

    /// Operating systems the task applies to. Empty means all.
    fn platforms(&self) -> &'static [Os] {
        &[]
    }

    /// Tasks that must run before this one when both are selected.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    /// Ledger key recording completion.
    fn state_key(&self) -> String {
        format!("{}_configured", self.name())
    }

    /// Whether the task applies to `platform`.
    fn is_supported(&self, platform: &Platform) -> bool {
        let platforms = self.platforms();
        platforms.is_empty() || platforms.contains(&platform.os)
    }

    /// Execute the task body.
    ///
    /// # Errors
    ///
    /// Returns an error if the work could not be completed. A
    /// [`StateError`] anywhere in the chain stops the whole run.
    fn run(&self, ctx: &Context) -> Result<TaskResult>;
}

/// Run one task through the ledger and record its outcome in the logger.
///
/// Unsupported and already-complete tasks are reported without running.
/// The state key is marked only when the body returns [`TaskResult::Ok`]
/// outside dry-run mode.
///
/// # Errors
///
/// Returns [`StateError`] when the ledger cannot be written. Every other
/// failure is logged and recorded as [`TaskStatus::Failed`].
pub fn execute(task: &dyn Task, ctx: &Context) -> Result<TaskStatus, StateError> {
    let name = task.name();
    if !task.is_supported(&ctx.platform) {
        ctx.log.info(&format!(
            "Skipping {name}: not supported on {}",
            ctx.platform.os
        ));
        return Ok(record(ctx, name, TaskStatus::NotApplicable, None));
    }

    let key = task.state_key();
    if ctx.state.is_complete(&key) {
        ctx.log
            .info(&format!("{} already complete (skipping)", task.description()));
        return Ok(record(ctx, name, TaskStatus::AlreadyComplete, None));
    }

    ctx.log.stage(task.description());

    match task.run(ctx) {
        Ok(TaskResult::Ok) if ctx.dry_run => Ok(record(ctx, name, TaskStatus::DryRun, None)),
        Ok(TaskResult::Ok) => {
            ctx.state.mark_complete(&key).inspect_err(|e| {
                ctx.log.error(&format!("{name}: {e}"));
                record(ctx, name, TaskStatus::Failed, Some(&e.to_string()));
            })?;
            Ok(record(ctx, name, TaskStatus::Ok, None))
        }
        Ok(TaskResult::Skipped(reason)) => {
            ctx.log.info(&format!("skipped: {reason}"));
            Ok(record(ctx, name, TaskStatus::Skipped, Some(&reason)))
        }
        Err(e) => {
            let message = format!("{e:#}");
            ctx.log.error(&format!("{name}: {message}"));
            record(ctx, name, TaskStatus::Failed, Some(&message));
            match e.downcast::<StateError>() {
                Ok(fatal) => Err(fatal),
                Err(_) => Ok(TaskStatus::Failed),
            }
        }
    }
}

fn record(ctx: &Context, name: &str, status: TaskStatus, message: Option<&str>) -> TaskStatus {
    ctx.log.record_task(name, status, message);
    status
}
