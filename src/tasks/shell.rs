//! Default login shell.
use anyhow::{Context as _, Result};

use super::{Context, Task, TaskResult};
use crate::platform::Os;
use crate::resources::shell;

/// Make zsh the login shell.
#[derive(Debug, Default)]
pub struct ShellTask;

impl Task for ShellTask {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn description(&self) -> &'static str {
        "Shell Configuration"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["packages"]
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let current = std::env::var("SHELL").ok();
        configure(ctx, current.as_deref())
    }
}

fn configure(ctx: &Context, current: Option<&str>) -> Result<TaskResult> {
    if ctx.platform.os == Os::Windows {
        ctx.log.info("Windows shell configuration not yet implemented");
        return Ok(TaskResult::Ok);
    }
    if shell::is_current_shell(current, "zsh") {
        ctx.log.info("zsh is already the default shell");
        return Ok(TaskResult::Ok);
    }

    let zsh = ctx.platform.zsh_path();
    // A decline still completes the task.
    if !ctx.confirm(&format!("Set {} as default shell?", zsh.display())) {
        ctx.log.info("Skipped shell configuration");
        return Ok(TaskResult::Ok);
    }

    if ctx.platform.is_macos() {
        match shell::ensure_listed(&ctx.runner, &zsh) {
            Ok(true) => ctx
                .log
                .info(&format!("Added {} to {}", zsh.display(), shell::ETC_SHELLS)),
            Ok(false) => {}
            Err(e) => ctx
                .log
                .warn(&format!("Could not modify {}: {e}", shell::ETC_SHELLS)),
        }
    }
    ctx.log
        .info(&format!("Changing default shell to {}...", zsh.display()));
    shell::set_login_shell(&ctx.runner, &zsh).context("changing login shell")?;
    ctx.log.info("Shell changed successfully");
    Ok(TaskResult::Ok)
}
