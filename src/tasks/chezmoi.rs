//! Dotfiles managed through chezmoi.
use std::path::PathBuf;

use anyhow::{Context as _, Result};

use super::{Context, Task, TaskResult};
use crate::exec::RunOptions;

/// Longest `chezmoi diff` excerpt shown before the apply prompt, in chars.
const DIFF_PREVIEW_CHARS: usize = 2000;

/// Official chezmoi installer, used when no package manager can install it.
const INSTALL_SCRIPT: &str = "curl -fsLS get.chezmoi.io | sh";

/// Manage dotfiles with chezmoi: install, init or update, then apply.
#[derive(Debug, Default)]
pub struct ChezmoiTask;

impl Task for ChezmoiTask {
    fn name(&self) -> &'static str {
        "chezmoi"
    }

    fn description(&self) -> &'static str {
        "Chezmoi Dotfiles Management"
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        ensure_installed(ctx)?;
        init_or_update(ctx)?;
        apply(ctx)?;
        ctx.log.info("Chezmoi configuration complete");
        Ok(TaskResult::Ok)
    }
}

/// Chezmoi's source directory.
fn source_dir(ctx: &Context) -> PathBuf {
    ctx.home.join(".local").join("share").join("chezmoi")
}

/// Argument vector for `chezmoi init`, with `--ssh` for GitHub references
/// that are not HTTP URLs.
fn init_argv(repo: Option<&str>) -> Vec<String> {
    let mut argv = vec!["chezmoi".to_string(), "init".to_string()];
    if let Some(repo) = repo {
        argv.push(repo.to_string());
        if repo.contains("github.com") && !repo.starts_with("http") {
            argv.push("--ssh".to_string());
        }
    }
    argv
}

fn ensure_installed(ctx: &Context) -> Result<()> {
    if ctx.runner.is_available("chezmoi") {
        ctx.log.info("Chezmoi is already installed");
        return Ok(());
    }
    ctx.log.info("Installing chezmoi...");
    if let Some(manager) = ctx.package_manager() {
        match manager.install(&ctx.runner, &["chezmoi"]) {
            Ok(()) => {
                ctx.log.info("Chezmoi installed via package manager");
                return Ok(());
            }
            Err(e) => ctx.log.warn(&format!("{e}; trying the install script")),
        }
    }
    ctx.runner
        .run_argv(&["sh", "-c", INSTALL_SCRIPT], &RunOptions::new().stream())
        .context("installing chezmoi")?;
    ctx.log.info("Chezmoi installed via install script");
    Ok(())
}

fn init_or_update(ctx: &Context) -> Result<()> {
    let repo = ctx.config.chezmoi_repo();
    let initialised = source_dir(ctx).exists();
    match (initialised, repo.as_deref()) {
        (true, Some(_)) => {
            ctx.log.info("Updating chezmoi from remote...");
            if let Err(e) = ctx.runner.run_argv(
                &["chezmoi", "git", "pull", "--", "--rebase"],
                &RunOptions::new().stream(),
            ) {
                ctx.log.warn(&format!("Failed to update from remote: {e}"));
            }
        }
        (true, None) => ctx.log.debug("chezmoi source directory already exists"),
        (false, repo) => {
            match repo {
                Some(url) => ctx.log.info(&format!("Initializing chezmoi from {url}...")),
                None => ctx
                    .log
                    .info("No dotfiles repo configured, initializing empty chezmoi"),
            }
            ctx.runner
                .run_argv(&init_argv(repo), &RunOptions::new().stream())
                .context("initializing chezmoi")?;
        }
    }
    Ok(())
}

fn apply(ctx: &Context) -> Result<()> {
    if !ctx.auto_yes && !ctx.dry_run {
        ctx.log.info("Checking for changes...");
        let diff = ctx
            .runner
            .run_argv(&["chezmoi", "diff"], &RunOptions::new().check(false))
            .context("running chezmoi diff")?;
        if diff.output().is_empty() {
            ctx.log.info("No changes to apply");
            return Ok(());
        }
        ctx.log.info("Changes to be applied:");
        ctx.log.info(truncate(&diff.stdout, DIFF_PREVIEW_CHARS));
        if diff.stdout.chars().count() > DIFF_PREVIEW_CHARS {
            ctx.log.info("... (output truncated)");
        }
    }
    if !ctx.confirm("Apply chezmoi dotfiles?") {
        ctx.log.info("Skipping chezmoi apply");
        return Ok(());
    }
    ctx.runner
        .run_argv(
            &["chezmoi", "apply", "--verbose"],
            &RunOptions::new().stream().no_timeout(),
        )
        .context("applying chezmoi dotfiles")?;
    Ok(())
}

/// First `max` characters of `text`.
fn truncate(text: &str, max: usize) -> &str {
    text.char_indices()
        .nth(max)
        .and_then(|(end, _)| text.get(..end))
        .unwrap_or(text)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::exec::{MockSpawner, ProcessOutput};
    use crate::logging::TaskStatus;
    use crate::tasks::context::MockPrompt;
    use crate::tasks::execute;
    use crate::tasks::test_helpers::{
        Calls, arch_linux, command_line, make_context, make_context_with,
    };

    #[test]
    fn init_argv_adds_ssh_for_github_shorthand() {
        assert_eq!(init_argv(None), ["chezmoi", "init"]);
        assert_eq!(
            init_argv(Some("git@github.com:me/dotfiles.git")),
            ["chezmoi", "init", "git@github.com:me/dotfiles.git", "--ssh"]
        );
        assert_eq!(
            init_argv(Some("https://github.com/me/dotfiles")),
            ["chezmoi", "init", "https://github.com/me/dotfiles"]
        );
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn fresh_init_from_repo_then_apply() {
        let t = make_context(
            arch_linux(),
            &["chezmoi"],
            0,
            "chezmoi: {repo: https://example.com/dots.git}",
        );
        assert_eq!(execute(&ChezmoiTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(
            t.calls(),
            [
                "chezmoi init https://example.com/dots.git",
                "chezmoi apply --verbose",
            ]
        );
        assert!(t.ctx.state.is_complete("chezmoi_configured"));
    }

    #[test]
    fn existing_source_dir_pulls_and_tolerates_failure() {
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let mut spawner = MockSpawner::new();
        spawner.expect_spawn().returning(move |inv, _| {
            let line = command_line(inv);
            let code = i32::from(line.contains("pull"));
            sink.lock().unwrap().push(line);
            Ok(ProcessOutput {
                code: Some(code),
                ..ProcessOutput::default()
            })
        });
        spawner
            .expect_which()
            .returning(|_| Some("/usr/bin/chezmoi".into()));
        let t = make_context_with(arch_linux(), spawner, calls, "dotfiles: {repo: me/dots}");
        std::fs::create_dir_all(source_dir(&t.ctx)).unwrap();

        assert_eq!(execute(&ChezmoiTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(
            t.calls(),
            ["chezmoi git pull -- --rebase", "chezmoi apply --verbose"]
        );
    }

    #[test]
    fn falls_back_to_install_script() {
        // No chezmoi and no package manager on PATH.
        let t = make_context(arch_linux(), &[], 0, "");
        execute(&ChezmoiTask, &t.ctx).unwrap();
        assert_eq!(t.calls()[0], format!("sh -c {INSTALL_SCRIPT}"));
        assert_eq!(t.calls()[1], "chezmoi init");
    }

    #[test]
    fn empty_diff_skips_apply() {
        let t = make_context(arch_linux(), &["chezmoi"], 0, "");
        std::fs::create_dir_all(source_dir(&t.ctx)).unwrap();
        let mut prompt = MockPrompt::new();
        prompt.expect_confirm().never();
        let ctx = t.ctx.with_auto_yes(false).with_prompt(Arc::new(prompt));
        assert_eq!(execute(&ChezmoiTask, &ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(*t.calls.lock().unwrap(), ["chezmoi diff"]);
    }

    #[test]
    fn failed_apply_fails_the_task() {
        let t = make_context(arch_linux(), &["chezmoi"], 1, "");
        std::fs::create_dir_all(source_dir(&t.ctx)).unwrap();
        assert_eq!(execute(&ChezmoiTask, &t.ctx).unwrap(), TaskStatus::Failed);
        assert!(!t.ctx.state.is_complete("chezmoi_configured"));
    }
}
