//! Fish shell with fisher, plugins and abbreviations.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, anyhow};

use super::{Context, Task, TaskResult};
use crate::exec::RunOptions;
use crate::platform::Os;
use crate::resources::shell;

/// Fisher bootstrap, piped straight into the running fish.
const FISHER_INSTALL: &str = "curl -sL https://raw.githubusercontent.com/jorgebucaran/fisher/main/functions/fisher.fish | source && fisher install jorgebucaran/fisher";

/// Installed by the bootstrap itself.
const FISHER_PLUGIN: &str = "jorgebucaran/fisher";

const CONFIG_TEMPLATE: &str = r#"# Fish shell configuration
# Generated by system-setup

set -g fish_greeting

set -gx EDITOR nvim
set -gx VISUAL nvim
set -gx PAGER less

set -gx XDG_CONFIG_HOME $HOME/.config
set -gx XDG_DATA_HOME $HOME/.local/share
set -gx XDG_CACHE_HOME $HOME/.cache
set -gx XDG_STATE_HOME $HOME/.local/state

fish_add_path $HOME/.local/bin
fish_add_path $HOME/.cargo/bin

if command -q mise
    mise activate fish | source
end

if command -q zoxide
    zoxide init fish | source
end

if command -q starship
    starship init fish | source
end

set -gx FZF_DEFAULT_OPTS "--height 40% --layout=reverse --border"

if command -q eza
    alias ls='eza'
    alias tree='eza --tree'
end

if command -q bat
    alias cat='bat --paging=never'
end

if test "$XDG_SESSION_TYPE" = "wayland"
    set -gx MOZ_ENABLE_WAYLAND 1
    set -gx QT_QPA_PLATFORM wayland
end

function mkcd -d "Create directory and cd into it"
    mkdir -p $argv[1] && cd $argv[1]
end
"#;

/// Install and configure the fish shell with fisher, plugins and
/// abbreviations.
#[derive(Debug, Default)]
pub struct FishTask;

impl Task for FishTask {
    fn name(&self) -> &'static str {
        "fish"
    }

    fn description(&self) -> &'static str {
        "Fish Shell Configuration"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::MacOs, Os::Linux]
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["packages"]
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.config.fish_enabled() {
            return Ok(TaskResult::Skipped("disabled in configuration".into()));
        }
        let fish = ensure_installed(ctx)?;
        if ctx.config.fish_set_default() {
            let current = std::env::var("SHELL").ok();
            set_default_shell(ctx, &fish, current.as_deref())?;
        }
        install_fisher(ctx)?;
        install_plugins(ctx);
        write_config(ctx)?;
        add_abbreviations(ctx);
        ctx.log.info("Fish shell configuration complete");
        ctx.log.info("Run 'tide configure' to customize your prompt");
        Ok(TaskResult::Ok)
    }
}

fn fish_dir(ctx: &Context) -> PathBuf {
    ctx.config_dir().join("fish")
}

/// Path of the fish binary, installing it first when missing.
fn ensure_installed(ctx: &Context) -> Result<PathBuf> {
    if let Some(path) = ctx.runner.which("fish") {
        ctx.log.info("Fish shell is already installed");
        return Ok(path);
    }
    ctx.log.info("Installing Fish shell...");
    let manager = ctx
        .package_manager()
        .ok_or_else(|| anyhow!("no package manager available to install fish"))?;
    manager
        .install(&ctx.runner, &["fish"])
        .context("installing fish")?;
    Ok(ctx
        .runner
        .which("fish")
        .unwrap_or_else(|| PathBuf::from("/usr/bin/fish")))
}

/// Make `fish` the login shell unless `current` already runs fish.
fn set_default_shell(ctx: &Context, fish: &Path, current: Option<&str>) -> Result<()> {
    if shell::is_current_shell(current, "fish") {
        ctx.log.info("Fish is already the default shell");
        return Ok(());
    }
    if !ctx.confirm(&format!("Set {} as default shell?", fish.display())) {
        ctx.log.info("Skipping shell change");
        return Ok(());
    }
    if ctx.platform.is_linux() {
        match shell::ensure_listed(&ctx.runner, fish) {
            Ok(true) => ctx
                .log
                .info(&format!("Added {} to {}", fish.display(), shell::ETC_SHELLS)),
            Ok(false) => {}
            Err(e) => ctx
                .log
                .warn(&format!("Could not modify {}: {e}", shell::ETC_SHELLS)),
        }
    }
    ctx.log
        .info(&format!("Changing default shell to {}...", fish.display()));
    shell::set_login_shell(&ctx.runner, fish).context("changing login shell")?;
    Ok(())
}

fn install_fisher(ctx: &Context) -> Result<()> {
    if fish_dir(ctx).join("functions").join("fisher.fish").exists() {
        ctx.log.info("Fisher is already installed");
        return Ok(());
    }
    ctx.log.info("Installing Fisher plugin manager...");
    ctx.runner
        .run_argv(&["fish", "-c", FISHER_INSTALL], &RunOptions::new().stream())
        .context("installing fisher")?;
    Ok(())
}

fn install_plugins(ctx: &Context) {
    ctx.log.info("Installing Fish plugins...");
    for plugin in ctx.config.fish_plugins() {
        if plugin == FISHER_PLUGIN {
            continue;
        }
        let script = fish_command(&["fisher", "install", &plugin]);
        ctx.log.info(&format!("  Installing {plugin}..."));
        if let Err(e) = ctx
            .runner
            .run_argv(&["fish", "-c", script.as_str()], &RunOptions::new().stream())
        {
            ctx.log.warn(&format!("Failed to install {plugin}: {e}"));
        }
    }
}

fn write_config(ctx: &Context) -> Result<()> {
    let path = fish_dir(ctx).join("config.fish");
    if path.exists() {
        ctx.log.info("Fish config already exists, preserving");
        return Ok(());
    }
    ctx.write_file(&path, CONFIG_TEMPLATE)
}

fn add_abbreviations(ctx: &Context) {
    ctx.log.info("Setting up abbreviations...");
    let quiet = RunOptions::new().check(false);
    for (abbr, expansion) in ctx.config.fish_abbreviations() {
        let script = fish_command(&["abbr", "-a", &abbr, &expansion]);
        // An existing abbreviation makes fish exit non-zero; that is fine.
        ctx.runner
            .run_argv(&["fish", "-c", script.as_str()], &quiet)
            .ok();
    }
}

/// Quote `words` into one fish command line.
fn fish_command(words: &[&str]) -> String {
    words
        .iter()
        .copied()
        .map(fish_quote)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote one word for fish. Inside single quotes fish only unescapes `\\`
/// and `\'`, so those are the two sequences escaped.
fn fish_quote(word: &str) -> String {
    let bare = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_-./:=,+@".contains(c));
    if bare {
        return word.to_string();
    }
    let mut quoted = String::with_capacity(word.len() + 2);
    quoted.push('\'');
    for c in word.chars() {
        if matches!(c, '\\' | '\'') {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}
