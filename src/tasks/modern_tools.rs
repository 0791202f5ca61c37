//! Modern command-line replacements and developer tools.
use anyhow::{Context as _, Result, anyhow};

use super::{Context, Task, TaskResult};
use crate::exec::RunOptions;
use crate::resources::PackageManager;

/// An installable tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Tool {
    /// Name used in `modern_tools.skip`.
    name: &'static str,
    /// Binary probed on `PATH`.
    command: &'static str,
    /// Package providing the binary.
    package: &'static str,
    description: &'static str,
}

const fn tool(
    name: &'static str,
    command: &'static str,
    package: &'static str,
    description: &'static str,
) -> Tool {
    Tool {
        name,
        command,
        package,
        description,
    }
}

const MODERN_CLI_TOOLS: &[Tool] = &[
    tool("eza", "eza", "eza", "Modern ls replacement with git integration"),
    tool("bat", "bat", "bat", "Cat clone with syntax highlighting"),
    tool("fd", "fd", "fd", "Fast and user-friendly find alternative"),
    tool("ripgrep", "rg", "ripgrep", "Fast recursive grep alternative"),
    tool("sd", "sd", "sd", "Intuitive find & replace"),
    tool("dust", "dust", "dust", "More intuitive du"),
    tool("duf", "duf", "duf", "Better disk usage/free utility"),
    tool("procs", "procs", "procs", "Modern replacement for ps"),
    tool("bottom", "btm", "bottom", "Graphical process/system monitor"),
    tool("btop", "btop", "btop", "Resource monitor"),
    tool("zoxide", "zoxide", "zoxide", "Smarter cd that learns"),
    tool("fzf", "fzf", "fzf", "Fuzzy finder"),
    tool("delta", "delta", "git-delta", "Syntax-highlighting pager for git"),
    tool("jq", "jq", "jq", "Command-line JSON processor"),
    tool("yq", "yq", "yq", "Command-line YAML processor"),
];

const DEV_TOOLS: &[Tool] = &[
    tool("mise", "mise", "mise", "Polyglot version manager"),
    tool("starship", "starship", "starship", "Cross-shell prompt"),
    tool("lazygit", "lazygit", "lazygit", "Terminal UI for git"),
    tool("lazydocker", "lazydocker", "lazydocker", "Terminal UI for docker"),
    tool("tokei", "tokei", "tokei", "Count lines of code"),
    tool("hyperfine", "hyperfine", "hyperfine", "Command-line benchmarking"),
    tool("tealdeer", "tldr", "tealdeer", "Fast tldr client"),
];

/// Packages only published in the AUR.
const AUR_ONLY: &[&str] = &["lazydocker"];

/// Global git settings that route diffs through delta.
const DELTA_GIT_CONFIG: &[(&str, &str)] = &[
    ("core.pager", "delta"),
    ("interactive.diffFilter", "delta --color-only"),
    ("delta.navigate", "true"),
    ("delta.light", "false"),
    ("delta.side-by-side", "true"),
    ("delta.line-numbers", "true"),
    ("merge.conflictStyle", "diff3"),
    ("diff.colorMoved", "default"),
];

const MISE_CONFIG: &str = r#"# mise configuration
# https://mise.jdx.dev/

[settings]
legacy_version_file = true
always_keep_download = false
always_keep_install = false
plugin_autoupdate_last_check_duration = "7d"
trusted_config_paths = ["~/.config/mise"]

[tools]
# python = "latest"
# node = "lts"
# go = "latest"
"#;

const STARSHIP_CONFIG: &str = r#"# Starship prompt configuration
# https://starship.rs/config/

command_timeout = 500

format = """
$directory$git_branch$git_status$python$nodejs$rust$golang$cmd_duration
$character"""

[character]
success_symbol = "[>](bold green)"
error_symbol = "[>](bold red)"

[directory]
truncation_length = 3
truncate_to_repo = true
style = "bold cyan"

[git_branch]
style = "bold purple"

[git_status]
style = "bold yellow"
conflicted = "!"
ahead = "^"
behind = "v"
diverged = "^v"
modified = "*"
staged = "+"
untracked = "?"

[cmd_duration]
min_time = 2_000
style = "bold yellow"
format = "[$duration]($style) "
"#;

/// Packages to install for one tool table.
#[derive(Debug, Default, PartialEq, Eq)]
struct Plan {
    /// Installed with the platform package manager.
    native: Vec<&'static str>,
    /// Installed through paru.
    aur: Vec<&'static str>,
    /// AUR-only packages with no AUR helper to install them.
    unavailable: Vec<&'static str>,
}

impl Plan {
    fn is_empty(&self) -> bool {
        self.native.is_empty() && self.aur.is_empty()
    }
}

/// Split the missing, non-skipped tools of `tools` by how they install.
fn plan(
    tools: &[Tool],
    skip: &[String],
    installed: impl Fn(&str) -> bool,
    has_aur: bool,
) -> Plan {
    let mut plan = Plan::default();
    for t in tools {
        if skip.iter().any(|s| s == t.name) || installed(t.command) {
            continue;
        }
        if !AUR_ONLY.contains(&t.package) {
            plan.native.push(t.package);
        } else if has_aur {
            plan.aur.push(t.package);
        } else {
            plan.unavailable.push(t.package);
        }
    }
    plan
}

/// Install modern CLI replacements and developer tools, then configure them.
#[derive(Debug, Default)]
pub struct ModernToolsTask;

impl Task for ModernToolsTask {
    fn name(&self) -> &'static str {
        "modern-tools"
    }

    fn description(&self) -> &'static str {
        "Modern CLI Tools Installation"
    }

    fn state_key(&self) -> String {
        "modern_tools_installed".to_string()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.config.modern_tools_enabled() {
            return Ok(TaskResult::Skipped("disabled in configuration".into()));
        }
        let manager = ctx
            .package_manager()
            .ok_or_else(|| anyhow!("no package manager available"))?;
        let skip = ctx.config.modern_tools_skip();

        ctx.log.info("Installing core modern tools...");
        install(ctx, manager, MODERN_CLI_TOOLS, &skip).context("installing core tools")?;
        ctx.log.info("Installing development tools...");
        install(ctx, manager, DEV_TOOLS, &skip).context("installing development tools")?;

        if ctx.runner.is_available("mise") {
            write_if_absent(ctx, "mise", &["mise", "config.toml"], MISE_CONFIG)?;
        }
        if ctx.runner.is_available("starship") {
            write_if_absent(ctx, "starship", &["starship.toml"], STARSHIP_CONFIG)?;
        }
        if ctx.runner.is_available("delta") {
            configure_delta(ctx);
        }
        if ctx.runner.is_available("tldr") {
            ctx.log.info("Updating tldr cache...");
            if let Err(e) = ctx.runner.run_argv(&["tldr", "--update"], &RunOptions::new()) {
                ctx.log.warn(&format!("Failed to update tldr cache: {e}"));
            }
        }
        ctx.log.info("Modern tools installation complete");
        Ok(TaskResult::Ok)
    }
}

fn install(ctx: &Context, manager: PackageManager, tools: &[Tool], skip: &[String]) -> Result<()> {
    let plan = plan(
        tools,
        skip,
        |command| ctx.runner.is_available(command),
        manager == PackageManager::Paru,
    );
    for package in &plan.unavailable {
        ctx.log
            .info(&format!("  {package} is only in the AUR, skipping without paru"));
    }
    if plan.is_empty() {
        ctx.log.info("All tools already installed");
        return Ok(());
    }
    for t in tools
        .iter()
        .filter(|t| plan.native.contains(&t.package) || plan.aur.contains(&t.package))
    {
        ctx.log.info(&format!("  {}: {}", t.name, t.description));
    }
    manager.install(&ctx.runner, &plan.native)?;
    if let Err(e) = PackageManager::install_aur(&ctx.runner, &plan.aur) {
        ctx.log.warn(&format!("Some AUR packages failed to install: {e}"));
    }
    Ok(())
}

/// Write a config template under `~/.config` unless the user already has one.
fn write_if_absent(ctx: &Context, tool: &str, relative: &[&str], contents: &str) -> Result<()> {
    let path = relative
        .iter()
        .fold(ctx.config_dir(), |path, part| path.join(part));
    if path.exists() {
        ctx.log.info(&format!("{tool} config already exists"));
        return Ok(());
    }
    ctx.log.info(&format!("Configuring {tool}..."));
    ctx.write_file(&path, contents)
}

fn configure_delta(ctx: &Context) {
    ctx.log.info("Configuring git-delta...");
    for &(key, value) in DELTA_GIT_CONFIG {
        if let Err(e) = ctx.runner.run_argv(
            &["git", "config", "--global", key, value],
            &RunOptions::new(),
        ) {
            ctx.log.warn(&format!("Failed to set git config {key}: {e}"));
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::TaskStatus;
    use crate::platform::{Architecture, Os, Platform};
    use crate::tasks::execute;
    use crate::tasks::test_helpers::{arch_linux, make_context};

    fn debian() -> Platform {
        Platform::new(Os::Linux, Architecture::X86_64, Some("debian"))
    }

    #[test]
    fn plan_skips_installed_and_configured_tools() {
        let skip = vec!["bat".to_string()];
        let plan = plan(MODERN_CLI_TOOLS, &skip, |cmd| cmd != "rg" && cmd != "bat" && cmd != "delta", false);
        assert_eq!(plan.native, ["ripgrep", "git-delta"]);
        assert!(plan.aur.is_empty());
    }

    #[test]
    fn plan_routes_aur_only_packages() {
        let none = |_: &str| false;
        let with_paru = plan(DEV_TOOLS, &[], none, true);
        assert_eq!(with_paru.aur, ["lazydocker"]);
        assert!(!with_paru.native.contains(&"lazydocker"));

        let without = plan(DEV_TOOLS, &[], none, false);
        assert!(without.aur.is_empty());
        assert_eq!(without.unavailable, ["lazydocker"]);
        assert_eq!(without.native.len(), DEV_TOOLS.len() - 1);
    }

    #[test]
    fn paru_installs_native_then_aur() {
        let t = make_context(arch_linux(), &["paru"], 0, "");
        assert_eq!(execute(&ModernToolsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        let calls = t.calls();
        assert!(calls[0].starts_with("paru -S --needed --noconfirm eza bat fd ripgrep"));
        assert!(calls[0].contains("git-delta"));
        assert_eq!(calls[1], "paru -S --needed --noconfirm mise starship lazygit tokei hyperfine tealdeer");
        assert_eq!(calls[2], "paru -S --aur --needed --noconfirm lazydocker");
        assert!(t.ctx.state.is_complete("modern_tools_installed"));
    }

    #[test]
    fn present_tools_are_configured() {
        let available: &[&str] = &[
            "apt", "eza", "bat", "fd", "rg", "sd", "dust", "duf", "procs", "btm", "btop",
            "zoxide", "fzf", "delta", "jq", "yq", "mise", "starship", "lazygit", "lazydocker",
            "tokei", "hyperfine", "tldr",
        ];
        let t = make_context(debian(), available, 0, "");
        assert_eq!(execute(&ModernToolsTask, &t.ctx).unwrap(), TaskStatus::Ok);

        let calls = t.calls();
        assert_eq!(calls.len(), DELTA_GIT_CONFIG.len() + 1);
        assert_eq!(calls[0], "git config --global core.pager delta");
        assert_eq!(calls.last().unwrap(), "tldr --update");
        assert!(t.ctx.config_dir().join("mise/config.toml").is_file());
        assert!(t.ctx.config_dir().join("starship.toml").is_file());
    }

    #[test]
    fn existing_configs_are_kept() {
        let t = make_context(debian(), &["apt", "starship"], 0, "modern_tools: {skip: [eza]}");
        let path = t.ctx.config_dir().join("starship.toml");
        std::fs::create_dir_all(t.ctx.config_dir()).unwrap();
        std::fs::write(&path, "# mine").unwrap();

        execute(&ModernToolsTask, &t.ctx).unwrap();

        assert_eq!(std::fs::read_to_string(path).unwrap(), "# mine");
        assert!(!t.calls()[0].contains("eza"));
    }

    #[test]
    fn native_install_failure_fails() {
        let t = make_context(debian(), &["apt"], 1, "");
        assert_eq!(execute(&ModernToolsTask, &t.ctx).unwrap(), TaskStatus::Failed);
        assert!(!t.ctx.state.is_complete("modern_tools_installed"));
    }

    #[test]
    fn delta_and_tldr_failures_are_warnings() {
        let t = make_context(debian(), &["apt", "delta", "tldr"], 1, "modern_tools: {skip: [eza, bat, fd, ripgrep, sd, dust, duf, procs, bottom, btop, zoxide, fzf, jq, yq, mise, starship, lazygit, lazydocker, tokei, hyperfine]}");
        assert_eq!(execute(&ModernToolsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(t.log.summary().errors.len(), 0);
    }

    #[test]
    fn disabled_is_a_skip() {
        let t = make_context(debian(), &["apt"], 0, "modern_tools: {enabled: false}");
        assert_eq!(execute(&ModernToolsTask, &t.ctx).unwrap(), TaskStatus::Skipped);
        assert!(t.calls().is_empty());
    }
}
