//! Hyprland desktop environment.
//!
//! Each phase is recorded under its own ledger key so an interrupted setup
//! resumes at the first phase that has not finished.
use std::path::PathBuf;

use anyhow::{Context as _, Result, anyhow};

use super::{Context, Task, TaskResult};
use crate::config::ThemeColors;
use crate::platform::Os;
use crate::resources::PackageManager;
use crate::resources::package::ensure_paru;

const CORE_PACKAGES: &[&str] = &[
    "hyprland",
    "hyprlock",
    "hypridle",
    "hyprshot",
    "xdg-desktop-portal-hyprland",
];

const UTILITY_PACKAGES: &[&str] = &[
    "swww",
    "waypaper",
    "wl-clipboard",
    "cliphist",
    "grim",
    "slurp",
    "satty",
    "wf-recorder",
    "brightnessctl",
];

const TERMINAL_PACKAGES: &[&str] = &["ghostty"];

const FILE_MANAGER_PACKAGES: &[&str] = &[
    "nemo",
    "yazi",
    "ffmpegthumbnailer",
    "p7zip",
    "jq",
    "poppler",
    "fd",
    "ripgrep",
    "fzf",
    "zoxide",
];

/// Only installable through an AUR helper.
const AUR_PACKAGES: &[&str] = &["ags-hyprpanel-git", "walker"];

const HYPRLOCK_CONF: &str = "# Hyprlock Configuration

background {
    monitor =
    path = screenshot
    blur_passes = 3
    blur_size = 8
}

input-field {
    monitor =
    size = 200, 50
    outline_thickness = 3
    outer_color = rgb(cba6f7)
    inner_color = rgb(1e1e2e)
    font_color = rgb(cdd6f4)
    fade_on_empty = true
    placeholder_text = <i>Enter Password...</i>
    rounding = 15
    check_color = rgb(a6e3a1)
    fail_color = rgb(f38ba8)
    position = 0, -20
    halign = center
    valign = center
}

label {
    monitor =
    text = $TIME
    color = rgb(cdd6f4)
    font_size = 64
    position = 0, 80
    halign = center
    valign = center
}
";

const HYPRIDLE_CONF: &str = "# Hypridle Configuration

general {
    lock_cmd = pidof hyprlock || hyprlock
    before_sleep_cmd = loginctl lock-session
    after_sleep_cmd = hyprctl dispatch dpms on
}

listener {
    timeout = 300
    on-timeout = brightnessctl -s set 30%
    on-resume = brightnessctl -r
}

listener {
    timeout = 600
    on-timeout = loginctl lock-session
}

listener {
    timeout = 660
    on-timeout = hyprctl dispatch dpms off
    on-resume = hyprctl dispatch dpms on
}

listener {
    timeout = 1800
    on-timeout = systemctl suspend
}
";

const KEYBINDS_SCRIPT: &str = r#"#!/bin/bash
# Show keybindings in a launcher popup

keybinds="=== APPS ===
SUPER + T : Terminal
SUPER + E : File manager
SUPER + R : App launcher
SUPER + V : Clipboard history
SUPER + / : This help
---
=== WINDOWS ===
SUPER + Q : Close window
SUPER + F : Toggle floating
SUPER + HJKL : Move focus
SUPER + SHIFT + HJKL : Move window
---
=== WORKSPACES ===
SUPER + 1-0 : Switch workspace
SUPER + SHIFT + 1-0 : Move window to workspace
---
=== SYSTEM ===
SUPER + SHIFT + L : Lock screen
SUPER + M : Exit Hyprland
---
=== SCREENSHOT ===
Print : Full screen
SUPER + SHIFT + Print : Region"

echo "$keybinds" | walker --dmenu -p "Keybindings"
"#;

/// A resumable phase of the setup.
type Step = fn(&Context) -> Result<()>;

const STEPS: &[(&str, Step)] = &[
    ("hyprland_packages", install_packages),
    ("hyprland_config", write_hyprland_conf),
    ("hyprland_hyprlock", write_hyprlock_conf),
    ("hyprland_hypridle", write_hypridle_conf),
    ("hyprland_keybinds", write_keybinds_helper),
];

/// Install and configure the Hyprland desktop.
#[derive(Debug, Default)]
pub struct HyprlandTask;

impl Task for HyprlandTask {
    fn name(&self) -> &'static str {
        "hyprland"
    }

    fn description(&self) -> &'static str {
        "Hyprland Desktop Environment Setup"
    }

    fn platforms(&self) -> &'static [Os] {
        &[Os::Linux]
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["packages"]
    }

    fn state_key(&self) -> String {
        "hyprland_setup".to_string()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        if !ctx.config.hyprland_enabled() {
            return Ok(TaskResult::Skipped("disabled in configuration".into()));
        }
        if !ctx.confirm("Set up Hyprland desktop environment?") {
            return Ok(TaskResult::Skipped("Hyprland setup declined".into()));
        }
        for (step_id, step) in STEPS {
            if ctx.state.is_complete(step_id) {
                ctx.log
                    .info(&format!("Step {step_id} already complete (skipping)"));
                continue;
            }
            step(ctx).with_context(|| format!("step {step_id}"))?;
            ctx.mark_step(step_id)?;
        }
        ctx.log.info("Hyprland setup complete!");
        Ok(TaskResult::Ok)
    }
}

fn hypr_dir(ctx: &Context) -> PathBuf {
    ctx.config_dir().join("hypr")
}

fn install_packages(ctx: &Context) -> Result<()> {
    ctx.log.info("Installing Hyprland packages...");
    if ctx.platform.is_arch()
        && let Err(e) = ensure_paru(&ctx.runner, &ctx.scratch_dir("paru"))
    {
        ctx.log.warn(&format!(
            "Could not install paru, some packages may be unavailable: {e}"
        ));
    }

    let manager = ctx
        .package_manager()
        .ok_or_else(|| anyhow!("no package manager found"))?;
    let official: Vec<&str> = [
        CORE_PACKAGES,
        UTILITY_PACKAGES,
        TERMINAL_PACKAGES,
        FILE_MANAGER_PACKAGES,
    ]
    .concat();
    ctx.log
        .info(&format!("Installing {} packages...", official.len()));
    if let Err(e) = manager.install(&ctx.runner, &official) {
        ctx.log
            .warn(&format!("Some official packages failed to install: {e}"));
    }

    if manager == PackageManager::Paru {
        ctx.log
            .info(&format!("Installing {} AUR packages...", AUR_PACKAGES.len()));
        if let Err(e) = PackageManager::install_aur(&ctx.runner, AUR_PACKAGES) {
            ctx.log
                .warn(&format!("Some AUR packages failed to install: {e}"));
        }
    }
    Ok(())
}

/// `hyprland.conf` for the given programs and border colours.
fn render_hyprland_conf(
    terminal: &str,
    launcher: &str,
    file_manager: &str,
    colors: &ThemeColors,
) -> String {
    format!(
        "# Hyprland Configuration
# Generated by system-setup

monitor=,preferred,auto,auto

$terminal = {terminal}
$fileManager = {file_manager}
$menu = {launcher}

exec-once = hyprpanel
exec-once = swww-daemon
exec-once = hypridle
exec-once = wl-paste --type text --watch cliphist store
exec-once = wl-paste --type image --watch cliphist store

env = XCURSOR_SIZE,24
env = HYPRCURSOR_SIZE,24

general {{
    gaps_in = 4
    gaps_out = 8
    border_size = 2
    col.active_border = {active}
    col.inactive_border = {inactive}
    layout = dwindle
}}

decoration {{
    rounding = 10
    blur {{
        enabled = true
        size = 3
        passes = 1
    }}
}}

dwindle {{
    pseudotile = true
    preserve_split = true
}}

input {{
    kb_layout = us
    follow_mouse = 1
    touchpad {{
        natural_scroll = true
    }}
}}

$mainMod = SUPER

bind = $mainMod, T, exec, $terminal
bind = $mainMod, E, exec, $fileManager
bind = $mainMod, R, exec, $menu
bind = $mainMod, Q, killactive,
bind = $mainMod, F, togglefloating,
bind = $mainMod, M, exit,
bind = $mainMod SHIFT, L, exec, hyprlock
bind = $mainMod, V, exec, cliphist list | $menu --dmenu | cliphist decode | wl-copy
bind = $mainMod, slash, exec, ~/.local/bin/show-keybinds
bind = $mainMod, H, movefocus, l
bind = $mainMod, L, movefocus, r
bind = $mainMod, K, movefocus, u
bind = $mainMod, J, movefocus, d
bind = , Print, exec, hyprshot -m output
bind = $mainMod SHIFT, Print, exec, hyprshot -m region
",
        active = colors.active_border,
        inactive = colors.inactive_border,
    )
}

fn write_hyprland_conf(ctx: &Context) -> Result<()> {
    ctx.log.info("Configuring Hyprland...");
    let contents = render_hyprland_conf(
        &ctx.config.hyprland_terminal(),
        &ctx.config.hyprland_launcher(),
        &ctx.config.hyprland_file_manager(),
        &ctx.config.hyprland_theme_colors(),
    );
    ctx.write_file(&hypr_dir(ctx).join("hyprland.conf"), &contents)
}

fn write_hyprlock_conf(ctx: &Context) -> Result<()> {
    ctx.log.info("Configuring hyprlock...");
    ctx.write_file(&hypr_dir(ctx).join("hyprlock.conf"), HYPRLOCK_CONF)
}

fn write_hypridle_conf(ctx: &Context) -> Result<()> {
    ctx.log.info("Configuring hypridle...");
    ctx.write_file(&hypr_dir(ctx).join("hypridle.conf"), HYPRIDLE_CONF)
}

fn write_keybinds_helper(ctx: &Context) -> Result<()> {
    ctx.log.info("Creating keybindings helper...");
    let path = ctx.home.join(".local").join("bin").join("show-keybinds");
    ctx.write_file(&path, KEYBINDS_SCRIPT)?;
    #[cfg(unix)]
    if !ctx.dry_run {
        use std::os::unix::fs::PermissionsExt as _;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("making {} executable", path.display()))?;
    }
    Ok(())
}
