//! Operating system preferences.
use anyhow::Result;

use super::{Context, Task, TaskResult};
use crate::exec::RunOptions;
use crate::platform::Os;

/// A named set of commands applied behind one confirmation.
#[derive(Debug, Clone, Copy)]
struct SettingsGroup {
    name: &'static str,
    commands: &'static [&'static [&'static str]],
}

const MACOS_GROUPS: &[SettingsGroup] = &[
    SettingsGroup {
        name: "Dock",
        commands: &[
            &["defaults", "write", "com.apple.dock", "autohide", "-bool", "true"],
            &["defaults", "write", "com.apple.dock", "autohide-delay", "-float", "0"],
            &["defaults", "write", "com.apple.dock", "show-recents", "-bool", "false"],
        ],
    },
    SettingsGroup {
        name: "Finder",
        commands: &[
            &["defaults", "write", "NSGlobalDomain", "AppleShowAllExtensions", "-bool", "true"],
            &["defaults", "write", "com.apple.finder", "AppleShowAllFiles", "-bool", "true"],
            &["defaults", "write", "com.apple.finder", "ShowPathbar", "-bool", "true"],
        ],
    },
    SettingsGroup {
        name: "General",
        commands: &[
            &["defaults", "write", "NSGlobalDomain", "ApplePressAndHoldEnabled", "-bool", "false"],
            &["defaults", "write", "com.apple.screencapture", "type", "-string", "png"],
        ],
    },
];

const GNOME_GROUP: SettingsGroup = SettingsGroup {
    name: "GNOME",
    commands: &[
        &["gsettings", "set", "org.gnome.nautilus.preferences", "show-hidden-files", "true"],
        &["gsettings", "set", "org.gnome.desktop.interface", "show-battery-percentage", "true"],
    ],
};

/// Apply desktop preferences for the current platform.
#[derive(Debug, Default)]
pub struct SettingsTask;

impl Task for SettingsTask {
    fn name(&self) -> &'static str {
        "settings"
    }

    fn description(&self) -> &'static str {
        "System Settings"
    }

    fn state_key(&self) -> String {
        "settings_applied".to_string()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        match ctx.platform.os {
            Os::MacOs => MACOS_GROUPS.iter().for_each(|group| apply(ctx, group)),
            Os::Linux => {
                if ctx.runner.is_available("gsettings") {
                    apply(ctx, &GNOME_GROUP);
                } else {
                    ctx.log.info("gsettings not found, no desktop settings to apply");
                }
            }
            Os::Windows => ctx.log.info("Windows settings not yet implemented"),
            Os::Unknown => {}
        }
        Ok(TaskResult::Ok)
    }
}

fn apply(ctx: &Context, group: &SettingsGroup) {
    let name = group.name;
    if !ctx.confirm(&format!("Apply {name} settings?")) {
        ctx.log.info(&format!("Skipped: {name}"));
        return;
    }
    ctx.log.info(&format!("Applying {name} settings..."));
    for argv in group.commands {
        match ctx.runner.run_argv(*argv, &RunOptions::new().check(false)) {
            Ok(result) if result.success() => {}
            Ok(result) => ctx.log.warn(&format!("  Failed: {}", result.command)),
            Err(e) => ctx.log.warn(&format!("  Failed: {e}")),
        }
    }
    ctx.log.record_setting(name);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::logging::TaskStatus;
    use crate::platform::{Architecture, Platform};
    use crate::tasks::context::MockPrompt;
    use crate::tasks::execute;
    use crate::tasks::test_helpers::{arch_linux, make_context};

    fn macos() -> Platform {
        Platform::new(Os::MacOs, Architecture::Arm64, None)
    }

    #[test]
    fn macos_applies_every_group() {
        let t = make_context(macos(), &[], 0, "");
        assert_eq!(execute(&SettingsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(t.calls().len(), 8);
        assert_eq!(t.calls()[0], "defaults write com.apple.dock autohide -bool true");
        assert_eq!(t.log.summary().settings, ["Dock", "Finder", "General"]);
        assert!(t.ctx.state.is_complete("settings_applied"));
    }

    #[test]
    fn declined_group_is_not_applied() {
        let t = make_context(macos(), &[], 0, "");
        let mut prompt = MockPrompt::new();
        prompt
            .expect_confirm()
            .returning(|q| q != "Apply Finder settings?");
        let ctx = t.ctx.with_auto_yes(false).with_prompt(Arc::new(prompt));
        assert_eq!(execute(&SettingsTask, &ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(t.calls.lock().unwrap().len(), 5);
        assert_eq!(t.log.summary().settings, ["Dock", "General"]);
    }

    #[test]
    fn failed_commands_are_warnings() {
        let t = make_context(arch_linux(), &["gsettings"], 1, "");
        assert_eq!(execute(&SettingsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert_eq!(t.calls().len(), 2);
        assert_eq!(t.log.summary().settings, ["GNOME"]);
    }

    #[test]
    fn linux_without_gsettings_does_nothing() {
        let t = make_context(arch_linux(), &[], 0, "");
        assert_eq!(execute(&SettingsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert!(t.calls().is_empty());
        assert!(t.log.summary().settings.is_empty());
    }

    #[test]
    fn windows_is_informational() {
        let windows = Platform::new(Os::Windows, Architecture::X86_64, None);
        let t = make_context(windows, &[], 0, "");
        assert_eq!(execute(&SettingsTask, &t.ctx).unwrap(), TaskStatus::Ok);
        assert!(t.calls().is_empty());
    }
}
