//! `--list-tasks` and `--list-profiles`.
use crate::config::Config;
use crate::platform::Platform;
use crate::state::StateStore;
use crate::tasks::TaskRegistry;

const RULE_WIDTH: usize = 70;

/// Lines printed by `--list-tasks`.
#[must_use]
pub fn task_lines(registry: &TaskRegistry, platform: &Platform, state: &StateStore) -> Vec<String> {
    let mut lines = vec!["Available Tasks:".to_string(), "=".repeat(RULE_WIDTH)];
    for name in registry.list_tasks() {
        let Some(info) = registry.get_task_info(&name, platform, state) else {
            continue;
        };
        let mark = if info.complete { "✓" } else { " " };
        lines.push(format!("  [{mark}] {name:15} - {}", info.description));
        if !info.supported {
            lines.push("       └── Not supported on this platform".to_string());
        }
        if !info.depends_on.is_empty() {
            lines.push(format!("       └── Depends on: {}", info.depends_on.join(", ")));
        }
    }
    lines.push(String::new());
    lines.push("Legend: [✓] = completed".to_string());
    lines
}

/// Lines printed by `--list-profiles`.
#[must_use]
pub fn profile_lines(config: &Config) -> Vec<String> {
    let mut lines = vec!["Available Profiles:".to_string(), "=".repeat(RULE_WIDTH)];
    let profiles = config.list_profiles();
    if profiles.is_empty() {
        lines.push("  No profiles defined".to_string());
    }
    let active = config.active_profile();
    for profile in profiles {
        let marker = if active == Some(profile.name.as_str()) { " *" } else { "" };
        lines.push(format!("  {:15} - {}{marker}", profile.name, profile.description));
    }
    lines.push(String::new());
    if let Some(active) = active {
        lines.push(format!("Active profile: {active}"));
        if !config.profile_skip_tasks().is_empty() {
            lines.push(format!("Skipped tasks: {}", config.profile_skip_tasks().join(", ")));
        }
        lines.push(String::new());
    }
    lines.push("Usage: system-setup --profile=server".to_string());
    lines
}

/// Print `lines` to stdout, framed by blank lines.
#[allow(clippy::print_stdout)]
pub fn print(lines: &[String]) {
    println!();
    for line in lines {
        println!("{line}");
    }
    println!();
}
