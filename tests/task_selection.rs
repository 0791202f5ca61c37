#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::panic
)]
//! Integration tests for task selection: configured order, dependency
//! hoisting, profile skip-sets, `--skip`, and `--only` precedence.

use std::path::PathBuf;

use system_setup::commands::setup::select_tasks;
use system_setup::config::Config;
use system_setup::error::{ConfigError, SetupError, TaskError};
use system_setup::platform::{Architecture, Os, Platform};
use system_setup::state::StateStore;
use system_setup::tasks::{Context, Task, TaskRegistry, TaskResult, default_registry};

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(ToString::to_string).collect()
}

/// Write `yaml` as a user config file and load it with `profile`.
fn user_config(yaml: &str, profile: Option<&str>) -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let path: PathBuf = dir.path().join("system_setup.yaml");
    std::fs::write(&path, yaml).unwrap();
    let config = Config::from_sources(&[path], profile).unwrap();
    (dir, config)
}

#[test]
fn builtin_task_names() {
    let registry = default_registry();
    insta::assert_snapshot!(registry.list_tasks().join("\n"), @r"
    chezmoi
    dotfiles
    fish
    hyprland
    modern-tools
    packages
    settings
    shell
    ");
}

#[test]
fn every_dependency_is_registered() {
    let registry = default_registry();
    let linux = Platform::new(Os::Linux, Architecture::X86_64, Some("arch"));
    let state = StateStore::open("/nonexistent/state");
    for name in registry.list_tasks() {
        let info = registry.get_task_info(&name, &linux, &state).unwrap();
        for dep in &info.depends_on {
            assert!(registry.contains(dep), "{name} depends on unregistered {dep}");
        }
    }
}

#[test]
fn server_profile_drops_desktop_tasks() {
    let config = Config::from_sources(&[], Some("server")).unwrap();
    let selected = select_tasks(&default_registry(), &config, &[], &[]).unwrap();
    assert!(!selected.contains(&"hyprland".to_string()));
    assert!(selected.contains(&"packages".to_string()));
}

#[test]
fn profile_skips_and_cli_skips_are_unioned() {
    let (_dir, config) = user_config(
        "
tasks:
  order: [packages, fish, shell]
profiles:
  lean:
    description: Lean
    skip_tasks: [fish, chezmoi, modern-tools, hyprland, settings, dotfiles]
",
        Some("lean"),
    );
    let selected =
        select_tasks(&default_registry(), &config, &[], &names(&["shell"])).unwrap();
    assert_eq!(selected, ["packages"]);
}

#[test]
fn only_overrides_profile_and_skip() {
    let config = Config::from_sources(&[], Some("minimal")).unwrap();
    let selected = select_tasks(
        &default_registry(),
        &config,
        &names(&["hyprland", "fish"]),
        &names(&["fish"]),
    )
    .unwrap();
    assert_eq!(selected, ["hyprland", "fish"]);
}

#[test]
fn configured_order_is_reordered_only_for_dependencies() {
    let (_dir, config) = user_config(
        "tasks: {order: [settings, shell, packages, chezmoi]}",
        None,
    );
    let selected = select_tasks(&default_registry(), &config, &[], &[]).unwrap();
    let position = |name: &str| selected.iter().position(|n| n == name).unwrap();
    assert_eq!(position("settings"), 0);
    assert!(position("packages") < position("shell"));
    assert!(position("packages") < position("fish"));
    assert!(position("packages") < position("hyprland"));
    assert_eq!(selected.len(), default_registry().list_tasks().len());
}

#[test]
fn unknown_order_entries_are_ignored() {
    let (_dir, config) = user_config("tasks: {order: [packages, teleport]}", None);
    let selected = select_tasks(&default_registry(), &config, &[], &[]).unwrap();
    assert_eq!(selected[0], "packages");
    assert!(!selected.contains(&"teleport".to_string()));
}

#[test]
fn unknown_only_names_every_offender() {
    let config = Config::from_yaml("").unwrap();
    let err = select_tasks(
        &default_registry(),
        &config,
        &names(&["warp", "packages", "teleport"]),
        &[],
    )
    .unwrap_err();
    match err {
        SetupError::Config(ConfigError::UnknownTasks { unknown, available }) => {
            assert_eq!(unknown, "warp, teleport");
            assert!(available.contains("packages"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn unknown_profile_is_a_configuration_error() {
    let err = Config::from_sources(&[], Some("spaceship")).unwrap_err();
    assert!(matches!(err, ConfigError::UnknownProfile { .. }));
}

#[test]
fn dependency_cycle_is_reported() {
    // Two mutually dependent tasks cannot be ordered.
    #[derive(Default)]
    struct Left;
    #[derive(Default)]
    struct Right;
    impl Task for Left {
        fn name(&self) -> &'static str {
            "left"
        }
        fn description(&self) -> &'static str {
            "Left"
        }
        fn depends_on(&self) -> &'static [&'static str] {
            &["right"]
        }
        fn run(&self, _ctx: &Context) -> anyhow::Result<TaskResult> {
            Ok(TaskResult::Ok)
        }
    }
    impl Task for Right {
        fn name(&self) -> &'static str {
            "right"
        }
        fn description(&self) -> &'static str {
            "Right"
        }
        fn depends_on(&self) -> &'static [&'static str] {
            &["left"]
        }
        fn run(&self, _ctx: &Context) -> anyhow::Result<TaskResult> {
            Ok(TaskResult::Ok)
        }
    }

    let mut registry = TaskRegistry::new();
    registry.register::<Left>().register::<Right>();
    let config = Config::from_yaml("").unwrap();
    let err = select_tasks(&registry, &config, &[], &[]).unwrap_err();
    assert!(matches!(err, SetupError::Task(TaskError::DependencyCycle(_))));
}
