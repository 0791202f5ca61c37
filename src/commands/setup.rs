//! The provisioning run: select tasks, execute them in order, summarise.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use super::{RunOutcome, list};
use crate::cli::Cli;
use crate::config::Config;
use crate::error::{ConfigError, PlatformError, SetupError, StateError};
use crate::exec::{CommandRunner, SystemSpawner};
use crate::logging::{Log, Logger, TaskStatus, format_local_timestamp};
use crate::platform::{Os, Platform};
use crate::state::StateStore;
use crate::tasks::{self, Context, TaskRegistry, default_registry, home_dir};

/// Resolve which tasks run, in order.
///
/// A non-empty `only` list is validated against the registry and returned
/// unchanged. Otherwise the configured order is filtered to registered
/// tasks, completed with the remaining registered tasks, sorted so
/// dependencies come first, and reduced by the profile skip-set and `skip`.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownTasks`] for unregistered names in `only`,
/// and the [`TaskError`](crate::error::TaskError) of dependency resolution.
pub fn select_tasks(
    registry: &TaskRegistry,
    config: &Config,
    only: &[String],
    skip: &[String],
) -> Result<Vec<String>, SetupError> {
    if !only.is_empty() {
        let unknown: Vec<&str> = only
            .iter()
            .filter(|name| !registry.contains(name))
            .map(String::as_str)
            .collect();
        if !unknown.is_empty() {
            return Err(ConfigError::UnknownTasks {
                unknown: unknown.join(", "),
                available: registry.list_tasks().join(", "),
            }
            .into());
        }
        return Ok(only.to_vec());
    }

    let mut order: Vec<String> = config
        .task_order()
        .into_iter()
        .filter(|name| registry.contains(name))
        .collect();
    for name in registry.list_tasks() {
        if !order.contains(&name) {
            order.push(name);
        }
    }
    let ordered = registry.resolve_dependencies(&order)?;
    Ok(ordered
        .into_iter()
        .filter(|name| !config.profile_skip_tasks().contains(name) && !skip.contains(name))
        .collect())
}

/// Log every completed ledger step with its completion time.
pub fn report_resume(state: &StateStore, log: &dyn Log) {
    let completed = state.get_completed_steps();
    if completed.is_empty() {
        log.info("No previous state found");
        return;
    }
    log.info("Resuming from previous state:");
    for (step, at) in completed {
        log.info(&format!("  ✓ {step} ({})", format_local_timestamp(at)));
    }
}

/// Execute `names` in order.
///
/// A failed task does not stop the run. The run stops early when
/// `interrupt` is set or the ledger cannot be written.
///
/// # Errors
///
/// Returns [`StateError`] when a completion cannot be recorded.
pub fn run_tasks(
    registry: &TaskRegistry,
    names: &[String],
    ctx: &Context,
    interrupt: &AtomicBool,
) -> Result<RunOutcome, StateError> {
    let mut outcome = RunOutcome::Success;
    for name in names {
        if interrupt.load(Ordering::SeqCst) {
            ctx.log.warn("Interrupted by user");
            return Ok(RunOutcome::Interrupted);
        }
        let Some(task) = registry.create_task(name) else {
            ctx.log.warn(&format!("Could not create task: {name}"));
            continue;
        };
        if tasks::execute(task.as_ref(), ctx)? == TaskStatus::Failed {
            ctx.log.warn(&format!("Task failed: {name}"));
            outcome = RunOutcome::TasksFailed;
        }
    }
    if interrupt.load(Ordering::SeqCst) {
        ctx.log.warn("Interrupted by user");
        return Ok(RunOutcome::Interrupted);
    }
    Ok(outcome)
}

/// Run the command line: introspection flags, or a full provisioning run.
///
/// # Errors
///
/// Returns configuration errors (unknown profile, unreadable config,
/// unknown task names, bad dependencies) and [`PlatformError::Unsupported`]
/// before any task runs, and a [`StateError`] if the ledger cannot be
/// written mid-run.
pub fn run(cli: &Cli, log: &Arc<Logger>, interrupt: &Arc<AtomicBool>) -> Result<RunOutcome> {
    let home = home_dir()?;
    let config = Config::load(cli.config.as_deref(), cli.profile.as_deref(), &home)?;
    let state = StateStore::open_default(&home);
    let platform = Platform::detect(|program| which::which(program).is_ok());
    if platform.os == Os::Unknown {
        return Err(PlatformError::Unsupported {
            platform: std::env::consts::OS.to_string(),
        }
        .into());
    }
    let registry = default_registry();

    if cli.list_profiles {
        list::print(&list::profile_lines(&config));
        return Ok(RunOutcome::Success);
    }
    if cli.list_tasks {
        list::print(&list::task_lines(&registry, &platform, &state));
        return Ok(RunOutcome::Success);
    }

    let selected = select_tasks(&registry, &config, &cli.only_tasks(), &cli.skip_tasks())?;

    if let Some(source) = config.source() {
        log.debug(&format!("Loaded configuration from {}", source.display()));
    }
    if cli.resume {
        report_resume(&state, &**log);
    }
    log.info(&format!("Detected platform: {platform}"));
    if let Some(profile) = config.active_profile() {
        log.info(&format!("Using profile: {profile}"));
        if !config.profile_skip_tasks().is_empty() {
            log.info(&format!(
                "Profile skips: {}",
                config.profile_skip_tasks().join(", ")
            ));
        }
    }
    if cli.dry_run {
        log.warn("DRY RUN MODE - No changes will be made");
    }
    if cli.auto_yes {
        log.info("AUTO YES MODE - All prompts will be automatically accepted");
    }
    log.info(&format!("Tasks to run: {}", selected.join(", ")));

    let spawner = Arc::new(SystemSpawner::new(Arc::clone(interrupt)));
    let runner = CommandRunner::new(spawner, Arc::clone(log) as Arc<dyn Log>)
        .with_dry_run(cli.dry_run)
        .with_interrupt(Arc::clone(interrupt));
    let ctx = Context::new(
        Arc::new(config),
        Arc::new(platform),
        Arc::new(state),
        Arc::new(runner),
        Arc::clone(log) as Arc<dyn Log>,
        home,
    )
    .with_auto_yes(cli.auto_yes);

    let outcome = run_tasks(&registry, &selected, &ctx, interrupt);
    log.print_summary();
    Ok(outcome?)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::tasks::TaskResult;
    use crate::tasks::fish::FishTask;
    use crate::tasks::packages::PackagesTask;
    use crate::tasks::shell::ShellTask;
    use crate::tasks::test_helpers::{arch_linux, make_context};

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    fn small_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry
            .register::<PackagesTask>()
            .register::<ShellTask>()
            .register::<FishTask>();
        registry
    }

    fn config_with_profile(yaml: &str, profile: &str) -> Config {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("system_setup.yaml");
        std::fs::write(&path, yaml).unwrap();
        Config::from_sources(&[path], Some(profile)).unwrap()
    }

    #[test]
    fn only_ignores_profile_skips_and_keeps_order() {
        let config = Config::from_sources(&[], Some("minimal")).unwrap();
        let selected = select_tasks(
            &small_registry(),
            &config,
            &names(&["shell", "packages"]),
            &[],
        )
        .unwrap();
        assert_eq!(selected, ["shell", "packages"]);
    }

    #[test]
    fn unknown_only_name_is_a_configuration_error() {
        let config = Config::from_yaml("").unwrap();
        let err = select_tasks(&small_registry(), &config, &names(&["packages", "bogus"]), &[])
            .unwrap_err();
        assert!(err.is_usage_error());
        assert_eq!(
            err.to_string(),
            "Configuration error: Unknown task(s): bogus. Available tasks: fish, packages, shell"
        );
    }

    #[test]
    fn profile_and_cli_skips_compose() {
        let yaml = "
tasks: {order: [packages, fish, shell]}
profiles: {no-fish: {skip_tasks: [fish]}}
";
        let config = config_with_profile(yaml, "no-fish");
        let selected =
            select_tasks(&small_registry(), &config, &[], &names(&["shell"])).unwrap();
        assert_eq!(selected, ["packages"]);
    }

    #[test]
    fn unlisted_tasks_are_appended_and_dependencies_hoisted() {
        let config = Config::from_yaml("tasks: {order: [shell, packages]}").unwrap();
        let selected = select_tasks(&small_registry(), &config, &[], &[]).unwrap();
        assert_eq!(selected, ["packages", "shell", "fish"]);
    }

    #[test]
    fn default_order_covers_every_builtin_task() {
        let config = Config::from_yaml("").unwrap();
        let selected = select_tasks(&default_registry(), &config, &[], &[]).unwrap();
        assert_eq!(
            selected,
            [
                "packages",
                "chezmoi",
                "modern-tools",
                "fish",
                "hyprland",
                "settings",
                "shell",
                "dotfiles",
            ]
        );
    }

    #[test]
    fn resume_report_lists_completed_steps() {
        let t = make_context(arch_linux(), &[], 0, "");
        report_resume(&t.ctx.state, &*t.log);
        t.ctx.state.mark_complete("packages_installed").unwrap();
        report_resume(&t.ctx.state, &*t.log);
        assert!(t.log.summary().errors.is_empty());
    }

    #[derive(Default)]
    struct Fails;
    impl tasks::Task for Fails {
        fn name(&self) -> &'static str {
            "fails"
        }
        fn description(&self) -> &'static str {
            "Fails"
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            anyhow::bail!("boom")
        }
    }

    #[derive(Default)]
    struct Succeeds;

    impl tasks::Task for Succeeds {
        fn name(&self) -> &'static str {
            "succeeds"
        }
        fn description(&self) -> &'static str {
            "Succeeds"
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            Ok(TaskResult::Ok)
        }
    }

    #[derive(Default)]
    struct LedgerBroken;

    impl tasks::Task for LedgerBroken {
        fn name(&self) -> &'static str {
            "ledger"
        }
        fn description(&self) -> &'static str {
            "Ledger"
        }
        fn run(&self, _ctx: &Context) -> Result<TaskResult> {
            Err(StateError {
                path: "/nowhere".into(),
                source: std::io::Error::other("read-only"),
            }
            .into())
        }
    }

    fn canned_registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry
            .register::<Fails>()
            .register::<Succeeds>()
            .register::<LedgerBroken>();
        registry
    }

    #[test]
    fn failures_do_not_stop_later_tasks() {
        let t = make_context(arch_linux(), &[], 0, "");
        let interrupt = AtomicBool::new(false);
        let outcome = run_tasks(
            &canned_registry(),
            &names(&["fails", "succeeds"]),
            &t.ctx,
            &interrupt,
        )
        .unwrap();
        assert_eq!(outcome, RunOutcome::TasksFailed);
        assert!(t.ctx.state.is_complete("succeeds_configured"));
        assert_eq!(t.log.failure_count(), 1);
    }

    #[test]
    fn interrupt_stops_before_next_task() {
        let t = make_context(arch_linux(), &[], 0, "");
        let interrupt = AtomicBool::new(true);
        let outcome =
            run_tasks(&canned_registry(), &names(&["succeeds"]), &t.ctx, &interrupt).unwrap();
        assert_eq!(outcome, RunOutcome::Interrupted);
        assert!(!t.ctx.state.is_complete("succeeds_configured"));
    }

    #[test]
    fn ledger_failure_ends_the_run() {
        let t = make_context(arch_linux(), &[], 0, "");
        let interrupt = AtomicBool::new(false);
        let result = run_tasks(
            &canned_registry(),
            &names(&["ledger", "succeeds"]),
            &t.ctx,
            &interrupt,
        );
        assert!(result.is_err());
        assert!(!t.ctx.state.is_complete("succeeds_configured"));
    }

    #[test]
    fn dependency_errors_surface_from_selection() {
        #[derive(Default)]
        struct NeedsGhost;
        impl tasks::Task for NeedsGhost {
            fn name(&self) -> &'static str {
                "needs-ghost"
            }
            fn description(&self) -> &'static str {
                "Needs ghost"
            }
            fn depends_on(&self) -> &'static [&'static str] {
                &["ghost"]
            }
            fn run(&self, _ctx: &Context) -> Result<TaskResult> {
                Ok(TaskResult::Ok)
            }
        }
        let mut registry = TaskRegistry::new();
        registry.register::<NeedsGhost>();
        let config = Config::from_yaml("").unwrap();
        let err = select_tasks(&registry, &config, &[], &[]).unwrap_err();
        assert!(matches!(
            err,
            SetupError::Task(TaskError::MissingDependency { .. })
        ));
    }
}
