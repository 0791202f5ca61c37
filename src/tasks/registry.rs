//! Name-to-task mapping, listing and dependency resolution.
use crate::error::TaskError;
use crate::platform::Platform;
use crate::state::StateStore;

use super::{Task, graph};

/// Builds a fresh task instance.
pub type TaskFactory = fn() -> Box<dyn Task>;

fn build<T: Task + Default + 'static>() -> Box<dyn Task> {
    Box::new(T::default())
}

/// Read-only description of a registered task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInfo {
    /// Registered name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Whether the task applies to the probed platform.
    pub supported: bool,
    /// Whether the task's state key is in the ledger.
    pub complete: bool,
    /// Declared dependencies.
    pub depends_on: Vec<String>,
}

/// Registry of every task the CLI can run.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: Vec<(String, TaskFactory)>,
}

impl TaskRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its own [`Task::name`].
    pub fn register<T: Task + Default + 'static>(&mut self) -> &mut Self {
        let name = T::default().name();
        self.register_with_name(name, build::<T>)
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register_with_name(&mut self, name: &str, factory: TaskFactory) -> &mut Self {
        if let Some(entry) = self.entries.iter_mut().find(|(n, _)| n == name) {
            entry.1 = factory;
        } else {
            self.entries.push((name.to_string(), factory));
        }
        self
    }

    /// Registered names, sorted lexicographically.
    #[must_use]
    pub fn list_tasks(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|(n, _)| n.clone()).collect();
        names.sort();
        names
    }

    /// Whether `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    /// Factory registered under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<TaskFactory> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, factory)| *factory)
    }

    /// A fresh instance of the task registered under `name`.
    #[must_use]
    pub fn create_task(&self, name: &str) -> Option<Box<dyn Task>> {
        self.get(name).map(|factory| factory())
    }

    /// Describe `name` without running it.
    #[must_use]
    pub fn get_task_info(
        &self,
        name: &str,
        platform: &Platform,
        state: &StateStore,
    ) -> Option<TaskInfo> {
        let task = self.create_task(name)?;
        Some(TaskInfo {
            name: name.to_string(),
            description: task.description().to_string(),
            supported: task.is_supported(platform),
            complete: state.is_complete(&task.state_key()),
            depends_on: task.depends_on().iter().map(ToString::to_string).collect(),
        })
    }

    /// Reorder `names` so dependencies run first, keeping the given order
    /// wherever dependencies allow.
    ///
    /// A registered dependency that is not in `names` is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::MissingDependency`] for a dependency that is not
    /// registered and [`TaskError::DependencyCycle`] for a cycle.
    pub fn resolve_dependencies(&self, names: &[String]) -> Result<Vec<String>, TaskError> {
        for name in names {
            let Some(task) = self.create_task(name) else {
                continue;
            };
            if let Some(missing) = task.depends_on().iter().find(|dep| !self.contains(dep)) {
                return Err(TaskError::MissingDependency {
                    task: name.clone(),
                    dependency: (*missing).to_string(),
                });
            }
        }
        graph::stable_topo_sort(names, |name| {
            self.create_task(name)
                .map(|task| task.depends_on().iter().map(ToString::to_string).collect())
                .unwrap_or_default()
        })
    }
}

/// Registry with every built-in task.
#[must_use]
pub fn default_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    registry
        .register::<super::packages::PackagesTask>()
        .register::<super::chezmoi::ChezmoiTask>()
        .register::<super::dotfiles::DotfilesTask>()
        .register::<super::fish::FishTask>()
        .register::<super::hyprland::HyprlandTask>()
        .register::<super::modern_tools::ModernToolsTask>()
        .register::<super::settings::SettingsTask>()
        .register::<super::shell::ShellTask>();
    registry
}
