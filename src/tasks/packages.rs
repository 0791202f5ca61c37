//! Native package installation.
use anyhow::{Context as _, Result};

use super::{Context, Task, TaskResult};
use crate::error::ResourceError;
use crate::resources::package::CASK_SUFFIX;

/// Formulae listed before the confirmation prompt.
const PREVIEW_FORMULAE: usize = 10;
/// Casks listed before the confirmation prompt.
const PREVIEW_CASKS: usize = 5;

/// Install the configured packages with the platform's package manager.
#[derive(Debug, Default)]
pub struct PackagesTask;

impl Task for PackagesTask {
    fn name(&self) -> &'static str {
        "packages"
    }

    fn description(&self) -> &'static str {
        "Package Installation"
    }

    fn state_key(&self) -> String {
        "packages_installed".to_string()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let manager = ctx
            .package_manager()
            .ok_or(ResourceError::NoPackageManager)?;
        ctx.log.info(&format!("Using package manager: {manager}"));

        if let Err(e) = manager.update(&ctx.runner) {
            ctx.log
                .warn(&format!("Package manager update failed (continuing anyway): {e}"));
        }

        let packages = ctx
            .config
            .packages_for_platform(ctx.platform.os, ctx.platform.distro.as_deref());
        if packages.is_empty() {
            ctx.log.warn("No packages defined for this platform");
            return Ok(TaskResult::Ok);
        }

        let (casks, formulae): (Vec<&str>, Vec<&str>) = packages
            .iter()
            .map(String::as_str)
            .partition(|p| p.ends_with(CASK_SUFFIX));
        ctx.log
            .info(&format!("Found {} packages to install", packages.len()));
        if !casks.is_empty() {
            ctx.log.info(&format!(
                "  ({} formulae + {} casks)",
                formulae.len(),
                casks.len()
            ));
        }

        if !ctx.auto_yes {
            preview(ctx, "Packages:", &formulae, PREVIEW_FORMULAE, "formulae");
            let casks: Vec<&str> = casks
                .iter()
                .map(|c| c.trim_end_matches(CASK_SUFFIX))
                .collect();
            preview(ctx, "GUI Applications (casks):", &casks, PREVIEW_CASKS, "casks");
        }
        if !ctx.confirm(&format!("Install {} packages?", packages.len())) {
            return Ok(TaskResult::Skipped("package installation declined".into()));
        }

        ctx.log
            .info(&format!("Installing {} packages...", packages.len()));
        manager
            .install(&ctx.runner, &packages)
            .context("installing packages")?;
        for package in &packages {
            ctx.log.record_package(&display_name(package));
        }
        ctx.log.info(&format!(
            "Package installation complete ({} packages)",
            packages.len()
        ));
        Ok(TaskResult::Ok)
    }
}

fn preview(ctx: &Context, header: &str, names: &[&str], limit: usize, noun: &str) {
    if names.is_empty() {
        return;
    }
    ctx.log.info(header);
    for name in names.iter().take(limit) {
        ctx.log.info(&format!("  • {name}"));
    }
    if names.len() > limit {
        ctx.log
            .info(&format!("  ... and {} more {noun}", names.len() - limit));
    }
}

/// Summary label for a package; casks read `name (cask)`.
fn display_name(package: &str) -> String {
    package.strip_suffix(CASK_SUFFIX).map_or_else(
        || package.to_string(),
        |name| format!("{name} (cask)"),
    )
}
