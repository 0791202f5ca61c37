//! Dotfiles archive download and installation.
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};

use super::{Context, Task, TaskResult};
use crate::exec::RunOptions;
use crate::resources::{checksum_gate, download, download_file, download_from_gdrive, fs};

/// Download the dotfiles archive and install it into HOME.
#[derive(Debug, Default)]
pub struct DotfilesTask;

impl Task for DotfilesTask {
    fn name(&self) -> &'static str {
        "dotfiles"
    }

    fn description(&self) -> &'static str {
        "Dotfiles Management"
    }

    fn state_key(&self) -> String {
        "dotfiles_installed".to_string()
    }

    fn run(&self, ctx: &Context) -> Result<TaskResult> {
        let work = Workspace::new(ctx.scratch_dir("dotfiles"));
        if ctx.dry_run {
            ctx.would(&format!("download dotfiles to {}", work.archive.display()));
            ctx.would(&format!("extract dotfiles to {}", work.extract.display()));
            ctx.would("install dotfiles to home directory");
            return Ok(TaskResult::Ok);
        }

        if !fetch(ctx, &work)? {
            return Ok(TaskResult::Skipped("dotfiles download declined".into()));
        }
        extract(ctx, &work)?;
        if !install_all(ctx, &work.source(), &ctx.home)? {
            ctx.log.info(&format!(
                "Dotfiles remain in {} for manual processing",
                work.extract.display()
            ));
            return Ok(TaskResult::Ok);
        }
        work.clean(ctx);
        ctx.log.info("Dotfiles management complete");
        Ok(TaskResult::Ok)
    }
}

/// Scratch locations of one dotfiles run.
struct Workspace {
    root: PathBuf,
    archive: PathBuf,
    extract: PathBuf,
}

impl Workspace {
    fn new(root: PathBuf) -> Self {
        Self {
            archive: root.join("dotfiles.tar.gz"),
            extract: root.join("extract"),
            root,
        }
    }

    /// Directory inside the archive holding the dotfiles.
    fn source(&self) -> PathBuf {
        self.extract.join("dotfiles")
    }

    fn clean(&self, ctx: &Context) {
        ctx.log.info("Cleaning up temporary files...");
        if let Err(e) = std::fs::remove_dir_all(&self.root) {
            ctx.log
                .warn(&format!("Could not remove {}: {e}", self.root.display()));
        }
    }
}

/// Make the archive available and verified. Returns `false` when the user
/// declined the download.
fn fetch(ctx: &Context, work: &Workspace) -> Result<bool> {
    if work.archive.exists() {
        ctx.log.info(&format!(
            "Found existing dotfiles archive: {}",
            work.archive.display()
        ));
    } else if work.source().exists() {
        ctx.log.info(&format!(
            "Found existing extracted dotfiles: {}",
            work.extract.display()
        ));
        return Ok(true);
    } else {
        if !ctx.confirm(&format!("Download dotfiles to {}?", work.archive.display())) {
            return Ok(false);
        }
        download_archive(ctx, &work.archive)?;
    }
    checksum_gate(
        &work.archive,
        ctx.config.dotfiles_checksum().as_deref(),
        ctx.config.checksum_required(),
        &*ctx.log,
    )?;
    Ok(true)
}

fn download_archive(ctx: &Context, dest: &Path) -> Result<()> {
    if let Some(url) = ctx.config.dotfiles_url() {
        ctx.log.info(&format!("Downloading dotfiles from {url}..."));
        download_file(&url, dest, ctx.runner.interrupt())?;
    } else {
        if !download::ensure_gdown(&ctx.runner) {
            ctx.log
                .warn("Could not install gdown - attempting download anyway");
        }
        ctx.log.info("Downloading dotfiles from Google Drive...");
        download_from_gdrive(&ctx.runner, &ctx.config.dotfiles_gdrive_id(), dest)?;
    }
    ctx.log.info("Download complete");
    Ok(())
}

fn extract(ctx: &Context, work: &Workspace) -> Result<()> {
    if work.source().exists() {
        ctx.log.info("Dotfiles already extracted");
        return Ok(());
    }
    std::fs::create_dir_all(&work.extract)
        .with_context(|| format!("creating {}", work.extract.display()))?;
    ctx.log
        .info(&format!("Extracting dotfiles to {}...", work.extract.display()));
    let archive = work.archive.to_string_lossy().into_owned();
    let target = work.extract.to_string_lossy().into_owned();
    ctx.runner
        .run_argv(
            &["tar", "-xzf", archive.as_str(), "-C", target.as_str()],
            &RunOptions::new(),
        )
        .context("extracting dotfiles archive")?;
    Ok(())
}

/// Install every top-level dot entry of `source` into `home`. Returns
/// `false` when the user declined.
fn install_all(ctx: &Context, source: &Path, home: &Path) -> Result<bool> {
    if !source.is_dir() {
        bail!("dotfiles directory not found: {}", source.display());
    }
    if !ctx.confirm(&format!(
        "Install dotfiles from {} to home directory?",
        source.display()
    )) {
        ctx.log.info("Skipping dotfiles installation");
        return Ok(false);
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(source)
        .with_context(|| format!("reading {}", source.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.file_name()
                .is_some_and(|name| name.to_string_lossy().starts_with('.'))
        })
        .collect();
    entries.sort();

    ctx.log.info(&format!(
        "Installing dotfiles from {} to {}...",
        source.display(),
        home.display()
    ));
    for entry in &entries {
        let Some(name) = entry.file_name() else {
            continue;
        };
        let dest = home.join(name);
        let label = name.to_string_lossy();
        if entry.is_dir() {
            install_dir(ctx, entry, &dest, &label)?;
        } else {
            install_one(ctx, entry, &dest, &label)?;
        }
    }
    ctx.log.info("Dotfiles installed successfully");
    Ok(true)
}

fn install_one(ctx: &Context, src: &Path, dest: &Path, label: &str) -> Result<()> {
    if dest.exists() && !ctx.confirm(&format!("  File '{label}' exists. Replace?")) {
        ctx.log.info(&format!("  Skipped: {label}"));
        return Ok(());
    }
    if let Some(backup) = fs::install_file(src, dest)? {
        ctx.log
            .info(&format!("  Created backup: {}", backup.display()));
    }
    ctx.log.info(&format!("  Installed: {label}"));
    Ok(())
}

fn install_dir(ctx: &Context, src: &Path, dest: &Path, label: &str) -> Result<()> {
    if dest.is_dir() {
        if !ctx.confirm(&format!("  Directory '{label}' exists. Merge contents?")) {
            ctx.log.info(&format!("  Skipped: {label}"));
            return Ok(());
        }
        let copied = fs::merge_newer(src, dest)?;
        ctx.log
            .info(&format!("  Merged directory: {label} ({copied} files updated)"));
        return Ok(());
    }
    if dest.exists() {
        std::fs::remove_file(dest).with_context(|| format!("removing {}", dest.display()))?;
    }
    fs::copy_dir_recursive(src, dest)?;
    ctx.log.info(&format!("  Installed directory: {label}"));
    Ok(())
}
