//! File installation helpers for dotfiles.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

/// Suffix of the copy kept when an existing file is replaced.
pub const BACKUP_SUFFIX: &str = ".backup";

/// `<dest>.backup`.
#[must_use]
pub fn backup_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(BACKUP_SUFFIX);
    dest.with_file_name(name)
}

/// Copy `src` over `dest`, first saving an existing `dest` to its backup path.
///
/// Returns the backup path when one was written.
///
/// # Errors
///
/// Returns an error if the backup or the copy fails.
pub fn install_file(src: &Path, dest: &Path) -> Result<Option<PathBuf>> {
    let backup = if dest.exists() {
        let backup = backup_path(dest);
        std::fs::copy(dest, &backup)
            .with_context(|| format!("backing up {} to {}", dest.display(), backup.display()))?;
        Some(backup)
    } else {
        None
    };
    std::fs::copy(src, dest)
        .with_context(|| format!("copying {} to {}", src.display(), dest.display()))?;
    Ok(backup)
}

/// Recursively copy a directory tree.
///
/// Symlinks within the source tree are *followed*: directory symlinks are
/// recursed into and their contents materialised.
///
/// # Errors
///
/// Returns an error if a directory cannot be read or created, or a file
/// cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Merge `src` into the existing directory `dst`.
///
/// A file is copied when it is missing from `dst` or strictly newer in
/// `src`; everything else in `dst` is left alone. Returns the number of
/// files copied.
///
/// # Errors
///
/// Returns an error if a directory cannot be read or created, or a file
/// cannot be copied.
pub fn merge_newer(src: &Path, dst: &Path) -> Result<usize> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("creating directory {}", dst.display()))?;
    let mut copied = 0;
    for entry in
        std::fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))?
    {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());
        if src_path.is_dir() {
            copied += merge_newer(&src_path, &dst_path)?;
        } else if is_newer(&src_path, &dst_path) {
            std::fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Whether `src` should replace `dst`: `dst` is missing, or `src` was
/// modified later. Unreadable timestamps count as "not newer".
fn is_newer(src: &Path, dst: &Path) -> bool {
    let modified = |p: &Path| std::fs::metadata(p).and_then(|m| m.modified());
    match (modified(src), modified(dst)) {
        (_, Err(_)) => !dst.exists(),
        (Ok(s), Ok(d)) => s > d,
        (Err(_), Ok(_)) => false,
    }
}
