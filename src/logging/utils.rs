//! Utility functions for path resolution, ANSI stripping, and time formatting.
use std::path::{Path, PathBuf};

/// Directory name under the cache root.
const CACHE_DIR_NAME: &str = "system-setup";

/// Log file name inside the cache directory.
const LOG_FILE_NAME: &str = "setup.log";

/// Strip ANSI escape sequences from a string.
///
/// Handles SGR sequences (ending in `m`) and other CSI sequences (ending
/// in any letter in the `@`..`~` range). A lone `ESC x` pair is dropped.
pub(super) fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for inner in chars.by_ref() {
                if ('@'..='~').contains(&inner) {
                    break;
                }
            }
        }
    }
    out
}

/// Return the terminal width in columns.
///
/// Asks the terminal first, then `COLUMNS`, falling back to 80.
pub(super) fn terminal_columns() -> usize {
    terminal_size::terminal_size()
        .map(|(terminal_size::Width(w), _)| usize::from(w))
        .filter(|&n| n > 0)
        .or_else(columns_from_env)
        .unwrap_or(80)
}

fn columns_from_env() -> Option<usize> {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
}

/// Return `$XDG_CACHE_HOME/system-setup/` (default `~/.cache/system-setup/`).
fn cache_dir() -> PathBuf {
    std::env::var("XDG_CACHE_HOME").map_or_else(
        |_| {
            std::env::var("HOME")
                .or_else(|_| std::env::var("USERPROFILE"))
                .map_or_else(|_| PathBuf::from("."), PathBuf::from)
                .join(".cache")
        },
        PathBuf::from,
    )
    .join(CACHE_DIR_NAME)
}

/// Resolve the log file path: the explicit override if given, otherwise the
/// default under the cache directory.
#[must_use]
pub fn log_file_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(|| cache_dir().join(LOG_FILE_NAME), Path::to_path_buf)
}

/// Format the current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub(super) fn format_utc_datetime() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Format the current UTC time as `HH:MM:SS`.
pub(super) fn format_utc_time() -> String {
    chrono::Utc::now().format("%H:%M:%S").to_string()
}

/// Format a Unix timestamp (seconds) in local time as `YYYY-MM-DD HH:MM:SS`.
#[must_use]
pub fn format_local_timestamp(secs: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let whole = secs.trunc() as i64;
    chrono::DateTime::from_timestamp(whole, 0).map_or_else(
        || format!("{secs}"),
        |dt| {
            dt.with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        },
    )
}
