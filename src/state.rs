//! Durable completion ledger enabling resume.
//!
//! The ledger is a flat JSON object mapping step identifiers to the Unix
//! timestamp (seconds, fractional) at which they completed. Presence of a key
//! means "complete"; there is no in-progress state.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::StateError;

/// File name of the ledger inside the user's home directory.
pub const STATE_FILE_NAME: &str = ".system_setup_state";

/// Persistent `step_id -> completed_at` ledger.
///
/// Every mutation rewrites the whole file atomically: the new content is
/// written to a sibling temp file, flushed, and renamed over the target.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    steps: Mutex<BTreeMap<String, f64>>,
}

impl StateStore {
    /// Open the ledger at `path`.
    ///
    /// A missing, unreadable or corrupt file yields an empty ledger.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let steps = load(&path);
        Self {
            path,
            steps: Mutex::new(steps),
        }
    }

    /// Open the ledger at its default location, `<home>/.system_setup_state`.
    #[must_use]
    pub fn open_default(home: &Path) -> Self {
        Self::open(home.join(STATE_FILE_NAME))
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `step_id` has been recorded as complete.
    #[must_use]
    pub fn is_complete(&self, step_id: &str) -> bool {
        self.lock().contains_key(step_id)
    }

    /// Record `step_id` as complete now and persist immediately.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the ledger cannot be written.
    pub fn mark_complete(&self, step_id: &str) -> Result<(), StateError> {
        let mut steps = self.lock();
        let mut next = steps.clone();
        next.insert(step_id.to_string(), now());
        self.persist(&next)?;
        *steps = next;
        Ok(())
    }

    /// Completion timestamp of `step_id`, if recorded.
    #[must_use]
    pub fn get_completion_time(&self, step_id: &str) -> Option<f64> {
        self.lock().get(step_id).copied()
    }

    /// Remove one step and persist. A missing step is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the ledger cannot be written.
    pub fn clear_step(&self, step_id: &str) -> Result<(), StateError> {
        let mut steps = self.lock();
        if !steps.contains_key(step_id) {
            return Ok(());
        }
        let mut next = steps.clone();
        next.remove(step_id);
        self.persist(&next)?;
        *steps = next;
        Ok(())
    }

    /// Empty the ledger and delete the backing file if it exists.
    ///
    /// The in-memory ledger is left untouched when the file cannot be
    /// removed.
    ///
    /// # Errors
    ///
    /// Returns [`StateError`] if the file exists but cannot be removed.
    pub fn clear(&self) -> Result<(), StateError> {
        let mut steps = self.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(StateError {
                    path: self.path.clone(),
                    source,
                });
            }
        }
        steps.clear();
        Ok(())
    }

    /// A copy of every recorded step, ordered by step id.
    #[must_use]
    pub fn get_completed_steps(&self) -> BTreeMap<String, f64> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, f64>> {
        self.steps.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, steps: &BTreeMap<String, f64>) -> Result<(), StateError> {
        write_atomic(&self.path, steps).map_err(|source| StateError {
            path: self.path.clone(),
            source,
        })
    }
}

fn load(path: &Path) -> BTreeMap<String, f64> {
    fs::read_to_string(path)
        .ok()
        .and_then(|content| serde_json::from_str(&content).ok())
        .unwrap_or_default()
}

/// Temp-file sibling used while replacing `path`.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(std::ffi::OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, steps: &BTreeMap<String, f64>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(steps)?;
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let result = write_then_rename(&tmp, path, json.as_bytes());
    if result.is_err() {
        fs::remove_file(&tmp).ok();
    }
    result
}

fn write_then_rename(tmp: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp)?;
    file.write_all(content)?;
    file.sync_all()?;
    drop(file);
    fs::rename(tmp, path)
}

fn now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}
