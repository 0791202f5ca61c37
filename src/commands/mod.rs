//! Top-level command handlers and the process exit status.
pub mod list;
pub mod setup;

use crate::error::{ConfigError, SetupError, TaskError};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every selected task succeeded, was skipped or was already complete.
    Success,
    /// At least one task failed.
    TasksFailed,
    /// The user interrupted the run.
    Interrupted,
}

impl RunOutcome {
    /// Process exit code for this outcome.
    #[must_use]
    pub const fn exit_code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::TasksFailed => 1,
            Self::Interrupted => 130,
        }
    }
}

/// Exit code for an error that ended the run early.
///
/// Invalid configuration, profiles, task names or dependency declarations
/// are argument errors (2); everything else is a general failure (1).
#[must_use]
pub fn error_exit_code(err: &anyhow::Error) -> u8 {
    let usage = err.downcast_ref::<ConfigError>().is_some()
        || err.downcast_ref::<TaskError>().is_some()
        || err
            .downcast_ref::<SetupError>()
            .is_some_and(SetupError::is_usage_error);
    if usage {
        2
    } else {
        1
    }
}
