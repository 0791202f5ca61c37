//! Logging infrastructure for structured console and file output.

mod logger;
mod subscriber;
mod types;
mod utils;

pub use logger::{Logger, render_summary};
pub use subscriber::{DRY_RUN_TARGET, STAGE_TARGET, Verbosity, init_subscriber};
pub use types::{Log, Summary, TaskEntry, TaskStatus};
pub use utils::{format_local_timestamp, log_file_path};

/// Serializes environment-variable manipulation across parallel test threads.
#[cfg(test)]
pub(crate) static TEST_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

/// Create a Logger backed by an isolated per-thread tracing subscriber
/// with a [`FileLayer`](subscriber::FileLayer) writing to
/// `<tempdir>/setup.log`, so that tracing events emitted by logger methods
/// actually reach a log file during tests.
///
/// Returns a [`tracing::dispatcher::DefaultGuard`] that must be kept alive
/// for the duration of the test; dropping it restores the previous
/// thread-local dispatcher.
#[cfg(test)]
#[allow(clippy::expect_used)]
pub(crate) fn isolated_logger() -> (Logger, tempfile::TempDir, tracing::dispatcher::DefaultGuard) {
    use tracing_subscriber::{Layer as _, filter::LevelFilter, layer::SubscriberExt as _};
    let tmp = tempfile::tempdir().expect("failed to create temp dir");
    let path = tmp.path().join("setup.log");
    let file_layer = subscriber::FileLayer::new(&path).expect("failed to create file layer");
    let subscriber =
        tracing_subscriber::registry().with(file_layer.with_filter(LevelFilter::DEBUG));
    let guard = tracing::dispatcher::set_default(&tracing::Dispatch::new(subscriber));
    let log = Logger::new(Some(path));
    (log, tmp, guard)
}
