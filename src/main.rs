//! `system-setup` command-line entry point.
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use system_setup::cli::Cli;
use system_setup::commands::{self, RunOutcome, setup};
use system_setup::logging::{self, Logger, Verbosity};
use system_setup::state::StateStore;
use system_setup::tasks::home_dir;

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let cli = Cli::parse();

    if cli.reset {
        return reset();
    }

    let log_file = logging::log_file_path(cli.log_file.as_deref());
    logging::init_subscriber(Verbosity::from_flags(cli.verbose, cli.quiet), &log_file);
    let log = Arc::new(Logger::new(Some(log_file)));

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    // First Ctrl-C stops the run at the next check; a second one exits now.
    if let Err(e) = ctrlc::set_handler(move || {
        if flag.swap(true, Ordering::SeqCst) {
            std::process::exit(i32::from(RunOutcome::Interrupted.exit_code()));
        }
    }) {
        log.warn(&format!("Could not install interrupt handler: {e}"));
    }

    match setup::run(&cli, &log, &interrupt) {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(e) => {
            log.error(&format!("{e:#}"));
            ExitCode::from(commands::error_exit_code(&e))
        }
    }
}

#[allow(clippy::print_stdout, clippy::print_stderr)]
fn reset() -> ExitCode {
    match clear_state() {
        Ok(()) => {
            println!("State cleared. Run again to start fresh.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn clear_state() -> anyhow::Result<()> {
    let home = home_dir()?;
    StateStore::open_default(&home).clear()?;
    Ok(())
}
