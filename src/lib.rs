//! Personal machine provisioning.
//!
//! Detects the host platform, loads layered YAML configuration and runs a
//! dependency-ordered list of idempotent setup tasks: system packages,
//! dotfiles, shells, CLI tools, desktop environment and OS settings.
//! Completed steps are recorded in a state file so an interrupted run can
//! be resumed.
//!
//! The public API is organised into layers:
//!
//! - **[`config`]**: defaults, user file, profile and environment overrides
//! - **[`resources`]**: package managers, downloads, checksums and files
//! - **[`tasks`]**: named units of work and their dependency order
//! - **[`commands`]**: the provisioning run and the listing flags
#![deny(clippy::or_fun_call)]
#![deny(clippy::bool_to_int_with_if)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod exec;
pub mod logging;
pub mod platform;
pub mod resources;
pub mod state;
pub mod tasks;
