//! Host-facing primitives used by tasks: package managers, downloads,
//! checksum verification, file installation and the login shell.
pub mod checksum;
pub mod download;
pub mod fs;
pub mod package;
pub mod shell;

pub use checksum::{checksum_gate, compute_sha256, verify_sha256};
pub use download::{download_file, download_from_gdrive};
pub use package::PackageManager;
