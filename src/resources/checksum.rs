//! SHA-256 verification of downloaded artifacts.
use std::fs::File;
use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::ResourceError;
use crate::logging::Log;

/// Lowercase hex SHA-256 of the file at `path`, streamed in chunks.
///
/// # Errors
///
/// Returns [`ResourceError::NotFound`] if the file does not exist and
/// [`ResourceError::Io`] if it cannot be read.
pub fn compute_sha256(path: &Path) -> Result<String, ResourceError> {
    let io_error = |source: io::Error| {
        if source.kind() == io::ErrorKind::NotFound {
            ResourceError::NotFound(path.display().to_string())
        } else {
            ResourceError::Io {
                path: path.display().to_string(),
                source,
            }
        }
    };
    let mut file = File::open(path).map_err(io_error)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(io_error)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Whether the file's digest equals `expected`, ignoring case.
///
/// # Errors
///
/// See [`compute_sha256`].
pub fn verify_sha256(path: &Path, expected: &str) -> Result<bool, ResourceError> {
    Ok(compute_sha256(path)?.eq_ignore_ascii_case(expected.trim()))
}

/// Apply the checksum policy to a downloaded artifact.
///
/// With no `expected` digest verification is skipped. On a mismatch the
/// artifact is deleted and an error returned when `required` is set;
/// otherwise a warning is logged and the artifact kept.
///
/// # Errors
///
/// Returns [`ResourceError::ChecksumMismatch`] for a required mismatch, or
/// the error of [`compute_sha256`].
pub fn checksum_gate(
    path: &Path,
    expected: Option<&str>,
    required: bool,
    log: &dyn Log,
) -> Result<(), ResourceError> {
    let Some(expected) = expected else {
        log.info("checksum verification disabled");
        return Ok(());
    };

    log.info("verifying checksum");
    let actual = compute_sha256(path)?;
    if actual.eq_ignore_ascii_case(expected.trim()) {
        log.info("checksum verified");
        return Ok(());
    }

    let mismatch = ResourceError::ChecksumMismatch {
        path: path.display().to_string(),
        expected: expected.to_string(),
        actual,
    };
    if required {
        log.error(&mismatch.to_string());
        std::fs::remove_file(path).map_err(|source| ResourceError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log.info(&format!("removed {}", path.display()));
        return Err(mismatch);
    }
    log.warn(&format!("{mismatch} (continuing, checksum not required)"));
    Ok(())
}
