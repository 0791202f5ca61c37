//! Artifact downloads over HTTP and from Google Drive.
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::error::ResourceError;
use crate::exec::{CommandRunner, RunOptions};

/// Limit for establishing the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Limit for the server to start answering. The body itself may take as
/// long as the transfer needs.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

const CHUNK_SIZE: usize = 64 * 1024;

/// `<dest>.part`, the file written while a download is in flight.
fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Copy `reader` into `writer` chunk by chunk, stopping once `interrupt`
/// is set.
fn copy_until_interrupted(
    reader: &mut impl Read,
    writer: &mut impl Write,
    interrupt: &AtomicBool,
) -> io::Result<u64> {
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut total = 0u64;
    loop {
        if interrupt.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Interrupted, "interrupted"));
        }
        let n = match reader.read(&mut buf) {
            Ok(0) => return Ok(total),
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        writer.write_all(buf.get(..n).unwrap_or_default())?;
        total += n as u64;
    }
}

/// Download `url` to `dest`.
///
/// The body is streamed to `<dest>.part`, which is renamed over `dest` once
/// complete and removed on failure or interrupt.
///
/// # Errors
///
/// Returns [`ResourceError::Download`] for HTTP or transfer failures and
/// [`ResourceError::Io`] if the destination cannot be written.
pub fn download_file(
    url: &str,
    dest: &Path,
    interrupt: &AtomicBool,
) -> Result<(), ResourceError> {
    let io_error = |path: &Path, source: io::Error| ResourceError::Io {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_connect(Some(CONNECT_TIMEOUT))
        .timeout_recv_response(Some(RESPONSE_TIMEOUT))
        .build()
        .into();
    let response = agent.get(url).call().map_err(|e| ResourceError::Download {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let part = part_path(dest);
    let written = File::create(&part).and_then(|mut file| {
        let mut body = response.into_body().into_reader();
        copy_until_interrupted(&mut body, &mut file, interrupt)?;
        file.sync_all()
    });
    if let Err(e) = written {
        fs::remove_file(&part).ok();
        return Err(ResourceError::Download {
            url: url.to_string(),
            reason: e.to_string(),
        });
    }
    fs::rename(&part, dest).map_err(|e| {
        fs::remove_file(&part).ok();
        io_error(dest, e)
    })
}

/// Make sure `gdown` is on `PATH`, installing it with pip when missing.
///
/// Returns whether gdown is usable afterwards.
pub fn ensure_gdown(runner: &CommandRunner) -> bool {
    if runner.is_available("gdown") {
        return true;
    }
    let quiet = RunOptions::new().check(false);
    ["pip3", "pip"].into_iter().any(|pip| {
        runner
            .run_argv(&[pip, "install", "gdown", "--user"], &quiet)
            .is_ok_and(|result| result.success())
    })
}

/// Download Google Drive file `id` to `dest` with `gdown`.
///
/// # Errors
///
/// Returns [`ResourceError::Download`] if gdown fails; any partial file is
/// removed.
pub fn download_from_gdrive(
    runner: &CommandRunner,
    id: &str,
    dest: &Path,
) -> Result<(), ResourceError> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| ResourceError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let dest_str = dest.to_string_lossy().into_owned();
    runner
        .run_argv(
            &["gdown", id, "-O", dest_str.as_str()],
            &RunOptions::new().no_timeout(),
        )
        .map_err(|e| {
            fs::remove_file(dest).ok();
            ResourceError::Download {
                url: format!("gdrive:{id}"),
                reason: e.to_string(),
            }
        })?;
    Ok(())
}
