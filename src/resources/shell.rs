//! Login shell management.
use std::path::Path;

use crate::error::CommandError;
use crate::exec::{CommandRunner, RunOptions};

/// System list of permitted login shells.
pub const ETC_SHELLS: &str = "/etc/shells";

/// Whether the `$SHELL` value `current` already runs `target`
/// (e.g. `/usr/local/bin/fish` for `fish`).
#[must_use]
pub fn is_current_shell(current: Option<&str>, target: &str) -> bool {
    current.is_some_and(|shell| {
        Path::new(shell)
            .file_name()
            .is_some_and(|name| name == target)
    })
}

/// Whether `shells_file` lists `shell` on a line of its own.
#[must_use]
pub fn is_listed(shells_file: &Path, shell: &Path) -> bool {
    let Ok(contents) = std::fs::read_to_string(shells_file) else {
        return false;
    };
    let wanted = shell.to_string_lossy();
    contents.lines().any(|line| line.trim() == wanted)
}

/// Append `shell` to `/etc/shells` unless it is already listed.
///
/// Returns whether the file was changed.
///
/// # Errors
///
/// Returns the [`CommandError`] of the append.
pub fn ensure_listed(runner: &CommandRunner, shell: &Path) -> Result<bool, CommandError> {
    if is_listed(Path::new(ETC_SHELLS), shell) {
        return Ok(false);
    }
    let quoted = shlex::try_quote(&shell.to_string_lossy())
        .map_err(|e| CommandError::Parse(e.to_string()))?
        .into_owned();
    runner.run(
        &format!("echo {quoted} | sudo tee -a {ETC_SHELLS} > /dev/null"),
        &RunOptions::new().shell(),
    )?;
    Ok(true)
}

/// Make `shell` the login shell of the current user.
///
/// # Errors
///
/// Returns the [`CommandError`] of `chsh`.
pub fn set_login_shell(runner: &CommandRunner, shell: &Path) -> Result<(), CommandError> {
    let shell = shell.to_string_lossy().into_owned();
    runner.run_argv(&["chsh", "-s", shell.as_str()], &RunOptions::new().stream())?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::exec::{MockSpawner, ProcessOutput};
    use crate::logging::Logger;

    #[test]
    fn current_shell_matches_basename() {
        assert!(is_current_shell(Some("/usr/local/bin/fish"), "fish"));
        assert!(!is_current_shell(Some("/bin/zsh"), "fish"));
        assert!(!is_current_shell(Some("/opt/fishy"), "fish"));
        assert!(!is_current_shell(None, "fish"));
    }

    #[test]
    fn listed_requires_whole_line() {
        let tmp = tempfile::tempdir().unwrap();
        let shells = tmp.path().join("shells");
        std::fs::write(&shells, "# comment\n/bin/bash\n/usr/bin/fish\n").unwrap();
        assert!(is_listed(&shells, Path::new("/usr/bin/fish")));
        assert!(!is_listed(&shells, Path::new("/usr/bin/fi")));
        assert!(!is_listed(&tmp.path().join("absent"), Path::new("/bin/bash")));
    }

    #[test]
    fn set_login_shell_runs_chsh() {
        let mut spawner = MockSpawner::new();
        spawner
            .expect_spawn()
            .withf(|inv, _| inv.program == "chsh" && inv.args == ["-s", "/usr/bin/zsh"])
            .times(1)
            .returning(|_, _| {
                Ok(ProcessOutput {
                    code: Some(0),
                    stdout: String::new(),
                    stderr: String::new(),
                })
            });
        let runner = CommandRunner::new(Arc::new(spawner), Arc::new(Logger::new(None)));
        set_login_shell(&runner, Path::new("/usr/bin/zsh")).unwrap();
    }
}
