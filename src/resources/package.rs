//! Package manager backends.
//!
//! [`PackageManager`] is a closed set of backends sharing one interface.
//! Every operation goes through the [`CommandRunner`], so dry-run and
//! retries apply uniformly. Installs and builds run without a timeout;
//! only the quick queries are bounded.
use std::fmt;
use std::path::Path;

use crate::error::{CommandError, ResourceError};
use crate::exec::{CommandRunner, RunOptions};
use crate::platform::Os;

/// Suffix marking a Homebrew cask in a package list.
pub const CASK_SUFFIX: &str = ".cask";

/// AUR repository used to bootstrap paru.
const PARU_AUR_URL: &str = "https://aur.archlinux.org/paru.git";

/// Supported package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    /// macOS Homebrew (formulae and casks).
    Homebrew,
    /// Debian/Ubuntu apt.
    Apt,
    /// Official Arch Linux packages.
    Pacman,
    /// Arch packages plus the AUR.
    Paru,
    /// Windows Package Manager.
    Winget,
    /// Chocolatey.
    Chocolatey,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl PackageManager {
    /// Short name, also the binary probed on `PATH`.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Homebrew => "brew",
            Self::Apt => "apt",
            Self::Pacman => "pacman",
            Self::Paru => "paru",
            Self::Winget => "winget",
            Self::Chocolatey => "choco",
        }
    }

    /// Backends to try on `os`, most preferred first.
    #[must_use]
    pub const fn candidates(os: Os) -> &'static [Self] {
        match os {
            Os::MacOs => &[Self::Homebrew],
            Os::Linux => &[Self::Paru, Self::Pacman, Self::Apt],
            Os::Windows => &[Self::Winget, Self::Chocolatey],
            Os::Unknown => &[],
        }
    }

    /// Whether the backend's binary is reported present by `probe`.
    pub fn is_available(self, probe: &impl Fn(&str) -> bool) -> bool {
        match self {
            Self::Apt => probe("apt") || probe("apt-get"),
            _ => probe(self.name()),
        }
    }

    /// First candidate for `os` that `probe` reports available.
    pub fn select(os: Os, probe: impl Fn(&str) -> bool) -> Option<Self> {
        Self::candidates(os)
            .iter()
            .copied()
            .find(|pm| pm.is_available(&probe))
    }

    /// [`select`](Self::select) using the runner's `PATH` lookup.
    #[must_use]
    pub fn detect(os: Os, runner: &CommandRunner) -> Option<Self> {
        Self::select(os, |program| runner.is_available(program))
    }

    /// Refresh the package index.
    ///
    /// # Errors
    ///
    /// Returns the [`CommandError`] of the update command.
    pub fn update(self, runner: &CommandRunner) -> Result<(), CommandError> {
        let argv: &[&str] = match self {
            Self::Homebrew => &["brew", "update"],
            Self::Apt => &["sudo", "apt", "update"],
            Self::Pacman => &["sudo", "pacman", "-Sy"],
            Self::Paru => &["paru", "-Sy"],
            Self::Winget => &["winget", "source", "update"],
            Self::Chocolatey => &["choco", "upgrade", "chocolatey", "-y"],
        };
        runner.run_argv(argv, &RunOptions::new().stream().no_timeout())?;
        Ok(())
    }

    /// Install `packages`. An empty list does nothing.
    ///
    /// Homebrew installs names ending in [`CASK_SUFFIX`] as casks; winget
    /// installs one id per command.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::PackageInstall`] for the first failing
    /// command.
    pub fn install<S: AsRef<str>>(
        self,
        runner: &CommandRunner,
        packages: &[S],
    ) -> Result<(), ResourceError> {
        let names: Vec<&str> = packages.iter().map(AsRef::as_ref).collect();
        if names.is_empty() {
            return Ok(());
        }
        match self {
            Self::Homebrew => {
                let (casks, formulae): (Vec<&str>, Vec<&str>) =
                    names.iter().copied().partition(|n| n.ends_with(CASK_SUFFIX));
                let casks: Vec<&str> = casks
                    .iter()
                    .map(|c| c.trim_end_matches(CASK_SUFFIX))
                    .collect();
                if !formulae.is_empty() {
                    self.install_argv(runner, &["brew", "install"], &formulae)?;
                }
                if !casks.is_empty() {
                    self.install_argv(runner, &["brew", "install", "--cask"], &casks)?;
                }
                Ok(())
            }
            Self::Apt => self.install_argv(runner, &["sudo", "apt", "install", "-y"], &names),
            Self::Pacman => self.install_argv(
                runner,
                &["sudo", "pacman", "-S", "--needed", "--noconfirm"],
                &names,
            ),
            Self::Paru => {
                self.install_argv(runner, &["paru", "-S", "--needed", "--noconfirm"], &names)
            }
            Self::Winget => {
                for id in names.iter().copied() {
                    let argv = [
                        "winget",
                        "install",
                        "-e",
                        "--id",
                        id,
                        "--accept-package-agreements",
                        "--accept-source-agreements",
                    ];
                    runner
                        .run_argv(&argv, &RunOptions::new().stream().no_timeout())
                        .map_err(|source| self.install_error(&[id], source))?;
                }
                Ok(())
            }
            Self::Chocolatey => self.install_argv(runner, &["choco", "install", "-y"], &names),
        }
    }

    /// Install AUR packages through paru. An empty list does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::PackageInstall`] if paru fails.
    pub fn install_aur<S: AsRef<str>>(
        runner: &CommandRunner,
        packages: &[S],
    ) -> Result<(), ResourceError> {
        let names: Vec<&str> = packages.iter().map(AsRef::as_ref).collect();
        if names.is_empty() {
            return Ok(());
        }
        Self::Paru.install_argv(
            runner,
            &["paru", "-S", "--aur", "--needed", "--noconfirm"],
            &names,
        )
    }

    /// Whether `package` is installed. Query failures count as "not installed".
    #[must_use]
    pub fn is_installed(self, runner: &CommandRunner, package: &str) -> bool {
        let quiet = RunOptions::new().check(false);
        let ok = |argv: &[&str]| {
            runner
                .run_argv(argv, &quiet)
                .is_ok_and(|result| result.success())
        };
        let listed = |argv: &[&str]| {
            runner
                .run_argv(argv, &quiet)
                .is_ok_and(|result| result.success() && result.stdout.contains(package))
        };
        match self {
            Self::Homebrew => {
                let name = package.trim_end_matches(CASK_SUFFIX);
                ok(&["brew", "list", name]) || ok(&["brew", "list", "--cask", name])
            }
            Self::Apt => ok(&["dpkg", "-s", package]),
            Self::Pacman => ok(&["pacman", "-Q", package]),
            Self::Paru => ok(&["paru", "-Q", package]),
            Self::Winget => listed(&["winget", "list", "--id", package]),
            Self::Chocolatey => listed(&["choco", "list", "--local-only", package]),
        }
    }

    fn install_argv(
        self,
        runner: &CommandRunner,
        prefix: &[&str],
        names: &[&str],
    ) -> Result<(), ResourceError> {
        let argv: Vec<&str> = prefix.iter().chain(names).copied().collect();
        runner
            .run_argv(&argv, &RunOptions::new().stream().no_timeout())
            .map_err(|source| self.install_error(names, source))?;
        Ok(())
    }

    fn install_error(self, names: &[&str], source: CommandError) -> ResourceError {
        ResourceError::PackageInstall {
            manager: self.name().to_string(),
            packages: names.join(" "),
            source,
        }
    }
}

/// Make sure paru is installed, building it from the AUR if needed.
///
/// Installs `base-devel` and `git` with pacman, clones the paru AUR
/// repository into `build_root` and runs `makepkg -si`. The clone is removed
/// afterwards.
///
/// # Errors
///
/// Returns the [`CommandError`] of the first failing step.
pub fn ensure_paru(runner: &CommandRunner, build_root: &Path) -> Result<(), CommandError> {
    if runner.is_available("paru") {
        return Ok(());
    }
    runner.run_argv(
        &["sudo", "pacman", "-S", "--needed", "--noconfirm", "base-devel", "git"],
        &RunOptions::new().stream().no_timeout(),
    )?;
    let checkout = build_root.join("paru");
    let checkout_str = checkout.to_string_lossy().into_owned();
    runner.run_argv(
        &["git", "clone", PARU_AUR_URL, checkout_str.as_str()],
        &RunOptions::new(),
    )?;
    let built = runner.run_argv(
        &["makepkg", "-si", "--noconfirm"],
        &RunOptions::new().cwd(&checkout).stream().no_timeout(),
    );
    if !runner.is_dry_run() {
        std::fs::remove_dir_all(&checkout).ok();
    }
    built.map(|_| ())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::exec::{MockSpawner, ProcessOutput};
    use crate::logging::Logger;

    fn probe(available: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |program| available.contains(&program)
    }

    /// Runner whose spawner records each argv and answers with `code`.
    fn recording_runner(code: i32, stdout: &'static str) -> (CommandRunner, Arc<Mutex<Vec<String>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&calls);
        let mut spawner = MockSpawner::new();
        spawner.expect_spawn().returning(move |inv, _| {
            let mut argv = vec![inv.program.clone()];
            argv.extend(inv.args.iter().cloned());
            sink.lock().unwrap().push(argv.join(" "));
            Ok(ProcessOutput {
                code: Some(code),
                stdout: stdout.to_string(),
                stderr: String::new(),
            })
        });
        spawner.expect_which().returning(|_| None);
        let runner = CommandRunner::new(Arc::new(spawner), Arc::new(Logger::new(None)))
            .with_retry_delay(std::time::Duration::ZERO);
        (runner, calls)
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    #[test]
    fn candidates_per_os() {
        assert_eq!(PackageManager::candidates(Os::MacOs), [PackageManager::Homebrew]);
        assert_eq!(
            PackageManager::candidates(Os::Linux),
            [PackageManager::Paru, PackageManager::Pacman, PackageManager::Apt]
        );
        assert_eq!(
            PackageManager::candidates(Os::Windows),
            [PackageManager::Winget, PackageManager::Chocolatey]
        );
        assert!(PackageManager::candidates(Os::Unknown).is_empty());
    }

    #[test]
    fn select_prefers_paru_over_pacman() {
        let pm = PackageManager::select(Os::Linux, probe(&["pacman", "paru"]));
        assert_eq!(pm, Some(PackageManager::Paru));
    }

    #[test]
    fn select_apt_via_apt_get() {
        let pm = PackageManager::select(Os::Linux, probe(&["apt-get"]));
        assert_eq!(pm, Some(PackageManager::Apt));
    }

    #[test]
    fn select_falls_through_to_chocolatey() {
        let pm = PackageManager::select(Os::Windows, probe(&["choco"]));
        assert_eq!(pm, Some(PackageManager::Chocolatey));
    }

    #[test]
    fn select_none_when_nothing_available() {
        assert_eq!(PackageManager::select(Os::MacOs, probe(&[])), None);
        assert_eq!(PackageManager::select(Os::Unknown, probe(&["brew"])), None);
    }

    #[test]
    fn display_uses_binary_name() {
        assert_eq!(PackageManager::Chocolatey.to_string(), "choco");
        assert_eq!(PackageManager::Homebrew.to_string(), "brew");
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    #[test]
    fn empty_install_is_a_noop() {
        let mut spawner = MockSpawner::new();
        spawner.expect_spawn().never();
        let runner = CommandRunner::new(Arc::new(spawner), Arc::new(Logger::new(None)));
        let none: [&str; 0] = [];
        for pm in [
            PackageManager::Homebrew,
            PackageManager::Apt,
            PackageManager::Winget,
        ] {
            pm.install(&runner, &none).unwrap();
        }
        PackageManager::install_aur(&runner, &none).unwrap();
    }

    #[test]
    fn homebrew_splits_casks() {
        let (runner, calls) = recording_runner(0, "");
        PackageManager::Homebrew
            .install(&runner, &["git", "firefox.cask", "fish"])
            .unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            ["brew install git fish", "brew install --cask firefox"]
        );
    }

    #[test]
    fn pacman_install_is_elevated() {
        let (runner, calls) = recording_runner(0, "");
        PackageManager::Pacman.install(&runner, &["git"]).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            ["sudo pacman -S --needed --noconfirm git"]
        );
    }

    #[test]
    fn winget_installs_one_id_per_command() {
        let (runner, calls) = recording_runner(0, "");
        PackageManager::Winget
            .install(&runner, &["Git.Git", "Neovim.Neovim"])
            .unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[1].contains("--id Neovim.Neovim"));
    }

    #[test]
    fn install_failure_names_manager_and_packages() {
        let (runner, _calls) = recording_runner(100, "");
        let err = PackageManager::Apt
            .install(&runner, &["git", "curl"])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Package installation failed via apt: git curl"
        );
    }

    #[test]
    fn update_commands() {
        let (runner, calls) = recording_runner(0, "");
        PackageManager::Apt.update(&runner).unwrap();
        PackageManager::Chocolatey.update(&runner).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            ["sudo apt update", "choco upgrade chocolatey -y"]
        );
    }

    #[test]
    fn install_aur_uses_paru() {
        let (runner, calls) = recording_runner(0, "");
        PackageManager::install_aur(&runner, &["lazydocker"]).unwrap();
        assert_eq!(
            *calls.lock().unwrap(),
            ["paru -S --aur --needed --noconfirm lazydocker"]
        );
    }

    #[test]
    fn is_installed_by_exit_code() {
        let (runner, calls) = recording_runner(0, "");
        assert!(PackageManager::Apt.is_installed(&runner, "git"));
        assert_eq!(*calls.lock().unwrap(), ["dpkg -s git"]);

        let (runner, _) = recording_runner(1, "");
        assert!(!PackageManager::Pacman.is_installed(&runner, "git"));
    }

    #[test]
    fn winget_is_installed_requires_id_in_output() {
        let (runner, _) = recording_runner(0, "No installed package found");
        assert!(!PackageManager::Winget.is_installed(&runner, "Git.Git"));
        let (runner, _) = recording_runner(0, "Git  Git.Git  2.45.0");
        assert!(PackageManager::Winget.is_installed(&runner, "Git.Git"));
    }

    #[test]
    fn homebrew_is_installed_checks_casks_second() {
        let (runner, calls) = recording_runner(1, "");
        assert!(!PackageManager::Homebrew.is_installed(&runner, "firefox.cask"));
        assert_eq!(
            *calls.lock().unwrap(),
            ["brew list firefox", "brew list --cask firefox"]
        );
    }

    #[test]
    fn ensure_paru_builds_from_aur() {
        let tmp = tempfile::tempdir().unwrap();
        let (runner, calls) = recording_runner(0, "");
        ensure_paru(&runner, tmp.path()).unwrap();
        let calls = calls.lock().unwrap();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].starts_with("sudo pacman -S --needed --noconfirm base-devel git"));
        assert!(calls[1].starts_with("git clone https://aur.archlinux.org/paru.git"));
        assert_eq!(calls[2], "makepkg -si --noconfirm");
    }

    #[test]
    fn long_running_commands_have_no_timeout() {
        let timeouts = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&timeouts);
        let mut spawner = MockSpawner::new();
        spawner.expect_spawn().returning(move |inv, timeout| {
            sink.lock().unwrap().push((inv.program.clone(), timeout));
            Ok(ProcessOutput {
                code: Some(0),
                ..ProcessOutput::default()
            })
        });
        spawner.expect_which().returning(|_| None);
        let runner = CommandRunner::new(Arc::new(spawner), Arc::new(Logger::new(None)));
        let tmp = tempfile::tempdir().unwrap();

        PackageManager::Pacman.update(&runner).unwrap();
        PackageManager::Pacman
            .install(&runner, &["hyprland", "waybar", "firefox"])
            .unwrap();
        PackageManager::Winget.install(&runner, &["Git.Git"]).unwrap();
        PackageManager::install_aur(&runner, &["walker"]).unwrap();
        ensure_paru(&runner, tmp.path()).unwrap();
        PackageManager::Apt.is_installed(&runner, "git");

        let timeouts = timeouts.lock().unwrap();
        let bounded: Vec<&str> = timeouts
            .iter()
            .filter(|(_, t)| t.is_some())
            .map(|(program, _)| program.as_str())
            .collect();
        assert_eq!(bounded, ["git", "dpkg"]);
        assert_eq!(timeouts.len(), 8);
    }
}
