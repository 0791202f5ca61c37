//! Host platform detection: OS, architecture and Linux distribution.
use std::fmt;
use std::path::{Path, PathBuf};

/// Detected operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Os {
    /// macOS.
    MacOs,
    /// Any Linux distribution.
    Linux,
    /// Windows.
    Windows,
    /// Anything else.
    Unknown,
}

impl Os {
    /// Stable identifier used in config files and task platform lists.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MacOs => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CPU architecture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    /// 64-bit x86.
    X86_64,
    /// 64-bit ARM (Apple Silicon, aarch64).
    Arm64,
    /// 32-bit x86.
    I386,
    /// Anything else.
    Unknown,
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X86_64 => write!(f, "x86_64"),
            Self::Arm64 => write!(f, "arm64"),
            Self::I386 => write!(f, "i386"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Operating system.
    pub os: Os,
    /// CPU architecture.
    pub arch: Architecture,
    /// Linux distribution id (`debian`, `arch`, ...), `None` elsewhere.
    pub distro: Option<String>,
}

/// Package-manager binaries probed to guess the Linux family, in order.
const DISTRO_PROBES: &[(&str, &str)] = &[
    ("apt", "debian"),
    ("apt-get", "debian"),
    ("pacman", "arch"),
    ("dnf", "fedora"),
    ("zypper", "opensuse"),
    ("yum", "rhel"),
];

impl Platform {
    /// Detect the current platform.
    ///
    /// `probe` reports whether a program is on `PATH`.
    pub fn detect(probe: impl Fn(&str) -> bool) -> Self {
        let os = detect_os();
        let distro = if os == Os::Linux {
            detect_distro(&probe, Path::new("/etc/os-release"))
        } else {
            None
        };
        Self {
            os,
            arch: detect_arch(std::env::consts::ARCH),
            distro,
        }
    }

    /// Create a platform with explicit values.
    #[must_use]
    pub fn new(os: Os, arch: Architecture, distro: Option<&str>) -> Self {
        Self {
            os,
            arch,
            distro: distro.map(String::from),
        }
    }

    /// Whether the OS is macOS.
    #[must_use]
    pub fn is_macos(&self) -> bool {
        self.os == Os::MacOs
    }

    /// Whether the OS is Linux.
    #[must_use]
    pub fn is_linux(&self) -> bool {
        self.os == Os::Linux
    }

    /// Whether the OS is Windows.
    #[must_use]
    pub fn is_windows(&self) -> bool {
        self.os == Os::Windows
    }

    /// Whether this is an Arch-family Linux.
    #[must_use]
    pub fn is_arch(&self) -> bool {
        self.is_linux() && self.distro.as_deref() == Some("arch")
    }

    /// Homebrew installation prefix for this architecture.
    #[must_use]
    pub fn homebrew_prefix(&self) -> PathBuf {
        if self.arch == Architecture::Arm64 {
            PathBuf::from("/opt/homebrew")
        } else {
            PathBuf::from("/usr/local")
        }
    }

    /// Path of the zsh binary to register as login shell.
    #[must_use]
    pub fn zsh_path(&self) -> PathBuf {
        if self.is_macos() {
            self.homebrew_prefix().join("bin/zsh")
        } else {
            PathBuf::from("/usr/bin/zsh")
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.os)?;
        if let Some(distro) = &self.distro {
            write!(f, " ({distro})")?;
        }
        write!(f, ", {}", self.arch)
    }
}

const fn detect_os() -> Os {
    if cfg!(target_os = "macos") {
        Os::MacOs
    } else if cfg!(target_os = "linux") {
        Os::Linux
    } else if cfg!(target_os = "windows") {
        Os::Windows
    } else {
        Os::Unknown
    }
}

fn detect_arch(arch: &str) -> Architecture {
    match arch {
        "x86_64" | "amd64" => Architecture::X86_64,
        "aarch64" | "arm64" => Architecture::Arm64,
        "x86" | "i386" | "i686" => Architecture::I386,
        _ => Architecture::Unknown,
    }
}

fn detect_distro(probe: &impl Fn(&str) -> bool, os_release: &Path) -> Option<String> {
    DISTRO_PROBES
        .iter()
        .find(|(program, _)| probe(program))
        .map(|(_, distro)| (*distro).to_string())
        .or_else(|| {
            std::fs::read_to_string(os_release)
                .ok()
                .and_then(|content| os_release_id(&content))
        })
}

/// Extract the `ID=` value from `/etc/os-release` content.
fn os_release_id(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| line.strip_prefix("ID="))
        .map(|id| id.trim().trim_matches('"').to_lowercase())
        .filter(|id| !id.is_empty())
}
