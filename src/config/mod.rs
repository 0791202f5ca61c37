//! Layered YAML configuration.
//!
//! Layers, lowest precedence first:
//!
//! 1. built-in defaults compiled into the binary (`defaults.yaml`);
//! 2. the first user file found by [`search_paths`];
//! 3. the selected profile (see [`profiles`]);
//! 4. `SYSTEM_SETUP_*` environment variables, consulted per key.
pub mod merge;
pub mod profiles;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

pub use merge::deep_merge;
pub use profiles::ProfileInfo;

use crate::error::ConfigError;
use crate::platform::Os;

/// Built-in defaults.
const DEFAULTS: &str = include_str!("defaults.yaml");

/// Prefix of environment overrides.
const ENV_PREFIX: &str = "SYSTEM_SETUP_";

/// Google Drive id of the dotfiles archive when none is configured.
const DEFAULT_GDRIVE_ID: &str = "1ijyAcpSGqlYji-ojPBnsSnaMmpj7Dn4D";

/// Task order used when `tasks.order` is absent.
pub const DEFAULT_TASK_ORDER: &[&str] = &[
    "packages",
    "chezmoi",
    "modern-tools",
    "fish",
    "hyprland",
    "settings",
    "shell",
];

/// Border colours of a Hyprland theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeColors {
    /// `col.active_border` value.
    pub active_border: String,
    /// `col.inactive_border` value.
    pub inactive_border: String,
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            active_border: "rgba(cba6f7ee) rgba(89b4faee) 45deg".to_string(),
            inactive_border: "rgba(585b70aa)".to_string(),
        }
    }
}

/// Candidate user config files, in search order.
///
/// An explicit path replaces the whole search list.
#[must_use]
pub fn search_paths(explicit: Option<&Path>, cwd: &Path, home: &Path) -> Vec<PathBuf> {
    if let Some(path) = explicit {
        return vec![path.to_path_buf()];
    }
    vec![
        cwd.join("system_setup.yaml"),
        cwd.join("system_setup.yml"),
        home.join(".system_setup.yaml"),
        home.join(".system_setup.yml"),
        home.join(".config").join("system_setup.yaml"),
        home.join(".config").join("system_setup.yml"),
    ]
}

/// Read-only configuration shared by every task for one run.
#[derive(Debug, Clone)]
pub struct Config {
    root: Value,
    source: Option<PathBuf>,
    active_profile: Option<String>,
    profile_skip_tasks: Vec<String>,
    env: BTreeMap<String, String>,
}

impl Config {
    /// Load defaults, the first user file among `paths`, and `profile`.
    ///
    /// Environment overrides are not captured; see [`Config::with_env`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidYaml`] for an unparsable document,
    /// [`ConfigError::Io`] if a found file cannot be read, and
    /// [`ConfigError::UnknownProfile`] for an undefined profile.
    pub fn from_sources(paths: &[PathBuf], profile: Option<&str>) -> Result<Self, ConfigError> {
        let mut root = parse("<defaults>", DEFAULTS)?;
        let mut source = None;
        if let Some(path) = paths.iter().find(|p| p.is_file()) {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })?;
            deep_merge(&mut root, parse(&path.display().to_string(), &text)?);
            source = Some(path.clone());
        }
        let mut config = Self {
            root,
            source,
            active_profile: None,
            profile_skip_tasks: Vec::new(),
            env: BTreeMap::new(),
        };
        if let Some(name) = profile {
            config.profile_skip_tasks = profiles::apply(&mut config.root, name)?;
            config.active_profile = Some(name.to_string());
        }
        Ok(config)
    }

    /// Load configuration for a run: search the standard locations (or only
    /// `explicit`), apply `profile`, and capture `SYSTEM_SETUP_*` overrides
    /// from the process environment.
    ///
    /// # Errors
    ///
    /// See [`Config::from_sources`]. An explicit path that does not exist is
    /// reported as [`ConfigError::Io`].
    pub fn load(
        explicit: Option<&Path>,
        profile: Option<&str>,
        home: &Path,
    ) -> Result<Self, ConfigError> {
        if let Some(path) = explicit
            && !path.is_file()
        {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let paths = search_paths(explicit, &cwd, home);
        Ok(Self::from_sources(&paths, profile)?.with_env(std::env::vars()))
    }

    /// Built-in defaults merged with an inline YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidYaml`] if either document is invalid.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        let mut config = Self::from_sources(&[], None)?;
        deep_merge(&mut config.root, parse("<inline>", text)?);
        Ok(config)
    }

    /// Capture `SYSTEM_SETUP_*` variables from `vars` as per-key overrides.
    #[must_use]
    pub fn with_env(mut self, vars: impl IntoIterator<Item = (String, String)>) -> Self {
        self.env = vars
            .into_iter()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        self
    }

    /// User file that was merged, if any.
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Look up a dotted key. An environment override always wins and
    /// yields a string.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.env.get(&env_key(key)) {
            return Some(Value::String(value.clone()));
        }
        let mut node = &self.root;
        for part in key.split('.') {
            node = node.get(part)?;
        }
        if node.is_null() {
            return None;
        }
        Some(node.clone())
    }

    /// Scalar value of `key` rendered as a string.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).as_ref().and_then(scalar_string)
    }

    /// List value of `key`. A string is split on commas; sequence items are
    /// rendered as strings. Missing or other values give an empty list.
    #[must_use]
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            Some(Value::Sequence(items)) => items.iter().filter_map(scalar_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Boolean value of `key`, `default` when missing.
    ///
    /// Strings `true`, `yes`, `1` and `on` (any case) are true.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.get(key) {
            None => default,
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => {
                matches!(s.to_lowercase().as_str(), "true" | "yes" | "1" | "on")
            }
            Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f.abs() > f64::EPSILON),
            Some(_) => default,
        }
    }

    /// Name of the selected profile.
    #[must_use]
    pub fn active_profile(&self) -> Option<&str> {
        self.active_profile.as_deref()
    }

    /// Tasks the selected profile skips.
    #[must_use]
    pub fn profile_skip_tasks(&self) -> &[String] {
        &self.profile_skip_tasks
    }

    /// Every defined profile with its description.
    #[must_use]
    pub fn list_profiles(&self) -> Vec<ProfileInfo> {
        profiles::list(&self.root)
    }

    /// Configured default task order.
    #[must_use]
    pub fn task_order(&self) -> Vec<String> {
        let order = self.get_list("tasks.order");
        if order.is_empty() {
            DEFAULT_TASK_ORDER.iter().map(ToString::to_string).collect()
        } else {
            order
        }
    }

    /// Packages to install on `os`. Casks carry a `.cask` suffix.
    #[must_use]
    pub fn packages_for_platform(&self, os: Os, distro: Option<&str>) -> Vec<String> {
        let mut packages = Vec::new();
        match os {
            Os::MacOs => {
                packages.extend(self.get_list("packages.macos.formulae"));
                packages.extend(
                    self.get_list("packages.macos.casks")
                        .into_iter()
                        .map(|cask| format!("{cask}.cask")),
                );
            }
            Os::Linux => {
                packages.extend(self.get_list("packages.linux.common"));
                if let Some(distro) = distro {
                    packages.extend(self.get_list(&format!("packages.linux.{distro}")));
                }
            }
            Os::Windows => packages.extend(self.get_list("packages.windows.winget")),
            Os::Unknown => {}
        }
        packages.extend(self.get_list("packages.additional"));
        packages
    }

    /// Google Drive id of the dotfiles archive.
    #[must_use]
    pub fn dotfiles_gdrive_id(&self) -> String {
        self.get_str("dotfiles.gdrive_id")
            .unwrap_or_else(|| DEFAULT_GDRIVE_ID.to_string())
    }

    /// Direct download URL of the dotfiles archive, preferred over Drive.
    #[must_use]
    pub fn dotfiles_url(&self) -> Option<String> {
        self.get_str("dotfiles.url").filter(|s| !s.is_empty())
    }

    /// Expected SHA-256 of the dotfiles archive; `skip` disables verification.
    #[must_use]
    pub fn dotfiles_checksum(&self) -> Option<String> {
        self.get_str("dotfiles.checksum")
            .filter(|c| c != "skip" && !c.is_empty())
    }

    /// Whether a checksum mismatch is fatal.
    #[must_use]
    pub fn checksum_required(&self) -> bool {
        self.get_bool("dotfiles.checksum_required", false)
    }

    /// Dotfiles repository for chezmoi.
    #[must_use]
    pub fn chezmoi_repo(&self) -> Option<String> {
        self.get_str("chezmoi.repo")
            .or_else(|| self.get_str("dotfiles.repo"))
            .filter(|s| !s.is_empty())
    }

    /// Whether the fish task runs.
    #[must_use]
    pub fn fish_enabled(&self) -> bool {
        self.get_bool("fish.enabled", true)
    }

    /// Whether fish becomes the login shell.
    #[must_use]
    pub fn fish_set_default(&self) -> bool {
        self.get_bool("fish.set_default", true)
    }

    /// Fisher plugins to install.
    #[must_use]
    pub fn fish_plugins(&self) -> Vec<String> {
        self.get_list("fish.plugins")
    }

    /// Fish abbreviations in document order.
    #[must_use]
    pub fn fish_abbreviations(&self) -> Vec<(String, String)> {
        let Some(Value::Mapping(map)) = self.get("fish.abbreviations") else {
            return Vec::new();
        };
        map.iter()
            .filter_map(|(k, v)| Some((scalar_string(k)?, scalar_string(v)?)))
            .collect()
    }

    /// Whether the modern-tools task runs.
    #[must_use]
    pub fn modern_tools_enabled(&self) -> bool {
        self.get_bool("modern_tools.enabled", true)
    }

    /// Tools excluded from the modern-tools task.
    #[must_use]
    pub fn modern_tools_skip(&self) -> Vec<String> {
        self.get_list("modern_tools.skip")
    }

    /// Whether the Hyprland task runs.
    #[must_use]
    pub fn hyprland_enabled(&self) -> bool {
        self.get_bool("hyprland.enabled", true)
    }

    /// Terminal bound to the Hyprland terminal key.
    #[must_use]
    pub fn hyprland_terminal(&self) -> String {
        self.get_str("hyprland.terminal")
            .unwrap_or_else(|| "ghostty".to_string())
    }

    /// Application launcher.
    #[must_use]
    pub fn hyprland_launcher(&self) -> String {
        self.get_str("hyprland.launcher")
            .unwrap_or_else(|| "walker".to_string())
    }

    /// File manager.
    #[must_use]
    pub fn hyprland_file_manager(&self) -> String {
        self.get_str("hyprland.file_manager")
            .unwrap_or_else(|| "nemo".to_string())
    }

    /// Theme name.
    #[must_use]
    pub fn hyprland_theme(&self) -> String {
        self.get_str("hyprland.theme")
            .unwrap_or_else(|| "catppuccin-mocha".to_string())
    }

    /// Border colours of the configured theme, Catppuccin when undefined.
    #[must_use]
    pub fn hyprland_theme_colors(&self) -> ThemeColors {
        let theme = self.hyprland_theme();
        let base = format!("hyprland.themes.{theme}");
        match (
            self.get_str(&format!("{base}.active_border")),
            self.get_str(&format!("{base}.inactive_border")),
        ) {
            (Some(active_border), Some(inactive_border)) => ThemeColors {
                active_border,
                inactive_border,
            },
            _ => ThemeColors::default(),
        }
    }
}

/// `a.b-c` becomes `SYSTEM_SETUP_A_B-C`.
fn env_key(key: &str) -> String {
    format!("{ENV_PREFIX}{}", key.to_uppercase().replace('.', "_"))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse a document; an empty one is an empty mapping.
fn parse(origin: &str, text: &str) -> Result<Value, ConfigError> {
    let value: Value = serde_yaml::from_str(text).map_err(|e| ConfigError::InvalidYaml {
        path: origin.to_string(),
        source: e,
    })?;
    Ok(if value.is_null() {
        Value::Mapping(serde_yaml::Mapping::new())
    } else {
        value
    })
}
