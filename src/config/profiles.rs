//! Named profiles: package overrides plus a task skip-set.
use serde_yaml::Value;

use super::merge::deep_merge;
use crate::error::ConfigError;

/// Shown for profiles that do not declare a description.
const NO_DESCRIPTION: &str = "No description";

/// A profile as listed by `--list-profiles`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileInfo {
    /// Key under `profiles:`.
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// Every profile defined in `root`, in document order.
#[must_use]
pub fn list(root: &Value) -> Vec<ProfileInfo> {
    let Some(Value::Mapping(profiles)) = root.get("profiles") else {
        return Vec::new();
    };
    profiles
        .iter()
        .filter_map(|(name, body)| {
            let name = name.as_str()?.to_string();
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or(NO_DESCRIPTION)
                .to_string();
            Some(ProfileInfo { name, description })
        })
        .collect()
}

/// Apply profile `name` to `root` and return its skip-set.
///
/// The profile's `packages` mapping is deep-merged into the top-level
/// `packages`. Nothing else in the document changes.
///
/// # Errors
///
/// Returns [`ConfigError::UnknownProfile`] if `name` is not defined.
pub fn apply(root: &mut Value, name: &str) -> Result<Vec<String>, ConfigError> {
    let profile = root
        .get("profiles")
        .and_then(|profiles| profiles.get(name))
        .cloned()
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_string(),
            available: list(root)
                .into_iter()
                .map(|p| p.name)
                .collect::<Vec<_>>()
                .join(", "),
        })?;

    if let Some(packages) = profile.get("packages").cloned()
        && let Value::Mapping(map) = root
    {
        let slot = map
            .entry(Value::from("packages"))
            .or_insert_with(|| Value::Mapping(serde_yaml::Mapping::new()));
        deep_merge(slot, packages);
    }

    let skip = match profile.get("skip_tasks") {
        Some(Value::Sequence(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };
    Ok(skip)
}
