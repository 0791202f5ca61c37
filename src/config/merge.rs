//! Recursive merging of YAML documents.
use serde_yaml::Value;

/// Merge `overlay` into `base` in place.
///
/// Mappings merge key by key, recursively. Any other value, sequences
/// included, replaces the base value wholesale.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base_map), Value::Mapping(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
