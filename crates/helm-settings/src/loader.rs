//! Settings loading with deep merge and environment variable overrides.
//!
//! Deep merge rules:
//! - Objects merge recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::HelmSettings;

/// Resolve the path to the settings file (`~/.helm/settings.json`).
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned());
    PathBuf::from(home).join(".helm").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<HelmSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// A missing file yields defaults; invalid JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<HelmSettings> {
    let defaults = serde_json::to_value(HelmSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: HelmSettings = serde_json::from_value(merged)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
#[must_use]
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// Integers must parse and fall within range; invalid values are silently
/// ignored (falling back to file/default).
pub fn apply_env_overrides(settings: &mut HelmSettings) {
    if let Some(v) = read_env_string("HELM_MODEL") {
        settings.api.model = v;
    }
    if let Some(v) = read_env_string("GEMINI_API_KEY") {
        settings.api.api_key = Some(v);
    }
    if let Some(v) = read_env_string("HELM_API_BASE_URL") {
        settings.api.base_url = Some(v);
    }
    if let Some(v) = read_env_usize("HELM_MAX_SESSIONS", 1, 64) {
        settings.session.max_sessions = v;
    }
    if let Some(v) = read_env_u64("HELM_DRIVE_DELAY_MS", 100, 600_000) {
        settings.session.drive_delay_ms = v;
    }
    if let Some(v) = read_env_string("HELM_SESSIONS_PATH") {
        settings.storage.sessions_path = PathBuf::from(v);
    }
}

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    read_env_string(name)?
        .parse()
        .ok()
        .filter(|v| (min..=max).contains(v))
}

fn read_env_u64(name: &str, min: u64, max: u64) -> Option<u64> {
    read_env_string(name)?
        .parse()
        .ok()
        .filter(|v| (min..=max).contains(v))
}
