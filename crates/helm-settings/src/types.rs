//! Settings types with compiled defaults.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned()))
}

/// Top-level settings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HelmSettings {
    /// Provider API settings.
    pub api: ApiSettings,
    /// Session controller settings.
    pub session: SessionSettings,
    /// Persistence settings.
    pub storage: StorageSettings,
}

/// Provider API settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApiSettings {
    /// Model ID.
    pub model: String,
    /// API key. Usually supplied via `GEMINI_API_KEY`.
    pub api_key: Option<String>,
    /// Base URL override (proxies, tests).
    pub base_url: Option<String>,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            model: "gemini-3-pro-preview".to_owned(),
            api_key: None,
            base_url: None,
        }
    }
}

/// Session controller settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionSettings {
    /// Maximum concurrent sessions.
    pub max_sessions: usize,
    /// Driver re-arm delay in milliseconds.
    pub drive_delay_ms: u64,
    /// Byte budget for the driver's last-output excerpt.
    pub drive_excerpt_bytes: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_sessions: 6,
            drive_delay_ms: 2000,
            drive_excerpt_bytes: 300,
        }
    }
}

/// Persistence settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Path of the session snapshot file.
    pub sessions_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            sessions_path: home_dir().join(".helm").join("sessions.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = HelmSettings::default();
        assert_eq!(settings.api.model, "gemini-3-pro-preview");
        assert_eq!(settings.session.max_sessions, 6);
        assert_eq!(settings.session.drive_delay_ms, 2000);
        assert!(settings.storage.sessions_path.ends_with(".helm/sessions.json"));
    }

    #[test]
    fn partial_json_fills_missing_fields() {
        let settings: HelmSettings =
            serde_json::from_str(r#"{"session": {"maxSessions": 3}}"#).unwrap();
        assert_eq!(settings.session.max_sessions, 3);
        // Untouched fields keep their defaults.
        assert_eq!(settings.session.drive_delay_ms, 2000);
        assert_eq!(settings.api.model, "gemini-3-pro-preview");
    }

    #[test]
    fn serde_round_trip() {
        let settings = HelmSettings::default();
        let json = serde_json::to_string(&settings).unwrap();
        let back: HelmSettings = serde_json::from_str(&json).unwrap();
        assert_eq!(settings, back);
    }
}
