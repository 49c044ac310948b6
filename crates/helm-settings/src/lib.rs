//! # helm-settings
//!
//! Configuration loading. Flow:
//!
//! 1. Start with compiled [`HelmSettings::default()`]
//! 2. Deep-merge `~/.helm/settings.json` over the defaults, when present
//! 3. Apply environment variable overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::SettingsError;
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{ApiSettings, HelmSettings, SessionSettings, StorageSettings};
