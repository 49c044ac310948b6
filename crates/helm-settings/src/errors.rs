//! Settings errors.

/// Result alias for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// Errors raised while loading settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// Settings file could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file contained invalid JSON.
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
}
