//! Session store trait and the JSON file implementation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::snapshot::SessionSnapshot;

/// Store errors. Loads never surface parse errors (they degrade to an
/// empty list); saves can fail on I/O.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot serialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable storage for the session list.
pub trait SessionStore: Send + Sync {
    /// Load all persisted sessions. Malformed or missing data yields an
    /// empty list, never an error.
    fn load(&self) -> Vec<SessionSnapshot>;

    /// Persist the full session list, replacing what was stored.
    fn save(&self, sessions: &[SessionSnapshot]) -> Result<(), StoreError>;
}

/// JSON-file-backed store. Writes go to a sibling temp file first and are
/// renamed into place, so a crash mid-write never corrupts the stored list.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// A store at the given path. The file need not exist yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for JsonFileStore {
    fn load(&self) -> Vec<SessionSnapshot> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no session store yet");
                return Vec::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read session store");
                return Vec::new();
            }
        };
        match serde_json::from_str(&content) {
            Ok(sessions) => sessions,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "malformed session store; starting empty"
                );
                Vec::new()
            }
        }
    }

    fn save(&self, sessions: &[SessionSnapshot]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_string_pretty(sessions)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), count = sessions.len(), "session store saved");
        Ok(())
    }
}
