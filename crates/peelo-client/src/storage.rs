//! # Persisted State
//!
//! Small key/value storage for state that must survive a restart: the
//! session credential, the selected branch and the cart.
//!
//! ## Keys
//! ```text
//! ┌──────────────────┬──────────────────────────────┬─────────────────────┐
//! │ Key              │ Value                        │ Written by          │
//! ├──────────────────┼──────────────────────────────┼─────────────────────┤
//! │ session.json     │ Credential                   │ SessionStore        │
//! │ branch.json      │ Branch                       │ BranchStore         │
//! │ cart.json        │ Cart { lines }               │ CartStore           │
//! └──────────────────┴──────────────────────────────┴─────────────────────┘
//! ```
//!
//! Stores treat persistence as best-effort: a failed write is logged and the
//! in-memory transition still stands.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

use crate::error::{StorageError, StorageResult};

pub const SESSION_KEY: &str = "session";
pub const BRANCH_KEY: &str = "branch";
pub const CART_KEY: &str = "cart";

/// String key/value persistence.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;
    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Shared handle every store holds.
pub type SharedStorage = Arc<dyn Storage>;

// =============================================================================
// File Storage
// =============================================================================

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    /// Creates the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(?dir, "Opened file storage");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        // Write-then-rename so a crash never leaves a half-written file
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Memory Storage
// =============================================================================

/// Process-local storage for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map still holds consistent strings
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

// =============================================================================
// Typed Helpers
// =============================================================================

/// Reads and decodes a JSON value.
pub fn load_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> StorageResult<Option<T>> {
    let Some(raw) = storage.get(key)? else {
        return Ok(None);
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StorageError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })
}

pub fn save_json<T: Serialize>(storage: &dyn Storage, key: &str, value: &T) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    storage.set(key, &raw)
}

/// Best-effort load used at startup; failures are reported as absent.
///
/// Only a corrupt value is deleted. A read that fails leaves the value in
/// place for the next start.
pub fn restore_json<T: DeserializeOwned>(storage: &dyn Storage, key: &str) -> Option<T> {
    match load_json(storage, key) {
        Ok(value) => value,
        Err(e @ StorageError::Serialization { .. }) => {
            warn!(key, error = %e, "Discarding corrupt persisted state");
            if let Err(e) = storage.remove(key) {
                warn!(key, error = %e, "Failed to remove corrupt persisted state");
            }
            None
        }
        Err(e) => {
            warn!(key, error = %e, "Could not read persisted state, ignoring it for now");
            None
        }
    }
}

/// Best-effort write used after every store transition.
pub fn persist_json<T: Serialize>(storage: &dyn Storage, key: &str, value: Option<&T>) {
    let result = match value {
        Some(value) => save_json(storage, key, value),
        None => storage.remove(key),
    };
    if let Err(e) = result {
        warn!(key, error = %e, "Failed to persist state");
    }
}
