//! Local persistence for storefront state.
//!
//! # Layout
//!
//! Every logical collection lives under one namespaced key holding a JSON
//! document:
//!
//! - `quantofy_users` - every registered account (including the admin)
//! - `quantofy_user` - the current session user (no credentials)
//! - `quantofy_purchases_<userId>` - purchase history per user
//! - `quantofy_cart` - the cart, when the caller opts into persisting it
//!
//! There is no schema version: changing a stored shape is a breaking change
//! for existing data.
//!
//! # Backends
//!
//! [`KeyValueStore`] abstracts the substrate. [`MemoryStore`] keeps data in
//! process; [`FileStore`] writes one JSON file per key into a data
//! directory. Callers only ever see [`Storage`], whose operations are total:
//! corrupt entries read back as the default value and write failures are
//! logged and reported, never returned.

pub mod purchases;
pub mod users;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Errors raised by a storage backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Filesystem operation failed.
    #[error("I/O error on key {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: io::Error,
    },

    /// Key contains characters the backend cannot store.
    #[error("unsupported storage key {key:?}: only [A-Za-z0-9_-] is allowed")]
    InvalidKey { key: String },

    /// Value could not be encoded as JSON.
    #[error("failed to encode value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors returned by repositories for domain-level conflicts.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// A uniqueness constraint would be violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The referenced record does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Raw string key-value substrate.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot be written.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// List every stored key.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot be listed.
    fn keys(&self) -> Result<Vec<String>, StorageError>;
}

// =============================================================================
// Storage
// =============================================================================

/// Typed, total view over a [`KeyValueStore`].
///
/// Cheaply cloneable; clones share the same backend.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn KeyValueStore>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage").finish_non_exhaustive()
    }
}

impl Storage {
    /// Wrap a backend.
    #[must_use]
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// In-memory storage, mostly for tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::default())
    }

    /// Load the value under `key`, or `T::default()` when absent or corrupt.
    pub fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        self.load_optional(key).unwrap_or_default()
    }

    /// Load the value under `key`, or `None` when absent or corrupt.
    ///
    /// A malformed entry is discarded so the next read starts clean.
    pub fn load_optional<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                error!(key, error = %e, "Failed to read persisted state");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "Discarding corrupt persisted state");
                self.remove(key);
                None
            }
        }
    }

    /// Persist `value` under `key`.
    ///
    /// Failures are logged and reported to Sentry; the caller continues with
    /// its in-memory state.
    pub fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        if let Err(e) = self.try_save(key, value) {
            let event_id = sentry::capture_error(&e);
            error!(key, error = %e, sentry_event_id = %event_id, "Failed to persist state");
        }
    }

    /// Persist `value` under `key`, returning backend errors.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if encoding or the backend write fails.
    pub fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let raw = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.backend.set(key, &raw)?;
        debug!(key, bytes = raw.len(), "Persisted state");
        Ok(())
    }

    /// Delete `key`.
    pub fn remove(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            error!(key, error = %e, "Failed to remove persisted state");
        }
    }

    /// Every stored key starting with `prefix`, sorted.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => {
                let mut matching: Vec<String> =
                    keys.into_iter().filter(|k| k.starts_with(prefix)).collect();
                matching.sort();
                matching
            }
            Err(e) => {
                error!(prefix, error = %e, "Failed to list persisted keys");
                Vec::new()
            }
        }
    }

    /// Write a raw string directly, bypassing JSON encoding.
    ///
    /// Used by tooling that imports data and by tests that simulate corrupt
    /// entries.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the backend write fails.
    pub fn save_raw(&self, key: &str, raw: &str) -> Result<(), StorageError> {
        self.backend.set(key, raw)
    }
}

// =============================================================================
// Memory backend
// =============================================================================

/// Process-local backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries().keys().cloned().collect())
    }
}

// =============================================================================
// File backend
// =============================================================================

/// Backend storing each key as `<dir>/<key>.json`.
///
/// Keys must be non-empty and use only `[A-Za-z0-9_-]`, so [`keys`] lists
/// exactly what was saved. Other keys fail with `StorageError::InvalidKey`.
///
/// [`keys`]: KeyValueStore::keys
///
/// Writes go to a temporary file first and are renamed into place, so a
/// crash never leaves a half-written document behind.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    const EXTENSION: &'static str = "json";

    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Root directory of this store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        if !is_file_safe_key(key) {
            return Err(StorageError::InvalidKey {
                key: key.to_owned(),
            });
        }
        Ok(self.dir.join(format!("{key}.{}", Self::EXTENSION)))
    }
}

fn is_file_safe_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)?) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            // Invalid UTF-8 is no different from any other corrupt entry
            Err(e) if e.kind() == io::ErrorKind::InvalidData => Ok(Some(String::new())),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        let io_err = |source| StorageError::Io {
            key: key.to_owned(),
            source,
        };
        fs::write(&tmp, value).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StorageError::Io {
                key: key.to_owned(),
                source,
            }),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            key: self.dir.display().to_string(),
            source,
        })?;

        let mut keys = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(stem) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|stem| is_file_safe_key(stem))
            {
                keys.push(stem.to_owned());
            }
        }
        Ok(keys)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        hits: u32,
    }

    #[test]
    fn test_load_missing_returns_default() {
        let storage = Storage::in_memory();
        let value: Vec<String> = storage.load("quantofy_users");
        assert!(value.is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let storage = Storage::in_memory();
        storage.save("counter", &Counter { hits: 3 });
        assert_eq!(storage.load::<Counter>("counter"), Counter { hits: 3 });
    }

    #[test]
    fn test_corrupt_entry_yields_default_and_is_discarded() {
        let storage = Storage::in_memory();
        storage.save_raw("counter", "{not json").unwrap();

        assert_eq!(storage.load::<Counter>("counter"), Counter::default());
        assert!(storage.keys_with_prefix("counter").is_empty());
    }

    #[test]
    fn test_wrong_shape_is_treated_as_corrupt() {
        let storage = Storage::in_memory();
        storage.save_raw("counter", "[1, 2, 3]").unwrap();
        assert!(storage.load_optional::<Counter>("counter").is_none());
    }

    #[test]
    fn test_keys_with_prefix_filters_and_sorts() {
        let storage = Storage::in_memory();
        storage.save("quantofy_purchases_b", &Vec::<u8>::new());
        storage.save("quantofy_purchases_a", &Vec::<u8>::new());
        storage.save("quantofy_users", &Vec::<u8>::new());

        assert_eq!(
            storage.keys_with_prefix("quantofy_purchases_"),
            vec!["quantofy_purchases_a", "quantofy_purchases_b"]
        );
    }

    #[test]
    fn test_file_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let storage = Storage::new(FileStore::open(dir).unwrap());

        storage.save("quantofy_cart", &Counter { hits: 7 });
        assert!(dir.join("quantofy_cart.json").exists());
        assert_eq!(storage.load::<Counter>("quantofy_cart"), Counter { hits: 7 });
        assert_eq!(storage.keys_with_prefix("quantofy_"), vec!["quantofy_cart"]);

        storage.remove("quantofy_cart");
        assert!(!dir.join("quantofy_cart.json").exists());
    }

    #[test]
    fn test_file_store_corrupt_file_is_discarded() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path();
        let store = FileStore::open(dir).unwrap();
        fs::write(dir.join("quantofy_user.json"), "<<garbage>>").unwrap();

        let storage = Storage::new(store);
        assert!(storage.load_optional::<Counter>("quantofy_user").is_none());
        assert!(!dir.join("quantofy_user.json").exists());
    }

    #[test]
    fn test_remove_missing_key_is_ok() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();
        assert!(store.remove("nothing-here").is_ok());
    }

    #[test]
    fn test_file_store_rejects_keys_it_cannot_list_back() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::open(tmp.path()).unwrap();

        for key in ["purchases:42", "../etc/passwd", "", "quantofy user"] {
            assert!(matches!(
                store.set(key, "{}"),
                Err(StorageError::InvalidKey { .. })
            ));
            assert!(matches!(store.get(key), Err(StorageError::InvalidKey { .. })));
        }
        assert!(store.keys().unwrap().is_empty());

        let user_id = "quantofy_purchases_0b7e5c1a-62f4-4b52-9d3e-5a8f1c2d4e6f";
        store.set(user_id, "[]").unwrap();
        assert_eq!(store.keys().unwrap(), vec![user_id.to_owned()]);
    }
}
