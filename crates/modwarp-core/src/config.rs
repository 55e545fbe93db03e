//! Per-unit JSON key/value configuration stores
//!
//! Every discovered unit gets one [`ConfigStore`] handle, backed by a JSON
//! file in its folder (or in-memory for units without one). The engine only
//! creates and hands out stores; it never reads their contents.

use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A cloneable handle to one unit's key/value configuration
#[derive(Debug, Clone)]
pub struct ConfigStore {
    inner: Arc<Mutex<StoreInner>>,
}

#[derive(Debug)]
struct StoreInner {
    path: Option<PathBuf>,
    values: Map<String, Value>,
}

impl ConfigStore {
    /// Open a store backed by the JSON file at `path`.
    ///
    /// An absent file is not an error; the store starts empty and the file
    /// is created on first save.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let values = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str(&content)?
        } else {
            Map::new()
        };
        debug!("Opened config store at {:?} ({} keys)", path, values.len());

        Ok(Self {
            inner: Arc::new(Mutex::new(StoreInner {
                path: Some(path),
                values,
            })),
        })
    }

    /// Create a store with no backing file (internal code-only units)
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(StoreInner {
                path: None,
                values: Map::new(),
            })),
        }
    }

    // A panic in one holder must not disable the store for the others
    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read a typed value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let inner = self.lock();
        inner
            .values
            .get(key)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Write a typed value (in memory; call [`save`](Self::save) to persist)
    pub fn set<T: Serialize>(&self, key: &str, value: T) -> Result<()> {
        let mut inner = self.lock();
        let value = serde_json::to_value(value)?;
        inner.values.insert(key.to_string(), value);
        Ok(())
    }

    /// Whether a key is present
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.lock();
        inner.values.contains_key(key)
    }

    /// All keys currently in the store
    pub fn keys(&self) -> Vec<String> {
        let inner = self.lock();
        inner.values.keys().cloned().collect()
    }

    /// Persist the store to its backing file, if it has one
    pub fn save(&self) -> Result<()> {
        let inner = self.lock();
        let Some(path) = &inner.path else {
            return Ok(());
        };
        ensure_parent_dir(path)?;
        let content = serde_json::to_string_pretty(&Value::Object(inner.values.clone()))?;
        std::fs::write(path, content)?;
        debug!("Saved config store at {:?}", path);
        Ok(())
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_absent_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = ConfigStore::open(dir.path().join("config.json")).unwrap();
        assert!(store.keys().is_empty());
        assert_eq!(store.get::<String>("anything"), None);
    }

    #[test]
    fn test_set_save_reload_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let store = ConfigStore::open(&path).unwrap();
        store.set("difficulty", "hard").unwrap();
        store.set("retries", 3u32).unwrap();
        store.save().unwrap();

        let reloaded = ConfigStore::open(&path).unwrap();
        assert_eq!(reloaded.get::<String>("difficulty").unwrap(), "hard");
        assert_eq!(reloaded.get::<u32>("retries").unwrap(), 3);
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let store = ConfigStore::in_memory();
        store.set("key", true).unwrap();
        store.save().unwrap();
        assert!(store.contains("key"));
    }

    #[test]
    fn test_clones_share_state() {
        let store = ConfigStore::in_memory();
        let handle = store.clone();
        handle.set("shared", 1u8).unwrap();
        assert_eq!(store.get::<u8>("shared"), Some(1));
    }

    #[test]
    fn test_store_survives_a_panicking_holder() {
        use serde::ser::Serializer;

        struct Exploding;
        impl Serialize for Exploding {
            fn serialize<S: Serializer>(
                &self,
                _serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                panic!("simulated serializer panic")
            }
        }

        let store = ConfigStore::in_memory();
        let poisoner = store.clone();
        // Poisons the inner lock: the panic fires while the guard is held
        let _ = std::thread::spawn(move || {
            let _ = poisoner.set("bad", Exploding);
        })
        .join();

        store.set("key", 7u8).unwrap();
        assert_eq!(store.get::<u8>("key"), Some(7));
    }
}
