//! Persisted key-value backends.
//!
//! Two scopes exist: [`MemoryStore`] lives as long as the process (the
//! "this session only" scope) and [`FileStore`] survives restarts (the
//! shared scope). Values are opaque strings; callers own the encoding.

use crate::error::{CoreError, CoreResult};
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> CoreResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> CoreResult<()>;
    fn remove(&self, key: &str) -> CoreResult<()>;
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        self.entries().remove(key);
        Ok(())
    }
}

/// One file per key under `root`.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: PathBuf) -> CoreResult<Self> {
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root_dir(&self) -> &PathBuf {
        &self.root
    }

    fn path_for(&self, key: &str) -> CoreResult<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(CoreError::Storage {
                key: key.to_string(),
                reason: "key must be non-empty ascii alphanumerics, `_` or `-`".to_string(),
            });
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> CoreResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> CoreResult<()> {
        let path = self.path_for(key)?;
        fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CoreResult<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip_and_remove() {
        let store = MemoryStore::new();
        assert_eq!(store.get("user").unwrap(), None);

        store.set("user", "{}").unwrap();
        assert_eq!(store.get("user").unwrap().as_deref(), Some("{}"));

        store.remove("user").unwrap();
        store.remove("user").unwrap();
        assert_eq!(store.get("user").unwrap(), None);
    }

    #[test]
    fn memory_store_clones_share_state() {
        let a = MemoryStore::new();
        let b = a.clone();
        a.set("k", "v").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("shared");

        FileStore::new(root.clone())
            .unwrap()
            .set("activeUsers", "[]")
            .unwrap();

        let reopened = FileStore::new(root).unwrap();
        assert_eq!(reopened.get("activeUsers").unwrap().as_deref(), Some("[]"));
    }

    #[test]
    fn file_store_missing_key_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(store.get("nothing").unwrap(), None);
        store.remove("nothing").unwrap();
    }

    #[test]
    fn file_store_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(
            store.set("../escape", "x"),
            Err(CoreError::Storage { .. })
        ));
    }
}
