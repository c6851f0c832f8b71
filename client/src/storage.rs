//! Raw key/value storage areas underneath the secure store.
//!
//! The secure store uses two: a persistent local area for the encryption key and a
//! volatile session area for items, cleared when the browsing session ends.

use crate::error::StoreError;
use base64::Engine;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

pub trait StorageArea: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-lifetime area.
#[derive(Debug, Default)]
pub struct MemoryArea {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryArea {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl StorageArea for MemoryArea {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.items.lock().map_err(|_| StoreError::Poisoned)?.get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        self.items.lock().map_err(|_| StoreError::Poisoned)?.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.items.lock().map_err(|_| StoreError::Poisoned)?.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.items.lock().map_err(|_| StoreError::Poisoned)?.clear();
        Ok(())
    }
}

/// Area persisted as a JSON object of base64 values in one file.
///
/// Meant for the installation-scoped local area. Every call reads and rewrites the file
/// under a process-local lock; two processes sharing the file may race.
#[derive(Debug)]
pub struct FileArea {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileArea {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, map: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec(map).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl StorageArea for FileArea {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let Some(encoded) = self.load()?.remove(key) else {
            return Ok(None);
        };
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map(Some)
            .map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.load()?;
        map.insert(key.to_string(), base64::engine::general_purpose::STANDARD.encode(value));
        self.save(&map)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut map = self.load()?;
        if map.remove(key).is_some() {
            self.save(&map)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        self.save(&HashMap::new())
    }
}
