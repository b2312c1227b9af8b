use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::modules::error::{NavError, Result};

/// Bumped whenever a persisted value type changes shape.
pub const SCHEMA_VERSION: u32 = 1;

/// Durable key-value storage surviving across ticks.
pub trait Storage<V> {
    fn get(&self, key: &str) -> Option<&V>;

    fn get_mut(&mut self, key: &str) -> Option<&mut V>;

    fn set(&mut self, key: String, value: V) -> Option<V>;

    fn delete(&mut self, key: &str) -> Option<V>;

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &V)> + '_>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn keys(&self) -> Vec<String> {
        self.iter().map(|(k, _)| k.to_string()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStorage<V> {
    schema_version: u32,
    entries: BTreeMap<String, V>,
}

impl<V> Default for MemoryStorage<V> {
    fn default() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl<V> MemoryStorage<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<V> Storage<V> for MemoryStorage<V> {
    fn get(&self, key: &str) -> Option<&V> {
        self.entries.get(key)
    }

    fn get_mut(&mut self, key: &str) -> Option<&mut V> {
        self.entries.get_mut(key)
    }

    fn set(&mut self, key: String, value: V) -> Option<V> {
        self.entries.insert(key, value)
    }

    fn delete(&mut self, key: &str) -> Option<V> {
        self.entries.remove(key)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = (&str, &V)> + '_> {
        Box::new(self.entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<V: Serialize + DeserializeOwned> MemoryStorage<V> {
    pub fn load_json(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let bytes = fs::read(path)?;
        if bytes.is_empty() {
            return Ok(Self::default());
        }

        let storage: Self = serde_json::from_slice(&bytes).map_err(|e| {
            NavError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!(
                    "failed to parse store {}; delete it to reset: {}",
                    path.display(),
                    e
                ),
            ))
        })?;

        if storage.schema_version != SCHEMA_VERSION {
            return Err(NavError::SchemaMismatch {
                path: path.display().to_string(),
                found: storage.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        Ok(storage)
    }

    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

pub fn store_dir() -> PathBuf {
    PathBuf::from(".waypath")
}

pub fn paths_file_path() -> PathBuf {
    store_dir().join("paths.json")
}

pub fn agents_file_path() -> PathBuf {
    store_dir().join("agents.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_delete() {
        let mut storage: MemoryStorage<u32> = MemoryStorage::new();
        assert!(storage.is_empty());
        assert_eq!(storage.set("a".into(), 1), None);
        assert_eq!(storage.set("a".into(), 2), Some(1));
        *storage.get_mut("a").unwrap() += 1;
        assert_eq!(storage.get("a"), Some(&3));
        assert_eq!(storage.delete("a"), Some(3));
        assert_eq!(storage.delete("a"), None);
    }

    #[test]
    fn json_file_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut storage: MemoryStorage<Vec<u8>> = MemoryStorage::new();
        storage.set("x".into(), vec![1, 2, 3]);
        storage.save_json(&path).unwrap();

        let loaded: MemoryStorage<Vec<u8>> = MemoryStorage::load_json(&path).unwrap();
        assert_eq!(loaded, storage);
        assert_eq!(loaded.keys(), vec!["x".to_string()]);
    }

    #[test]
    fn unknown_schema_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, br#"{ "schema_version": 99, "entries": {} }"#).unwrap();

        let err = MemoryStorage::<u8>::load_json(&path).unwrap_err();
        assert_eq!(err.code(), "schema_mismatch");
    }

    #[test]
    fn missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MemoryStorage::<u8>::load_json(&dir.path().join("none.json")).unwrap();
        assert!(storage.is_empty());
    }
}
