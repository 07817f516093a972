//! # Persistent Settings
//!
//! Small key-value store for the few values that survive a restart (today
//! only the calibrated full range-of-motion duration).
//!
//! [`FileStore`] keeps the values in a TOML file; [`MemoryStore`] is the
//! volatile stand-in used when nothing should touch the disk.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HohError, Result};

/// Persisted 32-bit settings addressed by name.
#[cfg_attr(test, mockall::automock)]
pub trait SettingStore: Send {
    /// Read `key`, `Ok(None)` when it was never written.
    fn load_u32(&self, key: &str) -> Result<Option<u32>>;

    /// Write `key`, replacing any previous value.
    fn save_u32(&mut self, key: &str, value: u32) -> Result<()>;
}

/// TOML-file backed store.
///
/// The whole file is rewritten on every save; the values change only on a
/// successful calibration so this is never on a hot path.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, u32>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let values = toml::from_str(&contents)
            .map_err(|e| HohError::Storage(format!("{}: {}", self.path.display(), e)))?;
        Ok(values)
    }
}

impl SettingStore for FileStore {
    fn load_u32(&self, key: &str) -> Result<Option<u32>> {
        Ok(self.read_all()?.get(key).copied())
    }

    fn save_u32(&mut self, key: &str, value: u32) -> Result<()> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value);

        let contents =
            toml::to_string(&values).map_err(|e| HohError::Storage(e.to_string()))?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, contents)?;

        debug!("Saved {} = {} to {}", key, value, self.path.display());
        Ok(())
    }
}

/// Volatile store, lost on exit.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, u32>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingStore for MemoryStore {
    fn load_u32(&self, key: &str) -> Result<Option<u32>> {
        Ok(self.values.get(key).copied())
    }

    fn save_u32(&mut self, key: &str, value: u32) -> Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_store_missing_file_reads_none() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("settings.toml"));
        assert_eq!(store.load_u32("DT_FULL_ROM").unwrap(), None);
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.toml");

        let mut store = FileStore::new(&path);
        store.save_u32("DT_FULL_ROM", 1_800_000).unwrap();
        store.save_u32("OTHER", 7).unwrap();

        let reopened = FileStore::new(&path);
        assert_eq!(reopened.load_u32("DT_FULL_ROM").unwrap(), Some(1_800_000));
        assert_eq!(reopened.load_u32("OTHER").unwrap(), Some(7));
    }

    #[test]
    fn test_file_store_overwrites_value() {
        let dir = TempDir::new().unwrap();
        let mut store = FileStore::new(dir.path().join("settings.toml"));
        store.save_u32("DT_FULL_ROM", 1).unwrap();
        store.save_u32("DT_FULL_ROM", 2).unwrap();
        assert_eq!(store.load_u32("DT_FULL_ROM").unwrap(), Some(2));
    }

    #[test]
    fn test_file_store_corrupt_file_is_storage_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let store = FileStore::new(&path);
        assert!(matches!(store.load_u32("DT_FULL_ROM"), Err(HohError::Storage(_))));
    }

    #[test]
    fn test_memory_store() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load_u32("k").unwrap(), None);
        store.save_u32("k", 42).unwrap();
        assert_eq!(store.load_u32("k").unwrap(), Some(42));
    }
}
