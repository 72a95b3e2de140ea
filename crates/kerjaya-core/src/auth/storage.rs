//! Key/value persistence media for the session record.
//!
//! `Storage` mirrors the browser-style get/set/remove API: string keys mapped
//! to string values, surviving a restart when backed by `FileStorage`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tracing::debug;

use super::StorageError;

pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrites any existing value for `key`.
    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key succeeds.
    fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// One file per key inside a directory.
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn item_path(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.item_path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        std::fs::create_dir_all(&self.dir)?;
        // Write beside the target then rename, so readers never see half a value
        let tmp = self.dir.join(format!(".{}.tmp", key));
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, self.item_path(key))?;
        debug!(key, dir = %self.dir.display(), "Stored item");
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match std::fs::remove_file(self.item_path(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process storage, lost on restart. Can be switched off to behave like a
/// disabled or full medium.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
    unavailable: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `false`, every write and removal fails with `StorageError::Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("storage is disabled".to_string()));
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.check_available()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        std::env::temp_dir().join(format!("kerjaya-{}-{}-{}", name, std::process::id(), nanos))
    }

    #[test]
    fn test_file_storage_set_get_remove() {
        let dir = scratch_dir("file-storage");
        let storage = FileStorage::new(dir.clone());

        assert_eq!(storage.get_item("token").unwrap(), None);
        storage.set_item("token", "abc").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("abc"));

        storage.set_item("token", "def").unwrap();
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("def"));

        storage.remove_item("token").unwrap();
        assert_eq!(storage.get_item("token").unwrap(), None);
        // Second removal is still fine
        storage.remove_item("token").unwrap();

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_file_storage_survives_new_instance() {
        let dir = scratch_dir("file-reload");
        FileStorage::new(dir.clone()).set_item("user", "{\"username\":\"ada\"}").unwrap();

        let reopened = FileStorage::new(dir.clone());
        assert_eq!(
            reopened.get_item("user").unwrap().as_deref(),
            Some("{\"username\":\"ada\"}")
        );

        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn test_memory_storage_unavailable_rejects_writes() {
        let storage = MemoryStorage::new();
        storage.set_item("token", "abc").unwrap();

        storage.set_available(false);
        assert!(matches!(
            storage.set_item("token", "xyz"),
            Err(StorageError::Unavailable(_))
        ));
        assert!(storage.remove_item("token").is_err());
        // Reads still see the last good value
        assert_eq!(storage.get_item("token").unwrap().as_deref(), Some("abc"));

        storage.set_available(true);
        storage.remove_item("token").unwrap();
        assert!(storage.is_empty());
    }
}
