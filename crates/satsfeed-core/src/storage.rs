//! Durable key-value storage behind the TTL cache.

use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage quota of {quota} bytes exceeded (needed {needed})")]
    QuotaExceeded { quota: usize, needed: usize },
    #[error("storage i/o failed for '{key}': {message}")]
    Io { key: String, message: String },
}

/// String-keyed, string-valued storage. Writes may fail; the cache treats
/// failures as "nothing stored".
pub trait KeyValueStore: Send + Sync + Debug {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
}

/// In-process store with an optional byte quota over all keys and values.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota_bytes: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota_bytes: Some(quota_bytes),
        }
    }

    /// Raw write that bypasses the quota; lets tests plant corrupt entries.
    pub fn insert_raw(&self, key: impl Into<String>, value: impl Into<String>) {
        self.lock().insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().expect("memory store lock is not poisoned")
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.lock();
        if let Some(quota) = self.quota_bytes {
            let others: usize = entries
                .iter()
                .filter(|(existing, _)| existing.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { quota, needed });
            }
        }
        entries.insert(key.to_owned(), value);
        Ok(())
    }
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// One JSON file per key in a directory; survives restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) the storage directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StorageError::Io {
            key: dir.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Percent-encodes the key so distinct keys never share a file.
    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Per-write staging file, so concurrent writers never rename each other's data.
    fn staging_for(&self, path: &Path) -> PathBuf {
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        let mut name = path.file_name().map(|name| name.to_os_string()).unwrap_or_default();
        name.push(format!(".{}.{seq}.tmp", std::process::id()));
        path.with_file_name(name)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io {
                key: key.to_owned(),
                message: e.to_string(),
            }),
        }
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let staging = self.staging_for(&path);
        let io_error = |e: std::io::Error| StorageError::Io {
            key: key.to_owned(),
            message: e.to_string(),
        };

        // Rename keeps readers from ever seeing a half-written entry.
        fs::write(&staging, value).map_err(io_error)?;
        if let Err(error) = fs::rename(&staging, &path) {
            let _ = fs::remove_file(&staging);
            return Err(io_error(error));
        }
        debug!(key, path = %path.display(), "persisted cache entry");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_last_write_wins() {
        let store = MemoryStore::new();
        store.set("k", String::from("1")).expect("write");
        store.set("k", String::from("2")).expect("write");

        assert_eq!(store.get("k"), Ok(Some(String::from("2"))));
        assert_eq!(store.get("missing"), Ok(None));
    }

    #[test]
    fn memory_store_enforces_quota() {
        let store = MemoryStore::with_quota(8);
        store.set("a", String::from("1234")).expect("fits");

        let error = store.set("b", String::from("123456")).expect_err("over quota");

        assert!(matches!(error, StorageError::QuotaExceeded { quota: 8, .. }));
        assert_eq!(store.get("a"), Ok(Some(String::from("1234"))));
        assert_eq!(store.get("b"), Ok(None));
    }

    #[test]
    fn memory_store_quota_counts_replaced_value_once() {
        let store = MemoryStore::with_quota(6);
        store.set("a", String::from("12345")).expect("fits");
        store.set("a", String::from("54321")).expect("replacement fits");
    }

    #[test]
    fn file_store_round_trips_and_sanitizes_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path().join("cache")).expect("open");

        store
            .set("history:max", String::from(r#"{"value":1}"#))
            .expect("write");

        assert_eq!(
            store.get("history:max"),
            Ok(Some(String::from(r#"{"value":1}"#)))
        );
        assert!(dir.path().join("cache").join("history%3Amax.json").exists());
        assert_eq!(store.get("history:30"), Ok(None));
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        FileStore::open(dir.path())
            .expect("open")
            .set("snapshot", String::from("{}"))
            .expect("write");

        let reopened = FileStore::open(dir.path()).expect("reopen");

        assert_eq!(reopened.get("snapshot"), Ok(Some(String::from("{}"))));
    }

    #[test]
    fn file_store_keeps_similar_keys_apart() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        store.set("a:b", String::from("colon")).expect("write");
        store.set("a_b", String::from("underscore")).expect("write");
        store.set("a/b", String::from("slash")).expect("write");

        assert_eq!(store.get("a:b"), Ok(Some(String::from("colon"))));
        assert_eq!(store.get("a_b"), Ok(Some(String::from("underscore"))));
        assert_eq!(store.get("a/b"), Ok(Some(String::from("slash"))));
        assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 3);
    }

    #[test]
    fn file_store_concurrent_writes_to_one_key_all_succeed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileStore::open(dir.path()).expect("open");

        std::thread::scope(|scope| {
            for writer in 0..8 {
                let store = &store;
                scope.spawn(move || {
                    for round in 0..25 {
                        store
                            .set("btc:snapshot", format!("{writer}-{round}"))
                            .expect("concurrent write");
                    }
                });
            }
        });

        let stored = store.get("btc:snapshot").expect("read").expect("present");
        assert!(stored.ends_with("-24"));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .expect("list")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
