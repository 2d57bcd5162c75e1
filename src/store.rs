//! Durable identifier → record mapping: the `RecordStore` trait, an in-memory store,
//! and a JSON file store written atomically via temp-file + rename
// src/store.rs
use crate::constants;
use crate::error::{BookmarkError, Result};
use crate::record::BookmarkRecord;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Keyed persistence for bookmark records.
///
/// Implementations serialize their own mutations; callers never hold a
/// store lock across calls.
pub trait RecordStore: Send + Sync {
    fn get(&self, identifier: &str) -> Result<Option<BookmarkRecord>>;

    /// Insert or overwrite a record
    fn put(&self, record: BookmarkRecord) -> Result<()>;

    /// Insert only if the identifier is free. Returns false if it was taken.
    fn insert_new(&self, record: BookmarkRecord) -> Result<bool>;

    /// Apply `f` to the stored record in place and persist it.
    /// Returns false (without calling `f`) if the identifier is unknown.
    fn update(&self, identifier: &str, f: &mut dyn FnMut(&mut BookmarkRecord)) -> Result<bool>;

    /// Remove a record. Returns false if it did not exist.
    fn delete(&self, identifier: &str) -> Result<bool>;

    /// All records, ordered by identifier
    fn list(&self) -> Result<Vec<BookmarkRecord>>;

    fn exists(&self, identifier: &str) -> Result<bool> {
        Ok(self.get(identifier)?.is_some())
    }
}

type RecordMap = BTreeMap<String, BookmarkRecord>;

fn lock(map: &Mutex<RecordMap>) -> MutexGuard<'_, RecordMap> {
    map.lock().unwrap_or_else(PoisonError::into_inner)
}

// ============================================================================
// In-memory store
// ============================================================================

/// Non-durable store, handy for embedding and tests
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<RecordMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, identifier: &str) -> Result<Option<BookmarkRecord>> {
        Ok(lock(&self.records).get(identifier).cloned())
    }

    fn put(&self, record: BookmarkRecord) -> Result<()> {
        lock(&self.records).insert(record.identifier.clone(), record);
        Ok(())
    }

    fn insert_new(&self, record: BookmarkRecord) -> Result<bool> {
        let mut records = lock(&self.records);
        if records.contains_key(&record.identifier) {
            return Ok(false);
        }
        records.insert(record.identifier.clone(), record);
        Ok(true)
    }

    fn update(&self, identifier: &str, f: &mut dyn FnMut(&mut BookmarkRecord)) -> Result<bool> {
        match lock(&self.records).get_mut(identifier) {
            Some(record) => {
                f(record);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete(&self, identifier: &str) -> Result<bool> {
        Ok(lock(&self.records).remove(identifier).is_some())
    }

    fn list(&self) -> Result<Vec<BookmarkRecord>> {
        Ok(lock(&self.records).values().cloned().collect())
    }
}

// ============================================================================
// JSON file store
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: u32,
    #[serde(default)]
    bookmarks: RecordMap,
}

/// Store backed by a single JSON document.
///
/// The whole map is loaded on open and rewritten on every mutation
/// (write to `<file>.tmp`, then rename over the original).
pub struct JsonFileStore {
    path: PathBuf,
    records: Mutex<RecordMap>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let records = Self::load(&path)?;
        debug!(
            "Opened record store {} ({} bookmarks)",
            path.display(),
            records.len()
        );
        Ok(Self {
            path,
            records: Mutex::new(records),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<RecordMap> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(RecordMap::new()),
            Err(e) => return Err(e.into()),
        };

        let file: StoreFile = serde_json::from_slice(&data).map_err(|e| {
            BookmarkError::Store(format!("failed to parse {}: {}", path.display(), e))
        })?;

        if file.version > constants::STORE_FORMAT_VERSION {
            return Err(BookmarkError::Store(format!(
                "{} has unsupported format version {} (expected <= {})",
                path.display(),
                file.version,
                constants::STORE_FORMAT_VERSION
            )));
        }

        // The map key is authoritative
        let mut records = file.bookmarks;
        for (key, record) in records.iter_mut() {
            if record.identifier != *key {
                record.identifier = key.clone();
            }
        }

        Ok(records)
    }

    /// Save the map to disk atomically
    fn save(&self, records: &RecordMap) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let file = StoreFile {
            version: constants::STORE_FORMAT_VERSION,
            bookmarks: records.clone(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        let mut temp_name = self.path.as_os_str().to_owned();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, json)?;
        if let Err(e) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }
        Ok(())
    }

    /// Mutate a copy, persist it, then commit it in memory
    fn mutate<T>(&self, f: impl FnOnce(&mut RecordMap) -> (T, bool)) -> Result<T> {
        let mut records = lock(&self.records);
        let mut next = records.clone();
        let (out, changed) = f(&mut next);
        if changed {
            self.save(&next)?;
            *records = next;
        }
        Ok(out)
    }
}

impl RecordStore for JsonFileStore {
    fn get(&self, identifier: &str) -> Result<Option<BookmarkRecord>> {
        Ok(lock(&self.records).get(identifier).cloned())
    }

    fn put(&self, record: BookmarkRecord) -> Result<()> {
        self.mutate(|records| {
            records.insert(record.identifier.clone(), record);
            ((), true)
        })
    }

    fn insert_new(&self, record: BookmarkRecord) -> Result<bool> {
        self.mutate(|records| {
            if records.contains_key(&record.identifier) {
                return (false, false);
            }
            records.insert(record.identifier.clone(), record);
            (true, true)
        })
    }

    fn update(&self, identifier: &str, f: &mut dyn FnMut(&mut BookmarkRecord)) -> Result<bool> {
        self.mutate(|records| match records.get_mut(identifier) {
            Some(record) => {
                f(record);
                (true, true)
            }
            None => (false, false),
        })
    }

    fn delete(&self, identifier: &str) -> Result<bool> {
        self.mutate(|records| {
            let removed = records.remove(identifier).is_some();
            (removed, removed)
        })
    }

    fn list(&self) -> Result<Vec<BookmarkRecord>> {
        Ok(lock(&self.records).values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Metadata, OpaqueReference};
    use serde_json::json;
    use tempfile::TempDir;

    fn record(id: &str) -> BookmarkRecord {
        BookmarkRecord::new(
            id,
            OpaqueReference::new(format!("/data/{id}")),
            format!("/data/{id}"),
            constants::now_utc(),
            Metadata::new(),
        )
    }

    #[test]
    fn test_memory_store_insert_new_rejects_duplicate() {
        let store = MemoryStore::new();
        assert!(store.insert_new(record("a")).unwrap());
        assert!(!store.insert_new(record("a")).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_memory_store_update_unknown_does_not_call_closure() {
        let store = MemoryStore::new();
        let mut called = false;
        let updated = store.update("nope", &mut |_| called = true).unwrap();
        assert!(!updated);
        assert!(!called);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = JsonFileStore::open(temp.path().join("none.json")).unwrap();
        assert!(store.list().unwrap().is_empty());
        assert!(!store.exists("a").unwrap());
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("bookmarks.json");

        let store = JsonFileStore::open(&path).unwrap();
        let mut rec = record("docs");
        rec.metadata.insert("color".into(), json!("blue"));
        assert!(store.insert_new(rec.clone()).unwrap());
        store.put(record("music")).unwrap();
        assert!(store.delete("music").unwrap());
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let loaded = reopened.get("docs").unwrap().unwrap();
        assert_eq!(loaded, rec);
        assert!(reopened.get("music").unwrap().is_none());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["bookmarks"]["docs"]["metadata"]["color"], "blue");
        assert!(!temp.path().join("nested").join("bookmarks.json.tmp").exists());
    }

    #[test]
    fn test_file_store_update_persists_in_place() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bookmarks.json");
        let store = JsonFileStore::open(&path).unwrap();
        store.put(record("a")).unwrap();

        let updated = store
            .update("a", &mut |r| {
                r.metadata.insert("k".into(), json!(1));
            })
            .unwrap();
        assert!(updated);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get("a").unwrap().unwrap().metadata["k"], 1);
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bookmarks.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonFileStore::open(&path).err().unwrap();
        assert_eq!(err.code(), "STORE_ERROR");
    }

    #[test]
    fn test_file_store_map_key_wins_over_embedded_identifier() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bookmarks.json");
        let doc = json!({
            "version": 1,
            "bookmarks": {
                "real": {
                    "identifier": "stale",
                    "opaqueReference": "/x",
                    "path": "/x",
                    "createdAt": "2024-01-01T00:00:00Z"
                }
            }
        });
        fs::write(&path, doc.to_string()).unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert_eq!(store.get("real").unwrap().unwrap().identifier, "real");
    }
}
