// src/manager.rs
use crate::cache::{ActiveHandleCache, CacheStats};
use crate::constants;
use crate::error::{BookmarkError, ResolveError, Result};
use crate::files;
use crate::options::ManagerOptions;
use crate::record::{BookmarkRecord, Metadata};
use crate::resolver::{DirectoryResolver, ResolverKind};
use crate::store::{JsonFileStore, RecordStore};
use crate::time_source::{RealTimeSource, SharedTimeSource};
use log::{debug, info};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Entry point for bookmark, file and permission operations.
///
/// Owns the record store, the resolver and the active handle cache. Record
/// operations never touch the cache; file operations always go through it.
pub struct BookmarkManager {
    options: ManagerOptions,
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn DirectoryResolver>,
    cache: ActiveHandleCache,
    shut_down: AtomicBool,
}

impl BookmarkManager {
    /// Open the JSON record store named in `options` and build the configured resolver
    pub fn open(options: ManagerOptions) -> Result<Self> {
        let store = JsonFileStore::open(&options.store_path)?;
        let resolver = options.resolver_kind.build();
        Ok(Self::from_parts(
            Arc::new(store),
            resolver,
            options,
            RealTimeSource::shared(),
        ))
    }

    /// Assemble a manager from explicit collaborators
    pub fn from_parts(
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn DirectoryResolver>,
        options: ManagerOptions,
        clock: SharedTimeSource,
    ) -> Self {
        let cache = ActiveHandleCache::new(options.capacity, Arc::clone(&store), Arc::clone(&resolver))
            .with_time_source(clock);
        debug!(
            "Bookmark manager ready (resolver={}, capacity={}, paths={})",
            resolver.kind(),
            cache.capacity(),
            options.path_policy
        );
        Self {
            options,
            store,
            resolver,
            cache,
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn resolver_kind(&self) -> ResolverKind {
        self.resolver.kind()
    }

    // === Bookmarks ===

    /// Bookmark an existing directory under `identifier`.
    ///
    /// The path must be valid UTF-8: records and references store it as a
    /// JSON string, so other paths are rejected with `INVALID_ARGUMENT`.
    pub fn create_bookmark(
        &self,
        identifier: &str,
        path: impl AsRef<Path>,
        metadata: Option<Metadata>,
    ) -> Result<String> {
        validate_identifier(identifier)?;
        let path = std::path::absolute(path.as_ref())
            .map_err(|_| BookmarkError::DirectoryNotFound(path.as_ref().to_path_buf()))?;

        if path.to_str().is_none() {
            return Err(BookmarkError::InvalidArgument(format!(
                "directory path is not valid UTF-8: {}",
                path.display()
            )));
        }
        if !path.is_dir() {
            return Err(BookmarkError::DirectoryNotFound(path));
        }
        if self.store.exists(identifier)? {
            return Err(BookmarkError::BookmarkAlreadyExists(identifier.to_string()));
        }

        let reference = self.resolver.mint(&path).map_err(|e| match e {
            ResolveError::DirectoryGone(p) => BookmarkError::DirectoryNotFound(p),
            other => BookmarkError::resolution(identifier, other),
        })?;

        let record = BookmarkRecord::new(
            identifier,
            reference,
            path,
            constants::now_utc(),
            metadata.unwrap_or_default(),
        );
        let path_display = record.path.display().to_string();

        // Another writer may have taken the identifier since the check above
        if !self.store.insert_new(record)? {
            return Err(BookmarkError::BookmarkAlreadyExists(identifier.to_string()));
        }

        info!("Created bookmark '{}' -> {}", identifier, path_display);
        Ok(identifier.to_string())
    }

    pub fn list_bookmarks(&self) -> Result<Vec<BookmarkRecord>> {
        self.store.list()
    }

    pub fn get_bookmark(&self, identifier: &str) -> Result<Option<BookmarkRecord>> {
        validate_identifier(identifier)?;
        self.store.get(identifier)
    }

    pub fn bookmark_exists(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        self.store.exists(identifier)
    }

    /// Release any active handle, then remove the record.
    /// Returns false if there was no such bookmark.
    pub fn delete_bookmark(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        if !self.store.exists(identifier)? {
            return Ok(false);
        }

        self.cache.release(identifier);
        let deleted = self.store.delete(identifier)?;
        // An acquire racing this delete may have re-activated the handle
        self.cache.release(identifier);

        if deleted {
            info!("Deleted bookmark '{}'", identifier);
        }
        Ok(deleted)
    }

    /// Replace the metadata wholesale. Never re-resolves.
    pub fn update_bookmark_metadata(&self, identifier: &str, metadata: Metadata) -> Result<bool> {
        validate_identifier(identifier)?;
        let mut metadata = Some(metadata);
        let updated = self.store.update(identifier, &mut |record| {
            if let Some(m) = metadata.take() {
                record.metadata = m;
            }
        })?;
        if updated {
            debug!("Updated metadata for '{}'", identifier);
        }
        Ok(updated)
    }

    /// Resolve the bookmark's directory, refreshing a stale reference.
    ///
    /// Returns the current record when the directory is reachable and None
    /// when it is not. An unknown identifier is still an error.
    pub fn resolve_bookmark(&self, identifier: &str) -> Result<Option<BookmarkRecord>> {
        validate_identifier(identifier)?;
        match self.cache.acquire(identifier) {
            Ok(_) => self.store.get(identifier),
            Err(BookmarkError::ResolutionFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    // === Files ===

    pub fn save_file(&self, identifier: &str, file_name: &str, data: &[u8]) -> Result<()> {
        self.validate_file_args(identifier, file_name)?;
        self.cache
            .with_directory(identifier, |dir| files::save(dir, file_name, data))?;
        debug!("Saved {} bytes to '{}'/{}", data.len(), identifier, file_name);
        Ok(())
    }

    /// File contents, or None if the file does not exist
    pub fn read_file(&self, identifier: &str, file_name: &str) -> Result<Option<Vec<u8>>> {
        self.validate_file_args(identifier, file_name)?;
        self.cache
            .with_directory(identifier, |dir| files::read(dir, file_name))
    }

    pub fn list_files(&self, identifier: &str) -> Result<Vec<String>> {
        validate_identifier(identifier)?;
        self.cache.with_directory(identifier, files::list)
    }

    pub fn delete_file(&self, identifier: &str, file_name: &str) -> Result<bool> {
        self.validate_file_args(identifier, file_name)?;
        self.cache
            .with_directory(identifier, |dir| files::delete(dir, file_name))
    }

    pub fn file_exists(&self, identifier: &str, file_name: &str) -> Result<bool> {
        self.validate_file_args(identifier, file_name)?;
        self.cache
            .with_directory(identifier, |dir| Ok(files::exists(dir, file_name)))
    }

    fn validate_file_args(&self, identifier: &str, file_name: &str) -> Result<()> {
        validate_identifier(identifier)?;
        files::validate_file_name(file_name, self.options.path_policy)
    }

    // === Permissions ===

    pub fn has_write_permission(&self, identifier: &str) -> Result<bool> {
        validate_identifier(identifier)?;
        self.cache
            .with_directory(identifier, |dir| Ok(files::has_write_permission(dir)))
    }

    /// There is no runtime permission prompt here, so this only reports
    /// the current state
    pub fn request_write_permission(&self, identifier: &str) -> Result<bool> {
        self.has_write_permission(identifier)
    }

    // === Cache ===

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Identifiers currently holding an active handle, least-recently-used first
    pub fn active_identifiers(&self) -> Vec<String> {
        self.cache.active_identifiers()
    }

    /// Release handles idle longer than the configured idle timeout
    pub fn sweep_idle(&self) -> Vec<String> {
        let swept = self.cache.sweep_idle(self.options.idle_timeout);
        if !swept.is_empty() {
            debug!("Swept {} idle handles", swept.len());
        }
        swept
    }

    /// Release every active handle. Only the first call does any work.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let released = self.cache.release_all();
        debug!("Shutdown released {} handles", released);
        released
    }
}

impl Drop for BookmarkManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.trim().is_empty() {
        return Err(BookmarkError::InvalidArgument(
            "bookmark identifier is empty".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ManagerOptionsBuilder;
    use crate::resolver::PathResolver;
    use crate::store::MemoryStore;
    use crate::time_source::TestTimeSource;
    use serde_json::json;
    use tempfile::TempDir;

    fn manager() -> BookmarkManager {
        let options = ManagerOptionsBuilder::new().capacity(2).build();
        BookmarkManager::from_parts(
            Arc::new(MemoryStore::new()),
            Arc::new(PathResolver),
            options,
            TestTimeSource::shared(),
        )
    }

    #[test]
    fn test_empty_identifier_is_rejected_before_store() {
        let m = manager();
        let err = m.get_bookmark("  ").unwrap_err();
        assert_eq!(err.code(), "INVALID_ARGUMENT");
        assert_eq!(m.cache_stats().misses, 0);
    }

    #[test]
    fn test_create_rejects_file_path() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("f");
        std::fs::write(&file, b"").unwrap();
        let err = manager().create_bookmark("f", &file, None).unwrap_err();
        assert_eq!(err.code(), "DIRECTORY_NOT_FOUND");
    }

    #[test]
    fn test_metadata_update_replaces_wholesale() {
        let temp = TempDir::new().unwrap();
        let m = manager();
        let mut meta = Metadata::new();
        meta.insert("a".into(), json!(1));
        meta.insert("b".into(), json!(2));
        m.create_bookmark("x", temp.path(), Some(meta)).unwrap();

        let mut replacement = Metadata::new();
        replacement.insert("c".into(), json!(3));
        assert!(m.update_bookmark_metadata("x", replacement.clone()).unwrap());
        assert!(!m.update_bookmark_metadata("nope", Metadata::new()).unwrap());

        let record = m.get_bookmark("x").unwrap().unwrap();
        assert_eq!(record.metadata, replacement);
        assert_eq!(m.cache_stats().misses, 0);
    }

    #[test]
    fn test_resolve_bookmark_vanished_directory_is_none() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("d");
        std::fs::create_dir(&dir).unwrap();
        let m = manager();
        m.create_bookmark("d", &dir, None).unwrap();
        assert!(m.resolve_bookmark("d").unwrap().is_some());

        m.delete_bookmark("d").unwrap();
        m.create_bookmark("d", &dir, None).unwrap();
        std::fs::remove_dir(&dir).unwrap();
        assert!(m.resolve_bookmark("d").unwrap().is_none());
        assert!(m.resolve_bookmark("other").unwrap_err().is_not_found());
    }

    #[test]
    fn test_shutdown_runs_once() {
        let temp = TempDir::new().unwrap();
        let m = manager();
        m.create_bookmark("t", temp.path(), None).unwrap();
        m.file_exists("t", "x").unwrap();
        assert_eq!(m.shutdown(), 1);
        assert_eq!(m.shutdown(), 0);
    }
}
