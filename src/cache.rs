//! Bounded LRU cache of active directory handles keyed by bookmark identifier.
//!
//! At most `capacity` handles hold an OS activation at any moment. A miss
//! evicts (and releases) the least-recently-used entry *before* resolving the
//! new one, so the bound holds even while resolutions are in flight. Resolver
//! I/O runs outside the table lock; a `Pending` slot keeps concurrent callers
//! for the same identifier from activating it twice.
// src/cache.rs
use crate::error::{BookmarkError, ResolveError, Result};
use crate::resolver::{Activation, DirectoryResolver};
use crate::store::RecordStore;
use crate::time_source::{RealTimeSource, SharedTimeSource};
use log::{debug, warn};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{
    Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard,
};
use std::time::{Duration, Instant};

type ActivationSlot = Option<Box<dyn Activation>>;

/// A resolved, activated directory.
///
/// Shared between the cache and in-flight operations. The activation is
/// released exactly once: by eviction, explicit release, or (as a last
/// resort) when the final reference is dropped.
#[derive(Debug)]
pub struct LiveHandle {
    identifier: String,
    path: PathBuf,
    activation: RwLock<ActivationSlot>,
}

impl LiveHandle {
    fn new(identifier: String, path: PathBuf, activation: Box<dyn Activation>) -> Self {
        Self {
            identifier,
            path,
            activation: RwLock::new(Some(activation)),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_active(&self) -> bool {
        self.read().is_some()
    }

    /// Pin the activation for the duration of an operation.
    /// None if the handle was released in the meantime.
    pub fn lease(&self) -> Option<Lease<'_>> {
        let guard = self.read();
        guard.is_some().then_some(Lease {
            path: &self.path,
            _guard: guard,
        })
    }

    /// Release the OS resource. Waits for outstanding leases.
    /// Returns false if it was already released.
    fn release(&self) -> bool {
        let activation = self.write().take();
        match activation {
            Some(activation) => {
                debug!("Releasing handle for '{}'", self.identifier);
                activation.release();
                true
            }
            None => false,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ActivationSlot> {
        self.activation.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ActivationSlot> {
        self.activation.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for LiveHandle {
    fn drop(&mut self) {
        let slot = self
            .activation
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(activation) = slot.take() {
            warn!(
                "Handle for '{}' dropped while still active, releasing",
                self.identifier
            );
            activation.release();
        }
    }
}

/// Proof that a handle's activation is held for as long as this lives
pub struct Lease<'a> {
    path: &'a Path,
    _guard: RwLockReadGuard<'a, ActivationSlot>,
}

impl Lease<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }
}

/// Counters snapshot, like `ManagerStats` for bundle loading
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub active: usize,
    pub hits: u64,
    pub misses: u64,
    pub activations: u64,
    pub evictions: u64,
    pub releases: u64,
    pub refreshes: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    activations: AtomicU64,
    evictions: AtomicU64,
    releases: AtomicU64,
    refreshes: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

struct ActiveEntry {
    handle: Arc<LiveHandle>,
    last_accessed: Instant,
    // Tie-breaker for equal timestamps: larger = more recent
    tick: u64,
}

enum Slot {
    /// Resolution in flight; counts toward capacity
    Pending,
    Active(ActiveEntry),
}

#[derive(Default)]
struct Table {
    slots: HashMap<String, Slot>,
    tick: u64,
}

impl Table {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn has_pending(&self) -> bool {
        self.slots.values().any(|s| matches!(s, Slot::Pending))
    }

    /// Least-recently-used active identifier; ties go to the older insertion
    fn lru_identifier(&self) -> Option<String> {
        self.slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Active(entry) => Some((id, entry.last_accessed, entry.tick)),
                Slot::Pending => None,
            })
            .min_by_key(|(_, at, tick)| (*at, *tick))
            .map(|(id, _, _)| id.clone())
    }

    fn take_active(&mut self, identifier: &str) -> Option<Arc<LiveHandle>> {
        match self.slots.remove(identifier)? {
            Slot::Active(entry) => Some(entry.handle),
            pending @ Slot::Pending => {
                self.slots.insert(identifier.to_string(), pending);
                None
            }
        }
    }
}

pub struct ActiveHandleCache {
    capacity: usize,
    store: Arc<dyn RecordStore>,
    resolver: Arc<dyn DirectoryResolver>,
    clock: SharedTimeSource,
    table: Mutex<Table>,
    changed: Condvar,
    counters: Counters,
}

impl ActiveHandleCache {
    pub fn new(
        capacity: usize,
        store: Arc<dyn RecordStore>,
        resolver: Arc<dyn DirectoryResolver>,
    ) -> Self {
        Self {
            capacity: capacity.max(1),
            store,
            resolver,
            clock: RealTimeSource::shared(),
            table: Mutex::new(Table::default()),
            changed: Condvar::new(),
            counters: Counters::default(),
        }
    }

    pub fn with_time_source(mut self, clock: SharedTimeSource) -> Self {
        self.clock = clock;
        self
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Table>) -> MutexGuard<'a, Table> {
        self.changed
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn release_handle(&self, handle: &LiveHandle) {
        if handle.release() {
            Counters::bump(&self.counters.releases);
        }
    }

    /// Return the live handle for `identifier`, resolving it on a miss.
    ///
    /// A hit only refreshes the entry's access time. A miss at capacity
    /// evicts the least-recently-used entry first. Failures are never
    /// cached: the next call resolves again.
    pub fn acquire(&self, identifier: &str) -> Result<Arc<LiveHandle>> {
        let mut table = self.lock();
        let victim = loop {
            let tick = table.tick + 1;
            let now = self.clock.now();
            match table.slots.get_mut(identifier) {
                Some(Slot::Active(entry)) => {
                    entry.last_accessed = now;
                    entry.tick = tick;
                    let handle = Arc::clone(&entry.handle);
                    table.tick = tick;
                    Counters::bump(&self.counters.hits);
                    debug!("Handle cache hit for '{}'", identifier);
                    return Ok(handle);
                }
                Some(Slot::Pending) => {
                    table = self.wait(table);
                    continue;
                }
                None => {}
            }

            if table.slots.len() < self.capacity {
                break None;
            }
            match table.lru_identifier() {
                Some(lru) => break table.take_active(&lru),
                // Every slot is mid-resolution; wait for one to settle
                None => table = self.wait(table),
            }
        };

        Counters::bump(&self.counters.misses);
        table.slots.insert(identifier.to_string(), Slot::Pending);
        drop(table);

        let pending = PendingSlot {
            cache: self,
            identifier,
            armed: true,
        };

        if let Some(victim) = victim {
            debug!(
                "Evicting least-recently-used handle '{}' for '{}'",
                victim.identifier(),
                identifier
            );
            Counters::bump(&self.counters.evictions);
            self.release_handle(&victim);
        }

        let record = self
            .store
            .get(identifier)?
            .ok_or_else(|| BookmarkError::BookmarkNotFound(identifier.to_string()))?;

        let resolution = self.resolver.resolve(&record).map_err(|e| {
            warn!("Failed to resolve bookmark '{}': {}", identifier, e);
            BookmarkError::resolution(identifier, e)
        })?;
        Counters::bump(&self.counters.activations);

        let handle = Arc::new(LiveHandle::new(
            identifier.to_string(),
            resolution.path,
            resolution.activation,
        ));

        if let Some(reference) = resolution.refreshed {
            let path = handle.path().to_path_buf();
            let persisted = self.store.update(identifier, &mut |r| {
                r.refresh_reference(reference.clone(), &path)
            });
            match persisted {
                Ok(true) => Counters::bump(&self.counters.refreshes),
                Ok(false) => {
                    self.release_handle(&handle);
                    return Err(BookmarkError::BookmarkNotFound(identifier.to_string()));
                }
                Err(e) => warn!(
                    "Could not persist refreshed reference for '{}': {}",
                    identifier, e
                ),
            }
        }

        pending.complete(Arc::clone(&handle));
        debug!(
            "Activated handle for '{}' at {}",
            identifier,
            handle.path().display()
        );
        Ok(handle)
    }

    /// Acquire `identifier` and run `f` with its directory pinned
    pub fn with_directory<T>(
        &self,
        identifier: &str,
        f: impl FnOnce(&Path) -> Result<T>,
    ) -> Result<T> {
        let handle = self.acquire(identifier)?;
        if let Some(lease) = handle.lease() {
            return f(lease.path());
        }

        // Evicted between acquire and lease; one fresh attempt
        debug!("Handle for '{}' released before use, reacquiring", identifier);
        let handle = self.acquire(identifier)?;
        match handle.lease() {
            Some(lease) => f(lease.path()),
            None => Err(BookmarkError::resolution(
                identifier,
                ResolveError::ActivationFailed {
                    path: handle.path().to_path_buf(),
                    source: std::io::Error::other("handle released concurrently"),
                },
            )),
        }
    }

    /// Evict and release `identifier` if it is active. No-op otherwise.
    /// Waits for an in-flight resolution of the same identifier first.
    pub fn release(&self, identifier: &str) -> bool {
        let mut table = self.lock();
        let handle = loop {
            match table.slots.get(identifier) {
                Some(Slot::Pending) => table = self.wait(table),
                Some(Slot::Active(_)) => break table.take_active(identifier),
                None => return false,
            }
        };
        drop(table);
        self.changed.notify_all();

        match handle {
            Some(handle) => {
                self.release_handle(&handle);
                true
            }
            None => false,
        }
    }

    /// Release every active handle. Safe to call repeatedly; returns how
    /// many handles this call released.
    pub fn release_all(&self) -> usize {
        let mut table = self.lock();
        while table.has_pending() {
            table = self.wait(table);
        }
        let handles: Vec<Arc<LiveHandle>> = table
            .slots
            .drain()
            .filter_map(|(_, slot)| match slot {
                Slot::Active(entry) => Some(entry.handle),
                Slot::Pending => None,
            })
            .collect();
        drop(table);
        self.changed.notify_all();

        let released = handles.len();
        for handle in handles {
            self.release_handle(&handle);
        }
        if released > 0 {
            debug!("Released {} active handles", released);
        }
        released
    }

    /// Explicitly evict entries idle for at least `max_idle`.
    /// Never triggered by `acquire`; capacity is the only implicit policy.
    pub fn sweep_idle(&self, max_idle: Duration) -> Vec<String> {
        let now = self.clock.now();
        let mut table = self.lock();
        let idle: Vec<String> = table
            .slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Active(entry)
                    if now.saturating_duration_since(entry.last_accessed) >= max_idle =>
                {
                    Some(id.clone())
                }
                _ => None,
            })
            .collect();
        let handles: Vec<Arc<LiveHandle>> =
            idle.iter().filter_map(|id| table.take_active(id)).collect();
        drop(table);
        self.changed.notify_all();

        for handle in &handles {
            Counters::bump(&self.counters.evictions);
            self.release_handle(handle);
        }
        idle
    }

    pub fn contains(&self, identifier: &str) -> bool {
        matches!(self.lock().slots.get(identifier), Some(Slot::Active(_)))
    }

    pub fn len(&self) -> usize {
        self.lock()
            .slots
            .values()
            .filter(|s| matches!(s, Slot::Active(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Active identifiers, least-recently-used first
    pub fn active_identifiers(&self) -> Vec<String> {
        let table = self.lock();
        let mut entries: Vec<(&String, Instant, u64)> = table
            .slots
            .iter()
            .filter_map(|(id, slot)| match slot {
                Slot::Active(entry) => Some((id, entry.last_accessed, entry.tick)),
                Slot::Pending => None,
            })
            .collect();
        entries.sort_by_key(|(_, at, tick)| (*at, *tick));
        entries.into_iter().map(|(id, _, _)| id.clone()).collect()
    }

    pub fn stats(&self) -> CacheStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        CacheStats {
            capacity: self.capacity,
            active: self.len(),
            hits: load(&self.counters.hits),
            misses: load(&self.counters.misses),
            activations: load(&self.counters.activations),
            evictions: load(&self.counters.evictions),
            releases: load(&self.counters.releases),
            refreshes: load(&self.counters.refreshes),
        }
    }
}

impl Drop for ActiveHandleCache {
    fn drop(&mut self) {
        self.release_all();
    }
}

/// Reservation for an in-flight resolution. Dropping it without
/// `complete` (error or panic) frees the slot and wakes waiters.
struct PendingSlot<'a> {
    cache: &'a ActiveHandleCache,
    identifier: &'a str,
    armed: bool,
}

impl PendingSlot<'_> {
    fn complete(mut self, handle: Arc<LiveHandle>) {
        let mut table = self.cache.lock();
        let tick = table.next_tick();
        table.slots.insert(
            self.identifier.to_string(),
            Slot::Active(ActiveEntry {
                handle,
                last_accessed: self.cache.clock.now(),
                tick,
            }),
        );
        self.armed = false;
        drop(table);
        self.cache.changed.notify_all();
    }
}

impl Drop for PendingSlot<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut table = self.cache.lock();
        if matches!(table.slots.get(self.identifier), Some(Slot::Pending)) {
            table.slots.remove(self.identifier);
        }
        drop(table);
        self.cache.changed.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BookmarkRecord, Metadata, OpaqueReference};
    use crate::resolver::{Resolution, ResolverKind};
    use crate::store::MemoryStore;
    use crate::time_source::TestTimeSource;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Tracked(Arc<AtomicUsize>);

    impl Activation for Tracked {
        fn release(self: Box<Self>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Resolves every record to a fake path and counts calls
    #[derive(Default)]
    struct FakeResolver {
        resolves: AtomicUsize,
        released: Arc<AtomicUsize>,
    }

    impl DirectoryResolver for FakeResolver {
        fn kind(&self) -> ResolverKind {
            ResolverKind::Path
        }

        fn mint(&self, path: &Path) -> std::result::Result<OpaqueReference, ResolveError> {
            Ok(OpaqueReference::new(path.to_string_lossy()))
        }

        fn resolve(
            &self,
            record: &BookmarkRecord,
        ) -> std::result::Result<Resolution, ResolveError> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            if record.path.ends_with("gone") {
                return Err(ResolveError::DirectoryGone(record.path.clone()));
            }
            Ok(Resolution::fresh(
                record.path.clone(),
                Box::new(Tracked(Arc::clone(&self.released))),
            ))
        }
    }

    fn setup(ids: &[&str]) -> (ActiveHandleCache, Arc<FakeResolver>, Arc<TestTimeSource>) {
        let store = Arc::new(MemoryStore::new());
        for id in ids {
            let path = format!("/fake/{id}");
            store
                .put(BookmarkRecord::new(
                    *id,
                    OpaqueReference::new(&path),
                    path,
                    chrono::Utc::now(),
                    Metadata::new(),
                ))
                .unwrap();
        }
        let resolver = Arc::new(FakeResolver::default());
        let clock = TestTimeSource::shared();
        let cache = ActiveHandleCache::new(3, store, resolver.clone())
            .with_time_source(clock.clone());
        (cache, resolver, clock)
    }

    #[test]
    fn test_hit_does_not_resolve_again() {
        let (cache, resolver, _) = setup(&["a"]);
        let first = cache.acquire("a").unwrap();
        let second = cache.acquire("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(resolver.resolves.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_eviction_releases_lru_once() {
        let (cache, resolver, clock) = setup(&["a", "b", "c", "d"]);
        for id in ["a", "b", "c"] {
            cache.acquire(id).unwrap();
            clock.advance(Duration::from_secs(1));
        }
        cache.acquire("a").unwrap();
        cache.acquire("d").unwrap();

        assert_eq!(cache.active_identifiers(), vec!["c", "a", "d"]);
        assert_eq!(resolver.released.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_equal_timestamps_evict_oldest_inserted() {
        let (cache, _, _) = setup(&["a", "b", "c", "d"]);
        for id in ["a", "b", "c", "d"] {
            cache.acquire(id).unwrap();
        }
        assert_eq!(cache.active_identifiers(), vec!["b", "c", "d"]);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let (cache, resolver, _) = setup(&["gone"]);
        for _ in 0..3 {
            let err = cache.acquire("gone").unwrap_err();
            assert_eq!(err.code(), "RESOLUTION_FAILED");
        }
        assert_eq!(resolver.resolves.load(Ordering::SeqCst), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_unknown_identifier_leaves_no_slot() {
        let (cache, resolver, _) = setup(&[]);
        let err = cache.acquire("missing").unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(resolver.resolves.load(Ordering::SeqCst), 0);
        assert!(cache.lock().slots.is_empty());
    }

    #[test]
    fn test_release_then_release_all_is_idempotent() {
        let (cache, resolver, _) = setup(&["a", "b"]);
        cache.acquire("a").unwrap();
        cache.acquire("b").unwrap();

        assert!(cache.release("a"));
        assert!(!cache.release("a"));
        assert_eq!(cache.release_all(), 1);
        assert_eq!(cache.release_all(), 0);
        assert_eq!(resolver.released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_outstanding_handle_is_not_double_released() {
        let (cache, resolver, _) = setup(&["a"]);
        let handle = cache.acquire("a").unwrap();
        assert!(cache.release("a"));
        assert!(!handle.is_active());
        assert!(handle.lease().is_none());
        drop(handle);
        drop(cache);
        assert_eq!(resolver.released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sweep_idle_only_evicts_stale_entries() {
        let (cache, _, clock) = setup(&["a", "b"]);
        cache.acquire("a").unwrap();
        clock.advance(Duration::from_secs(400));
        cache.acquire("b").unwrap();

        let swept = cache.sweep_idle(Duration::from_secs(300));
        assert_eq!(swept, vec!["a".to_string()]);
        assert_eq!(cache.active_identifiers(), vec!["b"]);
    }

    #[test]
    fn test_concurrent_acquire_same_identifier_resolves_once() {
        let (cache, resolver, _) = setup(&["a"]);
        let cache = Arc::new(cache);
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.acquire("a").map(|h| h.path().to_path_buf()))
            })
            .collect();
        for t in threads {
            assert_eq!(t.join().unwrap().unwrap(), PathBuf::from("/fake/a"));
        }
        assert_eq!(resolver.resolves.load(Ordering::SeqCst), 1);
    }
}
