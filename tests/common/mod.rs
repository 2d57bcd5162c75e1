#![allow(dead_code)]

use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use dirmark::{
    Activation, BookmarkManager, BookmarkRecord, DirectoryResolver, ManagerOptionsBuilder,
    MemoryStore, OpaqueReference, PathResolver, RecordStore, ResolveError, Resolution,
    ResolverKind, SharedTimeSource, TestTimeSource,
};

pub fn setup_temp_dir() -> Result<TempDir> {
    tempfile::tempdir().map_err(anyhow::Error::from)
}

/// Create `names` as subdirectories of `root`
pub fn make_dirs(root: &Path, names: &[&str]) -> Result<Vec<PathBuf>> {
    names
        .iter()
        .map(|name| {
            let dir = root.join(name);
            std::fs::create_dir_all(&dir)?;
            Ok(dir)
        })
        .collect()
}

#[derive(Default)]
struct Counters {
    resolves: AtomicUsize,
    releases: AtomicUsize,
    live: AtomicUsize,
    max_live: AtomicUsize,
    released_ids: Mutex<Vec<String>>,
}

/// Path resolver that counts every resolution and every release, and
/// tracks the peak number of simultaneously live activations
#[derive(Default, Clone)]
pub struct CountingResolver {
    counters: Arc<Counters>,
}

#[derive(Debug)]
struct CountedActivation {
    identifier: String,
    counters: Arc<Counters>,
}

impl std::fmt::Debug for Counters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counters")
            .field("live", &self.live.load(Ordering::SeqCst))
            .finish()
    }
}

impl Activation for CountedActivation {
    fn release(self: Box<Self>) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
        self.counters.releases.fetch_add(1, Ordering::SeqCst);
        self.counters
            .released_ids
            .lock()
            .unwrap()
            .push(self.identifier.clone());
    }
}

impl CountingResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolves(&self) -> usize {
        self.counters.resolves.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }

    pub fn released_ids(&self) -> Vec<String> {
        self.counters.released_ids.lock().unwrap().clone()
    }
}

impl DirectoryResolver for CountingResolver {
    fn kind(&self) -> ResolverKind {
        ResolverKind::Path
    }

    fn mint(&self, path: &Path) -> Result<OpaqueReference, ResolveError> {
        PathResolver.mint(path)
    }

    fn resolve(&self, record: &BookmarkRecord) -> Result<Resolution, ResolveError> {
        self.counters.resolves.fetch_add(1, Ordering::SeqCst);
        let resolution = PathResolver.resolve(record)?;
        resolution.activation.release();

        let live = self.counters.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);

        Ok(Resolution {
            path: resolution.path,
            activation: Box::new(CountedActivation {
                identifier: record.identifier.clone(),
                counters: Arc::clone(&self.counters),
            }),
            refreshed: resolution.refreshed,
        })
    }
}

/// In-memory manager wired to a counting resolver and a manual clock
pub fn counting_manager(
    capacity: usize,
) -> (BookmarkManager, CountingResolver, Arc<TestTimeSource>) {
    let resolver = CountingResolver::new();
    let clock = TestTimeSource::shared();
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let time: SharedTimeSource = clock.clone();
    let manager = BookmarkManager::from_parts(
        store,
        Arc::new(resolver.clone()),
        ManagerOptionsBuilder::new().capacity(capacity).build(),
        time,
    );
    (manager, resolver, clock)
}

/// File-backed manager using the given resolver kind
pub fn file_manager(store_path: &Path, kind: ResolverKind) -> Result<BookmarkManager> {
    let options = ManagerOptionsBuilder::new()
        .store_path(store_path)
        .resolver_kind(kind)
        .build();
    Ok(BookmarkManager::open(options)?)
}
