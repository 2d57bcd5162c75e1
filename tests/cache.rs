mod common;

use anyhow::Result;
use dirmark::{ActiveHandleCache, BookmarkRecord, MemoryStore, OpaqueReference, RecordStore};
use proptest::prelude::*;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn cache_over(
    root: &Path,
    ids: &[&str],
    capacity: usize,
) -> Result<(ActiveHandleCache, common::CountingResolver, Arc<dirmark::TestTimeSource>)> {
    let dirs = common::make_dirs(root, ids)?;
    let store = Arc::new(MemoryStore::new());
    for (id, dir) in ids.iter().zip(&dirs) {
        store.put(BookmarkRecord::new(
            *id,
            OpaqueReference::new(dir.to_string_lossy()),
            dir,
            dirmark::constants::now_utc(),
            Default::default(),
        ))?;
    }
    let resolver = common::CountingResolver::new();
    let clock = dirmark::TestTimeSource::shared();
    let cache = ActiveHandleCache::new(capacity, store, Arc::new(resolver.clone()))
        .with_time_source(clock.clone());
    Ok((cache, resolver, clock))
}

#[test]
fn test_lru_scenario_with_capacity_five() -> Result<()> {
    let temp = common::setup_temp_dir()?;
    let ids = ["b1", "b2", "b3", "b4", "b5", "b6", "b7"];
    let (cache, resolver, clock) = cache_over(temp.path(), &ids, 5)?;

    let tick = || clock.advance(Duration::from_millis(10));

    for id in &ids[..5] {
        cache.acquire(id)?;
        tick();
    }
    assert_eq!(cache.len(), 5);
    assert_eq!(resolver.releases(), 0);

    cache.acquire("b6")?;
    tick();
    assert_eq!(cache.active_identifiers(), vec!["b2", "b3", "b4", "b5", "b6"]);
    assert_eq!(resolver.released_ids(), vec!["b1"]);

    // Hit: no eviction, no resolution
    let resolves = resolver.resolves();
    cache.acquire("b3")?;
    tick();
    assert_eq!(resolver.resolves(), resolves);
    assert_eq!(resolver.releases(), 1);
    assert_eq!(cache.active_identifiers(), vec!["b2", "b4", "b5", "b6", "b3"]);

    cache.acquire("b7")?;
    assert_eq!(resolver.released_ids(), vec!["b1", "b2"]);
    assert_eq!(cache.active_identifiers(), vec!["b4", "b5", "b6", "b3", "b7"]);
    assert_eq!(resolver.max_live(), 5);
    Ok(())
}

#[test]
fn test_release_all_twice_releases_nothing_more() -> Result<()> {
    let temp = common::setup_temp_dir()?;
    let (cache, resolver, _) = cache_over(temp.path(), &["a", "b", "c"], 5)?;
    for id in ["a", "b", "c"] {
        cache.acquire(id)?;
    }

    assert_eq!(cache.release_all(), 3);
    assert_eq!(resolver.releases(), 3);
    assert_eq!(cache.release_all(), 0);
    assert_eq!(resolver.releases(), 3);
    assert_eq!(resolver.live(), 0);
    Ok(())
}

#[test]
fn test_release_unknown_is_noop() -> Result<()> {
    let temp = common::setup_temp_dir()?;
    let (cache, resolver, _) = cache_over(temp.path(), &["a"], 2)?;
    assert!(!cache.release("a"));
    assert!(!cache.release("nope"));
    assert_eq!(resolver.releases(), 0);
    Ok(())
}

#[test]
fn test_concurrent_acquires_never_exceed_capacity() -> Result<()> {
    let temp = common::setup_temp_dir()?;
    let ids: Vec<String> = (0..12).map(|i| format!("d{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
    let (cache, resolver, _) = cache_over(temp.path(), &id_refs, 3)?;
    let cache = Arc::new(cache);

    let workers: Vec<_> = (0..6)
        .map(|w| {
            let cache = Arc::clone(&cache);
            let ids = ids.clone();
            std::thread::spawn(move || {
                for round in 0..50 {
                    let id = &ids[(w * 7 + round * 3) % ids.len()];
                    let handle = cache.acquire(id).expect("acquire");
                    if let Some(lease) = handle.lease() {
                        assert!(lease.path().is_dir());
                    }
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    assert!(resolver.max_live() <= 3, "peak {} live", resolver.max_live());
    cache.release_all();
    assert_eq!(resolver.live(), 0);
    assert_eq!(resolver.releases(), resolver.resolves());
    Ok(())
}

#[derive(Debug, Clone)]
enum Step {
    Acquire(usize),
    Release(usize),
    Advance(u64),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        4 => (0usize..8).prop_map(Step::Acquire),
        1 => (0usize..8).prop_map(Step::Release),
        1 => (1u64..1000).prop_map(Step::Advance),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_live_handles_bounded_and_released_exactly_once(
        capacity in 1usize..6,
        steps in prop::collection::vec(step(), 1..60),
    ) {
        let temp = common::setup_temp_dir().unwrap();
        let ids: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();
        let (cache, resolver, clock) = cache_over(temp.path(), &id_refs, capacity).unwrap();

        for step in steps {
            match step {
                Step::Acquire(i) => {
                    let was_active = cache.contains(&ids[i]);
                    let resolves = resolver.resolves();
                    let releases = resolver.releases();
                    cache.acquire(&ids[i]).unwrap();
                    if was_active {
                        prop_assert_eq!(resolver.resolves(), resolves);
                        prop_assert_eq!(resolver.releases(), releases);
                    }
                }
                Step::Release(i) => {
                    cache.release(&ids[i]);
                }
                Step::Advance(ms) => clock.advance(Duration::from_millis(ms)),
            }
            prop_assert!(cache.len() <= capacity);
            prop_assert!(resolver.live() <= capacity);
            prop_assert_eq!(resolver.live(), cache.len());
        }

        cache.release_all();
        prop_assert_eq!(resolver.live(), 0);
        prop_assert_eq!(resolver.releases(), resolver.resolves());
    }
}
