//! IndexCache behavior through the public API: read/write, invalidation
//! via notifiers, fingerprints, eviction.

mod common;

use std::sync::Arc;

use common::{attached_cache, sample_metadata, FULL_NAME};
use objstore_index::cache::MAX_CACHE_KEY_LEN;
use objstore_index::{
    CacheCleaner, CacheSettings, CleanableCache, HardPruneCacheCleaner, IndexCache, VersionStore,
};
use proptest::prelude::*;

// ═══════════════════════════════════════════════════════════════════════════
// Read / write
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_set_then_get_returns_ids_unchanged() {
    let fx = attached_cache();
    fx.cache.set(FULL_NAME, 42, vec![3, 1, 2]).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 42), Some(vec![3, 1, 2]));
    assert_eq!(fx.cache.get(FULL_NAME, 43), None);
    assert_eq!(fx.cache.get("ns.Other", 42), None);
}

#[test]
fn test_version_change_marks_record_dirty() {
    let fx = attached_cache();
    fx.cache.set(FULL_NAME, 1, vec![1]).unwrap();
    fx.cache.set(FULL_NAME, 2, vec![2]).unwrap();

    fx.versions.increment(FULL_NAME).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), None);
    assert_eq!(fx.cache.get(FULL_NAME, 2), None);

    // Repopulation replaces the dirty record at the new version
    fx.cache.set(FULL_NAME, 1, vec![10]).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), Some(vec![10]));
    assert_eq!(fx.cache.get(FULL_NAME, 2), None);
}

#[test]
fn test_version_change_for_other_object_keeps_record() {
    let fx = attached_cache();
    fx.cache.set(FULL_NAME, 1, vec![1]).unwrap();
    fx.versions.increment("ns.Other").unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), Some(vec![1]));
}

#[test]
fn test_version_removed_decaches_object() {
    let fx = attached_cache();
    fx.versions.increment(FULL_NAME).unwrap();
    fx.cache.set(FULL_NAME, 1, vec![1]).unwrap();
    fx.cache.set(FULL_NAME, 2, vec![2]).unwrap();
    assert_eq!(fx.cache.len(), 1);

    fx.versions.remove(FULL_NAME).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), None);
    assert!(fx.cache.is_empty());

    // Brand-new record with a single entry
    fx.cache.set(FULL_NAME, 2, vec![20]).unwrap();
    assert_eq!(fx.cache.totals().total_queries, 1);
    assert_eq!(fx.cache.get(FULL_NAME, 2), Some(vec![20]));
}

#[test]
fn test_metadata_change_clears_every_object() {
    let fx = attached_cache();
    fx.cache.set(FULL_NAME, 1, vec![1]).unwrap();
    fx.cache.set("ns.Other", 1, vec![1]).unwrap();
    assert_eq!(fx.cache.len(), 2);

    fx.metadata.put(sample_metadata()).unwrap();
    assert!(fx.cache.is_empty());
    assert_eq!(fx.cache.get("ns.Other", 1), None);

    fx.cache.set("ns.Other", 1, vec![1]).unwrap();
    fx.metadata.remove(FULL_NAME).unwrap();
    assert!(fx.cache.is_empty());
}

#[test]
fn test_stale_result_not_cached() {
    let fx = attached_cache();
    let observed = fx.cache.current_version(FULL_NAME);
    fx.versions.increment(FULL_NAME).unwrap();

    fx.cache.set_observed(FULL_NAME, 1, vec![1], observed).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), None);

    let observed = fx.cache.current_version(FULL_NAME);
    fx.cache.set_observed(FULL_NAME, 1, vec![1], observed).unwrap();
    assert_eq!(fx.cache.get(FULL_NAME, 1), Some(vec![1]));
}

#[test]
fn test_detach_on_drop() {
    let versions = Arc::new(VersionStore::new());
    let metadata = Arc::new(objstore_index::MetadataStore::new());
    {
        let _cache = IndexCache::attach(versions.clone(), metadata.clone(), &CacheSettings::default()).unwrap();
        assert_eq!(versions.observer_count(), 1);
    }
    assert_eq!(versions.observer_count(), 0);
    versions.increment(FULL_NAME).unwrap();
}

#[test]
fn test_concurrent_readers_and_writers() {
    let fx = attached_cache();
    std::thread::scope(|s| {
        for t in 0..4u32 {
            let cache = &fx.cache;
            s.spawn(move || {
                for i in 0..100u32 {
                    let fp = t * 1000 + i;
                    cache.set(FULL_NAME, fp, vec![i as i32]).unwrap();
                    assert_eq!(cache.get(FULL_NAME, fp), Some(vec![i as i32]));
                }
            });
        }
    });
    assert_eq!(fx.cache.totals().total_queries, 400);
}

// ═══════════════════════════════════════════════════════════════════════════
// Fingerprint
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_fingerprint_deterministic() {
    let a = IndexCache::fingerprint(&[&FULL_NAME, &"A=100", &7]);
    let b = IndexCache::fingerprint(&[&FULL_NAME.to_string(), &"A=100".to_string(), &"7"]);
    assert!(a.is_some());
    assert_eq!(a, b);
    assert_ne!(a, IndexCache::fingerprint(&[&FULL_NAME, &"A=101", &7]));
}

proptest! {
    #[test]
    fn prop_overflowing_prefix_is_uncacheable(extra in 1usize..64, suffix in "[a-z0-9=]{0,40}") {
        let prefix = "x".repeat(MAX_CACHE_KEY_LEN + extra);
        prop_assert_eq!(IndexCache::fingerprint(&[&FULL_NAME, &prefix]), None);
        prop_assert_eq!(IndexCache::fingerprint(&[&FULL_NAME, &prefix, &suffix]), None);
        prop_assert_eq!(IndexCache::fingerprint(&[&prefix, &suffix, &FULL_NAME]), None);
    }

    #[test]
    fn prop_short_parameters_are_cacheable(params in proptest::collection::vec("[a-zA-Z0-9]{0,20}", 0..10)) {
        let displays: Vec<&dyn std::fmt::Display> = std::iter::once(&FULL_NAME as &dyn std::fmt::Display)
            .chain(params.iter().map(|p| p as &dyn std::fmt::Display))
            .collect();
        prop_assert!(IndexCache::fingerprint(&displays).is_some());
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Eviction
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_hard_prune_removes_least_hit_half() {
    let fx = attached_cache();
    let cleaner = HardPruneCacheCleaner::new(fx.cache.clone(), 10, 1000, 2);

    for fp in 0..10u32 {
        fx.cache.set(FULL_NAME, fp, vec![fp as i32]).unwrap();
    }
    // Fingerprints 5..10 become the most used
    for fp in 5..10u32 {
        assert!(fx.cache.get(FULL_NAME, fp).is_some());
    }

    assert!(cleaner.needs_cleaning());
    assert!(cleaner.update());
    assert_eq!(fx.cache.totals().total_queries, 5);
    assert!(!cleaner.needs_cleaning());

    for fp in 0..5u32 {
        assert_eq!(fx.cache.get(FULL_NAME, fp), None);
    }
    for fp in 5..10u32 {
        assert_eq!(fx.cache.get(FULL_NAME, fp), Some(vec![fp as i32]));
    }
    assert_eq!(fx.cache.metrics().evictions.get(), 5);
}

#[test]
fn test_object_id_capacity_triggers_cleaning() {
    let fx = attached_cache();
    let cleaner = HardPruneCacheCleaner::new(fx.cache.clone(), 1000, 100, 2);
    fx.cache.set(FULL_NAME, 1, (0..60).collect()).unwrap();
    assert!(!cleaner.run_once());
    fx.cache.set(FULL_NAME, 2, (0..40).collect()).unwrap();
    assert!(cleaner.needs_cleaning());
    assert!(cleaner.run_once());
    assert_eq!(fx.cache.totals().total_queries, 1);
}
