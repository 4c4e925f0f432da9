//! Cache record types

use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

/// Ids returned by one cached query
#[derive(Debug)]
pub struct CachedResult {
    object_ids: Vec<i32>,
    hit_counter: AtomicU64,
}

impl CachedResult {
    pub fn new(object_ids: Vec<i32>) -> Self {
        Self {
            object_ids,
            hit_counter: AtomicU64::new(0),
        }
    }

    pub fn object_ids(&self) -> &[i32] {
        &self.object_ids
    }

    pub fn hit_counter(&self) -> u64 {
        self.hit_counter.load(AtomicOrdering::Relaxed)
    }

    pub(crate) fn record_hit(&self) {
        self.hit_counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

/// Cached queries of one object type at one version.
///
/// The fingerprint map is concurrent and `dirty` is atomic: a non-dirty
/// record gains entries while the cache's outer lock is held shared. A dirty
/// record is never cleaned in place; it is replaced.
#[derive(Debug)]
pub struct IndexRecord {
    object_full_name: String,
    version: u32,
    dirty: AtomicBool,
    entries: DashMap<u32, CachedResult>,
}

impl IndexRecord {
    pub fn new(object_full_name: impl Into<String>, version: u32) -> Self {
        Self {
            object_full_name: object_full_name.into(),
            version,
            dirty: AtomicBool::new(false),
            entries: DashMap::new(),
        }
    }

    pub fn object_full_name(&self) -> &str {
        &self.object_full_name
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(AtomicOrdering::Acquire)
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.store(true, AtomicOrdering::Release);
    }

    /// Readable and writable at `current_version`
    pub fn is_current(&self, current_version: u32) -> bool {
        !self.is_dirty() && self.version == current_version
    }

    pub(crate) fn lookup(&self, fingerprint: u32) -> Option<Vec<i32>> {
        self.entries.get(&fingerprint).map(|entry| {
            entry.record_hit();
            entry.object_ids().to_vec()
        })
    }

    pub(crate) fn insert(&self, fingerprint: u32, object_ids: Vec<i32>) {
        self.entries.insert(fingerprint, CachedResult::new(object_ids));
    }

    pub(crate) fn remove(&self, fingerprint: u32) -> bool {
        self.entries.remove(&fingerprint).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn object_id_count(&self) -> usize {
        self.entries.iter().map(|e| e.object_ids().len()).sum()
    }

    /// Eviction-facing projection of every entry
    pub fn cache_entries(&self) -> Vec<CacheEntry> {
        self.entries
            .iter()
            .map(|e| CacheEntry {
                object_full_name: self.object_full_name.clone(),
                fingerprint: *e.key(),
                hit_counter: e.hit_counter(),
                object_id_count: e.object_ids().len(),
            })
            .collect()
    }
}

/// Aggregate cache size, computed on demand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheTotals {
    pub total_queries: usize,
    pub total_object_ids: usize,
}

/// One cached query as seen by the eviction policy.
///
/// Ordered by hit counter, then object full name, then fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub object_full_name: String,
    pub fingerprint: u32,
    pub hit_counter: u64,
    pub object_id_count: usize,
}

impl Ord for CacheEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.hit_counter
            .cmp(&other.hit_counter)
            .then_with(|| self.object_full_name.cmp(&other.object_full_name))
            .then_with(|| self.fingerprint.cmp(&other.fingerprint))
            .then_with(|| self.object_id_count.cmp(&other.object_id_count))
    }
}

impl PartialOrd for CacheEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
