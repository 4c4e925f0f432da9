//! Threshold-triggered cache eviction
//!
//! `HardPruneCacheCleaner` drops the least-hit fraction of all cached queries
//! once the cache grows past its query or object-id capacity. Calls must be
//! serialized by the scheduler that drives the cleaner.

use std::sync::Arc;
use tracing::info;

use super::record::{CacheEntry, CacheTotals};
use crate::config::CacheSettings;

/// Introspection contract a cache exposes to eviction policies
pub trait CleanableCache: Send + Sync {
    fn totals(&self) -> CacheTotals;

    /// Lazy sequence of every cached query; each call starts afresh
    fn enumerate(&self) -> Box<dyn Iterator<Item = CacheEntry> + '_>;

    /// Remove the given entries, returning how many were present
    fn remove(&self, entries: &[CacheEntry]) -> usize;
}

/// Eviction policy
pub trait CacheCleaner {
    fn needs_cleaning(&self) -> bool;

    /// Run one eviction pass; `true` if entries were selected for removal
    fn update(&self) -> bool;

    /// Entry point for schedulers
    fn run_once(&self) -> bool {
        self.needs_cleaning() && self.update()
    }
}

/// Removes `total_queries / reduction_factor` lowest-ranked entries per pass
pub struct HardPruneCacheCleaner<C: CleanableCache + ?Sized> {
    cache: Arc<C>,
    max_queries: usize,
    max_objects: usize,
    reduction_factor: usize,
}

impl<C: CleanableCache + ?Sized> HardPruneCacheCleaner<C> {
    pub fn new(cache: Arc<C>, max_queries: usize, max_objects: usize, reduction_factor: usize) -> Self {
        Self {
            cache,
            max_queries,
            max_objects,
            reduction_factor: reduction_factor.max(2),
        }
    }

    pub fn from_settings(cache: Arc<C>, settings: &CacheSettings) -> Self {
        Self::new(
            cache,
            settings.max_queries,
            settings.max_objects,
            settings.reduction_factor,
        )
    }

    pub fn reduction_factor(&self) -> usize {
        self.reduction_factor
    }
}

impl<C: CleanableCache + ?Sized> CacheCleaner for HardPruneCacheCleaner<C> {
    /// Inclusive thresholds: a cache holding exactly `max_queries` entries or
    /// exactly `max_objects` object ids already needs cleaning.
    fn needs_cleaning(&self) -> bool {
        let totals = self.cache.totals();
        totals.total_queries >= self.max_queries || totals.total_object_ids >= self.max_objects
    }

    fn update(&self) -> bool {
        let totals = self.cache.totals();
        let to_remove = totals.total_queries / self.reduction_factor;
        if to_remove == 0 {
            return false;
        }

        let mut entries: Vec<CacheEntry> = self.cache.enumerate().collect();
        entries.sort();
        entries.truncate(to_remove);
        let removed = self.cache.remove(&entries);

        info!(
            total_queries = totals.total_queries,
            total_object_ids = totals.total_object_ids,
            selected = to_remove,
            removed,
            "cache pruned"
        );
        true
    }
}
