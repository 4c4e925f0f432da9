//! Version-aware query result cache
//!
//! One record per object type, keyed by object full name, each holding the
//! ids returned by previously executed queries (keyed by fingerprint).
//!
//! # Locking
//!
//! The outer map sits behind one `RwLock` acquired with bounded timeouts:
//!
//! | operation | lock | on timeout |
//! |---|---|---|
//! | `get` | shared | miss |
//! | `set` into a current record | shared | skip caching |
//! | record replacement / removal | exclusive | full reset |
//! | `on_version_changed` | shared | full reset |
//! | `reset` / `on_metadata_changed` | exclusive | `ConcurrencyTimeout` |
//!
//! Records are mutated in place only through their concurrent inner map and
//! atomic dirty flag, so the shared lock suffices for those paths.

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::cleaner::CleanableCache;
use super::fingerprint;
use super::metrics::CacheMetrics;
use super::record::{CacheEntry, CacheTotals, IndexRecord};
use crate::config::CacheSettings;
use crate::error::{IndexError, Result};
use crate::notify::{
    MetadataNotifier, MetadataObserver, SubscriptionId, VersionObserver, VersionOracle,
};

struct Subscriptions {
    versions: Option<SubscriptionId>,
    metadata: Option<(Arc<dyn MetadataNotifier>, SubscriptionId)>,
}

/// What a write under the exclusive lock installs
enum Replacement {
    Fresh {
        version: u32,
        fingerprint: u32,
        object_ids: Vec<i32>,
    },
    Remove,
}

/// Query result cache shared by indexer facades.
///
/// Owned by the caller; facades hold an `Arc`.
pub struct IndexCache {
    records: RwLock<HashMap<String, Arc<IndexRecord>>>,
    versions: Arc<dyn VersionOracle>,
    read_timeout: Duration,
    write_timeout: Duration,
    metrics: CacheMetrics,
    subscriptions: Mutex<Subscriptions>,
}

impl IndexCache {
    /// Cache without notifier subscriptions; invalidation handlers must be
    /// called directly.
    pub fn new(versions: Arc<dyn VersionOracle>, settings: &CacheSettings) -> Result<Self> {
        Self::with_metrics(versions, settings, CacheMetrics::standalone()?)
    }

    pub fn with_metrics(
        versions: Arc<dyn VersionOracle>,
        settings: &CacheSettings,
        metrics: CacheMetrics,
    ) -> Result<Self> {
        Ok(Self {
            records: RwLock::new(HashMap::new()),
            versions,
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
            metrics,
            subscriptions: Mutex::new(Subscriptions {
                versions: None,
                metadata: None,
            }),
        })
    }

    /// Cache subscribed to both notifiers; unsubscribed on drop.
    pub fn attach(
        versions: Arc<dyn VersionOracle>,
        metadata: Arc<dyn MetadataNotifier>,
        settings: &CacheSettings,
    ) -> Result<Arc<Self>> {
        let cache = Arc::new(Self::new(versions, settings)?);
        cache.subscribe(metadata);
        Ok(cache)
    }

    /// Subscribe an already shared cache to its version oracle and `metadata`
    pub fn subscribe(self: &Arc<Self>, metadata: Arc<dyn MetadataNotifier>) {
        let version_observer: Weak<dyn VersionObserver> = Arc::downgrade(self) as Weak<dyn VersionObserver>;
        let metadata_observer: Weak<dyn MetadataObserver> = Arc::downgrade(self) as Weak<dyn MetadataObserver>;

        let mut subs = self.subscriptions.lock();
        if subs.versions.is_none() {
            subs.versions = Some(self.versions.subscribe(version_observer));
        }
        if subs.metadata.is_none() {
            let id = metadata.subscribe(metadata_observer);
            subs.metadata = Some((metadata, id));
        }
    }

    /// Drop notifier subscriptions (idempotent)
    pub fn detach(&self) {
        let mut subs = self.subscriptions.lock();
        if let Some(id) = subs.versions.take() {
            self.versions.unsubscribe(id);
        }
        if let Some((notifier, id)) = subs.metadata.take() {
            notifier.unsubscribe(id);
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Lookup
    // ═══════════════════════════════════════════════════════════════════════

    /// Fingerprint of a query parameter list; `None` = uncacheable
    pub fn fingerprint(params: &[&dyn fmt::Display]) -> Option<u32> {
        fingerprint::compute(params)
    }

    /// Cached ids, or `None` when absent, dirty, or the lock timed out
    pub fn get(&self, object_full_name: &str, fingerprint: u32) -> Option<Vec<i32>> {
        let Some(records) = self.records.try_read_for(self.read_timeout) else {
            warn!(object = object_full_name, "cache read lock timeout, treating as miss");
            self.metrics.lock_timeouts.inc();
            self.metrics.misses.inc();
            return None;
        };

        let found = records
            .get(object_full_name)
            .filter(|record| !record.is_dirty())
            .and_then(|record| record.lookup(fingerprint));

        match &found {
            Some(ids) => {
                debug!(object = object_full_name, fingerprint, ids = ids.len(), "cache hit");
                self.metrics.hits.inc();
            }
            None => {
                debug!(object = object_full_name, fingerprint, "cache miss");
                self.metrics.misses.inc();
            }
        }
        found
    }

    /// Version the cache will stamp on a record created now
    pub fn current_version(&self, object_full_name: &str) -> u32 {
        self.versions.current(object_full_name)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Population
    // ═══════════════════════════════════════════════════════════════════════

    /// Store ids for a fingerprint.
    ///
    /// Fails only when a record replacement and the fallback reset both time
    /// out on the exclusive lock.
    pub fn set(&self, object_full_name: &str, fingerprint: u32, object_ids: Vec<i32>) -> Result<()> {
        let version = self.versions.current(object_full_name);
        self.store(object_full_name, fingerprint, object_ids, version)
    }

    /// Like `set`, but only if the object type is still at
    /// `observed_version`, the version read before the query ran.
    pub fn set_observed(
        &self,
        object_full_name: &str,
        fingerprint: u32,
        object_ids: Vec<i32>,
        observed_version: u32,
    ) -> Result<()> {
        let version = self.versions.current(object_full_name);
        if version != observed_version {
            debug!(
                object = object_full_name,
                observed_version, version, "version moved during query, result not cached"
            );
            return Ok(());
        }
        self.store(object_full_name, fingerprint, object_ids, version)
    }

    fn store(&self, object_full_name: &str, fingerprint: u32, object_ids: Vec<i32>, version: u32) -> Result<()> {
        {
            let Some(records) = self.records.try_read_for(self.read_timeout) else {
                warn!(object = object_full_name, "cache read lock timeout, result not cached");
                self.metrics.lock_timeouts.inc();
                return Ok(());
            };
            if let Some(record) = records.get(object_full_name) {
                if record.is_current(version) {
                    record.insert(fingerprint, object_ids);
                    self.metrics.stores.inc();
                    return Ok(());
                }
            }
        }

        self.replace(
            object_full_name,
            Replacement::Fresh {
                version,
                fingerprint,
                object_ids,
            },
        )
    }

    /// Install a fresh record (or none) under the exclusive lock, falling
    /// back to a full reset on timeout.
    fn replace(&self, object_full_name: &str, replacement: Replacement) -> Result<()> {
        let Some(mut records) = self.records.try_write_for(self.write_timeout) else {
            warn!(object = object_full_name, "cache write lock timeout, resetting cache");
            self.metrics.lock_timeouts.inc();
            return self.reset();
        };

        match replacement {
            Replacement::Fresh {
                version,
                fingerprint,
                object_ids,
            } => {
                // Another writer may have installed a current record meanwhile
                match records.get(object_full_name) {
                    Some(existing) if existing.is_current(version) => {
                        existing.insert(fingerprint, object_ids);
                    }
                    _ => {
                        let record = IndexRecord::new(object_full_name, version);
                        record.insert(fingerprint, object_ids);
                        records.insert(object_full_name.to_string(), Arc::new(record));
                        debug!(object = object_full_name, version, "cache record created");
                    }
                }
                self.metrics.stores.inc();
            }
            Replacement::Remove => {
                if records.remove(object_full_name).is_some() {
                    debug!(object = object_full_name, "cache record removed");
                }
            }
        }
        self.metrics.records.set(records.len() as i64);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Invalidation
    // ═══════════════════════════════════════════════════════════════════════

    /// Drop every record.
    ///
    /// A timeout here leaves the cache unable to vouch for its contents and
    /// is reported as `ConcurrencyTimeout`.
    pub fn reset(&self) -> Result<()> {
        match self.records.try_write_for(self.write_timeout) {
            Some(mut records) => {
                records.clear();
                self.metrics.resets.inc();
                self.metrics.records.set(0);
                debug!("cache reset");
                Ok(())
            }
            None => {
                error!("cache write lock timeout during reset");
                self.metrics.lock_timeouts.inc();
                Err(IndexError::concurrency_timeout(
                    "Unable to acquire index cache write lock for reset",
                ))
            }
        }
    }

    /// Mark the object type's record dirty if it was cached at another version
    pub fn on_version_changed(&self, object_full_name: &str, new_version: u32) -> Result<()> {
        let Some(records) = self.records.try_read_for(self.read_timeout) else {
            warn!(
                object = object_full_name,
                "cache read lock timeout during invalidation, resetting cache"
            );
            self.metrics.lock_timeouts.inc();
            return self.reset();
        };
        if let Some(record) = records.get(object_full_name) {
            if record.version() != new_version {
                record.mark_dirty();
                debug!(object = object_full_name, new_version, "cache record marked dirty");
            }
        }
        Ok(())
    }

    /// Decache the object type
    pub fn on_version_removed(&self, object_full_name: &str, _last_version: u32) -> Result<()> {
        self.replace(object_full_name, Replacement::Remove)
    }

    /// Drop the whole cache; any schema change invalidates every result
    pub fn on_metadata_changed(&self, object_full_name: &str) -> Result<()> {
        debug!(object = object_full_name, "metadata changed, clearing cache");
        self.reset()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Introspection
    // ═══════════════════════════════════════════════════════════════════════

    /// Number of object types with a record
    pub fn len(&self) -> usize {
        self.records
            .try_read_for(self.read_timeout)
            .map_or(0, |records| records.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn metrics(&self) -> &CacheMetrics {
        &self.metrics
    }

    pub(crate) fn record_uncacheable(&self, object_full_name: &str) {
        debug!(object = object_full_name, "query uncacheable");
        self.metrics.uncacheable.inc();
    }

    fn snapshot(&self) -> Vec<Arc<IndexRecord>> {
        match self.records.try_read_for(self.read_timeout) {
            Some(records) => records.values().cloned().collect(),
            None => {
                warn!("cache read lock timeout while enumerating");
                self.metrics.lock_timeouts.inc();
                Vec::new()
            }
        }
    }
}

impl CleanableCache for IndexCache {
    fn totals(&self) -> CacheTotals {
        self.snapshot()
            .iter()
            .fold(CacheTotals::default(), |mut totals, record| {
                totals.total_queries += record.len();
                totals.total_object_ids += record.object_id_count();
                totals
            })
    }

    fn enumerate(&self) -> Box<dyn Iterator<Item = CacheEntry> + '_> {
        Box::new(
            self.snapshot()
                .into_iter()
                .flat_map(|record| record.cache_entries()),
        )
    }

    fn remove(&self, entries: &[CacheEntry]) -> usize {
        let Some(mut records) = self.records.try_write_for(self.write_timeout) else {
            warn!(entries = entries.len(), "cache write lock timeout, nothing evicted");
            self.metrics.lock_timeouts.inc();
            return 0;
        };

        let mut removed = 0;
        for entry in entries {
            if let Some(record) = records.get(&entry.object_full_name) {
                if record.remove(entry.fingerprint) {
                    removed += 1;
                }
            }
        }
        records.retain(|_, record| !record.is_empty());
        self.metrics.evictions.inc_by(removed as u64);
        self.metrics.records.set(records.len() as i64);
        removed
    }
}

impl VersionObserver for IndexCache {
    fn version_changed(&self, object_full_name: &str, new_version: u32) -> Result<()> {
        self.on_version_changed(object_full_name, new_version)
    }

    fn version_removed(&self, object_full_name: &str, last_version: u32) -> Result<()> {
        self.on_version_removed(object_full_name, last_version)
    }
}

impl MetadataObserver for IndexCache {
    fn metadata_added(&self, object_full_name: &str) -> Result<()> {
        self.on_metadata_changed(object_full_name)
    }

    fn metadata_removed(&self, object_full_name: &str) -> Result<()> {
        self.on_metadata_changed(object_full_name)
    }
}

impl Drop for IndexCache {
    fn drop(&mut self) {
        self.detach();
    }
}
