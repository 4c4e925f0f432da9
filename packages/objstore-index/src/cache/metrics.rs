//! Prometheus metrics for the query result cache

use prometheus::{
    register_int_counter_with_registry, register_int_gauge_with_registry, IntCounter, IntGauge,
    Opts, Registry,
};

use crate::error::Result;

/// Index Cache Metrics
#[derive(Clone)]
pub struct CacheMetrics {
    registry: Registry,
    pub hits: IntCounter,
    pub misses: IntCounter,
    pub uncacheable: IntCounter,
    pub stores: IntCounter,
    pub lock_timeouts: IntCounter,
    pub resets: IntCounter,
    pub evictions: IntCounter,
    pub records: IntGauge,
}

impl CacheMetrics {
    /// Register cache metrics into `registry`.
    ///
    /// Registering twice into the same registry fails with a configuration
    /// error; use `standalone` for caches that are not scraped.
    pub fn new(registry: &Registry) -> Result<Self> {
        Ok(Self {
            registry: registry.clone(),
            hits: register_int_counter_with_registry!(
                Opts::new("index_cache_hits_total", "Index cache hits"),
                registry
            )?,
            misses: register_int_counter_with_registry!(
                Opts::new("index_cache_misses_total", "Index cache misses"),
                registry
            )?,
            uncacheable: register_int_counter_with_registry!(
                Opts::new(
                    "index_cache_uncacheable_total",
                    "Queries whose fingerprint exceeded the key length cap"
                ),
                registry
            )?,
            stores: register_int_counter_with_registry!(
                Opts::new("index_cache_stores_total", "Results written to the index cache"),
                registry
            )?,
            lock_timeouts: register_int_counter_with_registry!(
                Opts::new("index_cache_lock_timeouts_total", "Index cache lock acquisition timeouts"),
                registry
            )?,
            resets: register_int_counter_with_registry!(
                Opts::new("index_cache_resets_total", "Full index cache resets"),
                registry
            )?,
            evictions: register_int_counter_with_registry!(
                Opts::new("index_cache_evictions_total", "Entries removed by the cache cleaner"),
                registry
            )?,
            records: register_int_gauge_with_registry!(
                Opts::new("index_cache_records", "Object types with a cache record"),
                registry
            )?,
        })
    }

    /// Metrics registered into a private registry
    pub fn standalone() -> Result<Self> {
        Self::new(&Registry::new())
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.get() as f64;
        let total = hits + self.misses.get() as f64;
        if total > 0.0 {
            hits / total
        } else {
            0.0
        }
    }
}
