//! Query result cache
//!
//! ```text
//! ObjectIndexer ──find──▶ IndexCache::get ──miss──▶ IndexProvider
//!                               ▲                        │
//!                               └──────── set ◀──────────┘
//!
//! VersionOracle ──version_changed / version_removed──▶ IndexCache
//! MetadataNotifier ──metadata_added / metadata_removed──▶ IndexCache
//! HardPruneCacheCleaner ──totals / enumerate / remove──▶ IndexCache
//! ```

pub mod cleaner;
pub mod fingerprint;
pub mod index_cache;
pub mod metrics;
pub mod record;

pub use cleaner::{CacheCleaner, CleanableCache, HardPruneCacheCleaner};
pub use fingerprint::MAX_CACHE_KEY_LEN;
pub use index_cache::IndexCache;
pub use metrics::CacheMetrics;
pub use record::{CacheEntry, CacheTotals, CachedResult, IndexRecord};
