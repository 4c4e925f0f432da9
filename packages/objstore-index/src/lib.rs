//! objstore-index - secondary-index query layer of an object store
//!
//! Answers "which object ids satisfy this predicate" for typed secondary
//! indexes declared per object type, with a version-aware query result cache
//! in front of a pluggable backing store.
//!
//! ## Architecture
//!
//! ```text
//! application   ObjectIndexer ── ProviderRegistry
//!                    │     │
//! cache         IndexCache ◀── VersionOracle / MetadataNotifier (notify)
//!                    │
//! query         JSON constraint ─▶ Predicate
//!                    │
//! domain        IndexProvider (port)
//!                    │
//! infrastructure SqliteIndexProvider | InMemoryIndexProvider
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use objstore_index::*;
//!
//! let versions = Arc::new(VersionStore::new());
//! let metadata = Arc::new(MetadataStore::new());
//! let cache = IndexCache::attach(versions.clone(), metadata.clone(), &CacheSettings::default())?;
//!
//! let indexer = ObjectIndexer::new(&IndexerConfig::default(), Some(cache))?;
//! indexer.provision_index(&schema)?;
//! indexer.index_object("ns", &object)?;
//! versions.increment("ns.Obj")?;
//!
//! let ids = indexer.find_where("ns.Obj", r#"{"A":100,"Op":"="}"#, 0, None, &schema.indexes)?;
//! ```

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod notify;
pub mod query;

pub use application::{ObjectIndexer, ProviderRegistry};
pub use cache::{CacheCleaner, CacheMetrics, CleanableCache, HardPruneCacheCleaner, IndexCache};
pub use config::{CacheSettings, IndexerConfig, ProviderLimits, ProviderSettings, Validatable};
pub use domain::{
    FindLogic, FindOperator, FindOptions, IndexProvider, IndexRow, IndexValue, IterateOptions,
    ObjectIndex, ObjectIndexMetadata, ObjectIndexType, ObjectMetadata, ObjectNaming, OrderOptions,
    PersistentObject, RowStream, ID_COLUMN,
};
pub use error::{ErrorKind, IndexError, Result};
pub use infrastructure::InMemoryIndexProvider;
pub use notify::{MetadataNotifier, MetadataObserver, MetadataStore, VersionObserver, VersionOracle, VersionStore};

#[cfg(feature = "sqlite")]
pub use infrastructure::SqliteIndexProvider;
