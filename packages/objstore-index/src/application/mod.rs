//! Application layer
//!
//! - `registry`: provider identifier → constructor
//! - `indexer`: `ObjectIndexer` facade (cache read-through + provider pass-through)

pub mod indexer;
pub mod registry;

pub use indexer::ObjectIndexer;
pub use registry::{ProviderFactory, ProviderRegistry, MEMORY_PROVIDER};

#[cfg(feature = "sqlite")]
pub use registry::SQLITE_PROVIDER;
