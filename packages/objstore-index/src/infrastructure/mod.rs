//! Infrastructure layer - IndexProvider adapters
//!
//! - `sqlite`: relational reference provider
//! - `memory_store`: HashMap-backed provider for tests

pub mod memory_store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use memory_store::InMemoryIndexProvider;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteIndexProvider;
