//! Provider factory registry
//!
//! Maps a configuration-supplied identifier to a provider constructor. The
//! first successful resolution fixes the provider type for the registry;
//! every facade still gets its own provider instance.

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::info;

use crate::config::ProviderSettings;
use crate::domain::IndexProvider;
use crate::error::{IndexError, Result};
use crate::infrastructure::InMemoryIndexProvider;

/// Provider constructor
pub type ProviderFactory = fn(&ProviderSettings) -> Result<Box<dyn IndexProvider>>;

pub const MEMORY_PROVIDER: &str = "memory";
#[cfg(feature = "sqlite")]
pub const SQLITE_PROVIDER: &str = "sqlite";

static GLOBAL: Lazy<ProviderRegistry> = Lazy::new(ProviderRegistry::with_builtins);

fn memory_factory(settings: &ProviderSettings) -> Result<Box<dyn IndexProvider>> {
    Ok(Box::new(InMemoryIndexProvider::from_settings(settings)?))
}

#[cfg(feature = "sqlite")]
fn sqlite_factory(settings: &ProviderSettings) -> Result<Box<dyn IndexProvider>> {
    Ok(Box::new(crate::infrastructure::SqliteIndexProvider::from_settings(settings)?))
}

pub struct ProviderRegistry {
    factories: RwLock<HashMap<String, ProviderFactory>>,
    resolved: OnceCell<String>,
}

impl ProviderRegistry {
    /// Registry without any provider
    pub fn empty() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
            resolved: OnceCell::new(),
        }
    }

    /// Registry with the providers compiled into this crate
    pub fn with_builtins() -> Self {
        let registry = Self::empty();
        registry.register(MEMORY_PROVIDER, memory_factory);
        #[cfg(feature = "sqlite")]
        registry.register(SQLITE_PROVIDER, sqlite_factory);
        registry
    }

    /// Process-wide registry
    pub fn global() -> &'static ProviderRegistry {
        &GLOBAL
    }

    /// Add or replace a factory; identifiers are case-insensitive
    pub fn register(&self, id: &str, factory: ProviderFactory) {
        self.factories.write().insert(normalize(id), factory);
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.factories.read().contains_key(&normalize(id))
    }

    /// Identifier fixed by the first resolution, if any
    pub fn resolved(&self) -> Option<&str> {
        self.resolved.get().map(String::as_str)
    }

    /// Look up the factory for `id`, fixing it as the registry's provider type
    pub fn resolve(&self, id: &str) -> Result<ProviderFactory> {
        let id = normalize(id);
        let factory = self
            .factories
            .read()
            .get(&id)
            .copied()
            .ok_or_else(|| IndexError::configuration(format!("Unknown index provider '{}'", id)))?;

        let resolved = self.resolved.get_or_init(|| {
            info!(provider = %id, "index provider resolved");
            id.clone()
        });
        if *resolved != id {
            return Err(IndexError::configuration(format!(
                "Index provider already resolved as '{}', cannot switch to '{}'",
                resolved, id
            )));
        }
        Ok(factory)
    }

    /// Resolve `id` and construct a new provider instance
    pub fn create(&self, id: &str, settings: &ProviderSettings) -> Result<Box<dyn IndexProvider>> {
        let factory = self.resolve(id)?;
        factory(settings)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn normalize(id: &str) -> String {
    id.trim().to_ascii_lowercase()
}
