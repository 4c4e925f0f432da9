//! ObjectIndexer - query facade over one provider and an optional shared cache
//!
//! `find` / `find_where` read through the cache; everything else goes
//! straight to the provider.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::registry::ProviderRegistry;
use crate::cache::IndexCache;
use crate::config::IndexerConfig;
use crate::domain::{
    FindOptions, IndexProvider, IndexValue, IterateOptions, ObjectIndex, ObjectIndexMetadata,
    ObjectIndexType, ObjectMetadata, ObjectNaming, OrderOptions, PersistentObject, RowStream,
};
use crate::error::{IndexError, Result};

pub struct ObjectIndexer {
    provider: Box<dyn IndexProvider>,
    cache: Option<Arc<IndexCache>>,
    closed: AtomicBool,
}

impl ObjectIndexer {
    /// Facade over a provider resolved through the global registry
    pub fn new(config: &IndexerConfig, cache: Option<Arc<IndexCache>>) -> Result<Self> {
        Self::with_registry(ProviderRegistry::global(), config, cache)
    }

    pub fn with_registry(
        registry: &ProviderRegistry,
        config: &IndexerConfig,
        cache: Option<Arc<IndexCache>>,
    ) -> Result<Self> {
        let provider = registry.create(&config.provider, &config.provider_settings())?;
        let cache = cache.filter(|_| config.cache.enabled);
        info!(
            provider = %config.provider,
            cached = cache.is_some(),
            "object indexer created"
        );
        Ok(Self::with_provider(provider, cache))
    }

    pub fn with_provider(provider: Box<dyn IndexProvider>, cache: Option<Arc<IndexCache>>) -> Self {
        Self {
            provider,
            cache,
            closed: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> Option<&Arc<IndexCache>> {
        self.cache.as_ref()
    }

    fn provider(&self) -> Result<&dyn IndexProvider> {
        if self.closed.load(Ordering::Acquire) {
            return Err(IndexError::backing_store("Object indexer is closed"));
        }
        Ok(self.provider.as_ref())
    }

    /// Serve from the cache or run `query` and remember its result.
    ///
    /// The version is read before the query so a result overtaken by a
    /// concurrent mutation is never stored as current.
    fn read_through(
        &self,
        object_full_name: &str,
        params: &[&dyn fmt::Display],
        query: impl FnOnce() -> Result<Vec<i32>>,
    ) -> Result<Vec<i32>> {
        let Some(cache) = &self.cache else {
            return query();
        };
        let Some(fingerprint) = IndexCache::fingerprint(params) else {
            cache.record_uncacheable(object_full_name);
            return query();
        };
        if let Some(ids) = cache.get(object_full_name, fingerprint) {
            return Ok(ids);
        }

        let observed = cache.current_version(object_full_name);
        let ids = query()?;
        cache.set_observed(object_full_name, fingerprint, ids.clone(), observed)?;
        Ok(ids)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Ids matching flat constraints joined by `options.logic`
    pub fn find(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<Vec<i32>> {
        let provider = self.provider()?;
        let mut params: Vec<&dyn fmt::Display> = Vec::with_capacity(indexes.len() + 2);
        params.push(&object_full_name);
        params.push(options);
        params.extend(indexes.iter().map(|i| i as &dyn fmt::Display));

        self.read_through(object_full_name, &params, || {
            provider.find(object_full_name, options, indexes)
        })
    }

    /// Ids matching a JSON constraint
    pub fn find_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        limit: usize,
        order: Option<&OrderOptions>,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<Vec<i32>> {
        let provider = self.provider()?;
        let order_key = order.map(ToString::to_string).unwrap_or_default();
        let mut params: Vec<&dyn fmt::Display> = Vec::with_capacity(metadata.len() + 4);
        params.push(&object_full_name);
        params.push(&constraint);
        params.push(&limit);
        params.push(&order_key);
        params.extend(metadata.iter().map(|m| m as &dyn fmt::Display));

        self.read_through(object_full_name, &params, || {
            provider.find_where(object_full_name, constraint, limit, order, metadata)
        })
    }

    pub fn count(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<usize> {
        self.provider()?.count(object_full_name, options, indexes)
    }

    pub fn exists(&self, object_full_name: &str, options: &FindOptions, indexes: &[ObjectIndex]) -> Result<bool> {
        self.provider()?.exists(object_full_name, options, indexes)
    }

    pub fn count_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<usize> {
        self.provider()?.count_where(object_full_name, constraint, metadata)
    }

    pub fn exists_where(
        &self,
        object_full_name: &str,
        constraint: &str,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<bool> {
        self.provider()?.exists_where(object_full_name, constraint, metadata)
    }

    pub fn count_objects(&self, object_full_name: &str) -> Result<usize> {
        self.provider()?.count_objects(object_full_name)
    }

    pub fn object_exists(&self, object_full_name: &str) -> Result<bool> {
        self.provider()?.object_exists(object_full_name)
    }

    pub fn iterate(
        &self,
        object_full_name: &str,
        options: &IterateOptions,
        metadata: &[ObjectIndexMetadata],
    ) -> Result<RowStream> {
        self.provider()?.iterate(object_full_name, options, metadata)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Mutation
    // ═══════════════════════════════════════════════════════════════════════

    /// Write the index values of an object stored under `namespace`.
    ///
    /// Rejects an absent value and untyped index values before any I/O.
    pub fn index_object(&self, namespace: &str, object: &PersistentObject) -> Result<()> {
        let object_full_name = ObjectNaming::full_name(namespace, &object.name);
        if object.value.is_none() {
            return Err(IndexError::validation(format!(
                "Object {} of {} has no value",
                object.id, object_full_name
            )));
        }
        if let Some(index) = object
            .indexes
            .iter()
            .find(|i| i.data_type() == ObjectIndexType::Unknown)
        {
            return Err(IndexError::validation(format!(
                "Index '{}' of {} has an unknown data type",
                index.name, object_full_name
            )));
        }

        debug!(object = %object_full_name, object_id = object.id, indexes = object.indexes.len(), "indexing object");
        self.provider()?
            .upsert_index_values(&object_full_name, object.id, &object.indexes)
    }

    pub fn bulk_index(
        &self,
        object_full_name: &str,
        metadata: &[ObjectIndexMetadata],
        rows: &[Vec<IndexValue>],
    ) -> Result<()> {
        self.provider()?
            .bulk_upsert_index_values(object_full_name, metadata, rows)
    }

    pub fn remove_object_index(&self, object_full_name: &str, object_id: i32) -> Result<()> {
        self.provider()?.remove_index_value(object_full_name, object_id)
    }

    pub fn remove_object_indexes(&self, object_full_name: &str, object_ids: &[i32]) -> Result<()> {
        self.provider()?.remove_index_values(object_full_name, object_ids)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Schema
    // ═══════════════════════════════════════════════════════════════════════

    pub fn provision_index(&self, metadata: &ObjectMetadata) -> Result<()> {
        self.provider()?.provision_index(metadata)
    }

    pub fn unprovision_index(&self, object_full_name: &str) -> Result<()> {
        self.provider()?.unprovision_index(object_full_name)
    }

    pub fn truncate(&self, object_full_name: &str) -> Result<()> {
        self.provider()?.truncate(object_full_name)
    }

    /// Release the provider (idempotent). The shared cache is left alone.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.provider.close()
    }
}

impl Drop for ObjectIndexer {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(error = %err, "failed to close index provider");
        }
    }
}
