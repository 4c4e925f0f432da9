//! Shared fixtures for objstore-index integration tests

#![allow(dead_code)]

use std::sync::Arc;

use objstore_index::{
    CacheSettings, IndexCache, IndexProvider, MetadataStore, ObjectIndex, ObjectIndexMetadata,
    ObjectIndexType, ObjectMetadata, VersionStore,
};

pub const NAMESPACE: &str = "ns";
pub const OBJECT: &str = "Obj";
pub const FULL_NAME: &str = "ns.Obj";

/// `ns.Obj` with `A: Integer`, `B: String?`, `C: Binary?`, `D: DateTime?`, `P: Decimal(7,2)?`
pub fn sample_metadata() -> ObjectMetadata {
    ObjectMetadata::new(
        NAMESPACE,
        OBJECT,
        vec![
            ObjectIndexMetadata::new("A", ObjectIndexType::Integer),
            ObjectIndexMetadata::new("B", ObjectIndexType::String).nullable(),
            ObjectIndexMetadata::new("C", ObjectIndexType::Binary).nullable(),
            ObjectIndexMetadata::new("D", ObjectIndexType::DateTime).nullable(),
            ObjectIndexMetadata::new("P", ObjectIndexType::Decimal)
                .with_precision(7)
                .with_scale(2)
                .nullable(),
        ],
    )
}

/// Provision `ns.Obj` and store rows `(id, A, B)`
pub fn seed(provider: &dyn IndexProvider, rows: &[(i32, i64, Option<&str>)]) {
    provider.provision_index(&sample_metadata()).unwrap();
    for &(id, a, b) in rows {
        let mut indexes = vec![ObjectIndex::new("A", a)];
        if let Some(b) = b {
            indexes.push(ObjectIndex::new("B", b));
        }
        provider.upsert_index_values(FULL_NAME, id, &indexes).unwrap();
    }
}

/// The canonical data set used by query tests
pub fn seed_standard(provider: &dyn IndexProvider) {
    seed(
        provider,
        &[
            (1, 100, Some("x")),
            (2, 100, Some("y")),
            (3, 200, Some("x")),
            (4, 100, None),
            (5, 300, Some("xyz")),
        ],
    );
}

pub struct CacheFixture {
    pub versions: Arc<VersionStore>,
    pub metadata: Arc<MetadataStore>,
    pub cache: Arc<IndexCache>,
}

/// Cache subscribed to fresh in-memory notifiers
pub fn attached_cache() -> CacheFixture {
    let versions = Arc::new(VersionStore::new());
    let metadata = Arc::new(MetadataStore::new());
    let cache = IndexCache::attach(versions.clone(), metadata.clone(), &CacheSettings::default()).unwrap();
    CacheFixture {
        versions,
        metadata,
        cache,
    }
}
