//! In-memory metadata notifier

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Weak;
use tracing::info;

use super::{MetadataNotifier, MetadataObserver, ObserverList, SubscriptionId};
use crate::domain::ObjectMetadata;
use crate::error::Result;

/// Object index schemas keyed by object full name
pub struct MetadataStore {
    schemas: RwLock<HashMap<String, ObjectMetadata>>,
    observers: ObserverList<dyn MetadataObserver>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self {
            schemas: RwLock::new(HashMap::new()),
            observers: ObserverList::new(),
        }
    }

    /// Define or redefine a schema; fires `metadata_added`
    pub fn put(&self, metadata: ObjectMetadata) -> Result<()> {
        let name = metadata.full_name();
        self.schemas.write().insert(name.clone(), metadata);
        info!(object = %name, "object metadata defined");
        self.observers.notify(|o| o.metadata_added(&name))
    }

    /// Drop a schema; fires `metadata_removed` when it existed
    pub fn remove(&self, object_full_name: &str) -> Result<()> {
        let removed = self.schemas.write().remove(object_full_name);
        if removed.is_none() {
            return Ok(());
        }
        info!(object = object_full_name, "object metadata removed");
        self.observers.notify(|o| o.metadata_removed(object_full_name))
    }

    pub fn names(&self) -> Vec<String> {
        self.schemas.read().keys().cloned().collect()
    }
}

impl Default for MetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataNotifier for MetadataStore {
    fn get_metadata(&self, object_full_name: &str) -> Option<ObjectMetadata> {
        self.schemas.read().get(object_full_name).cloned()
    }

    fn subscribe(&self, observer: Weak<dyn MetadataObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.unsubscribe(id)
    }
}
