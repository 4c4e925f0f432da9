//! In-memory version oracle

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Weak;
use tracing::debug;

use super::{ObserverList, SubscriptionId, VersionObserver, VersionOracle};
use crate::error::Result;

/// Per-object-type version counters with synchronous change notification.
///
/// The enclosing service calls `increment` after every index mutation.
pub struct VersionStore {
    versions: RwLock<HashMap<String, u32>>,
    observers: ObserverList<dyn VersionObserver>,
}

impl VersionStore {
    pub fn new() -> Self {
        Self {
            versions: RwLock::new(HashMap::new()),
            observers: ObserverList::new(),
        }
    }

    /// Bump the version and notify observers.
    ///
    /// Observers run after the counter lock is released. An observer error
    /// (a failed cache invalidation) is returned to the caller.
    pub fn increment(&self, object_full_name: &str) -> Result<u32> {
        let version = {
            let mut versions = self.versions.write();
            let entry = versions.entry(object_full_name.to_string()).or_insert(0);
            *entry = entry.wrapping_add(1);
            *entry
        };
        debug!(object = object_full_name, version, "version changed");
        self.observers
            .notify(|o| o.version_changed(object_full_name, version))?;
        Ok(version)
    }

    /// Forget the object type and notify observers (no-op when unknown)
    pub fn remove(&self, object_full_name: &str) -> Result<()> {
        let removed = self.versions.write().remove(object_full_name);
        match removed {
            Some(last) => {
                debug!(object = object_full_name, last, "version removed");
                self.observers
                    .notify(|o| o.version_removed(object_full_name, last))
            }
            None => Ok(()),
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl Default for VersionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionOracle for VersionStore {
    fn current(&self, object_full_name: &str) -> u32 {
        self.versions
            .read()
            .get(object_full_name)
            .copied()
            .unwrap_or(0)
    }

    fn subscribe(&self, observer: Weak<dyn VersionObserver>) -> SubscriptionId {
        self.observers.subscribe(observer)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.unsubscribe(id)
    }
}
