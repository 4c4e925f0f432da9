//! Invalidation sources
//!
//! Narrow observer contracts for the two notifiers the cache listens to, and
//! in-memory implementations of both. Notification is a synchronous callback
//! list with explicit subscribe/unsubscribe.

mod metadata_store;
mod version_store;

pub use metadata_store::MetadataStore;
pub use version_store::VersionStore;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::domain::ObjectMetadata;
use crate::error::Result;

/// Handle returned by `subscribe`
pub type SubscriptionId = u64;

/// Receives per-object-type version changes
pub trait VersionObserver: Send + Sync {
    fn version_changed(&self, object_full_name: &str, new_version: u32) -> Result<()>;

    fn version_removed(&self, object_full_name: &str, last_version: u32) -> Result<()>;
}

/// Receives index schema changes
pub trait MetadataObserver: Send + Sync {
    fn metadata_added(&self, object_full_name: &str) -> Result<()>;

    fn metadata_removed(&self, object_full_name: &str) -> Result<()>;
}

/// Authoritative per-object-type version counters
pub trait VersionOracle: Send + Sync {
    /// Current version; unknown object types are at version 0
    fn current(&self, object_full_name: &str) -> u32;

    fn subscribe(&self, observer: Weak<dyn VersionObserver>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Source of object index schemas
pub trait MetadataNotifier: Send + Sync {
    fn get_metadata(&self, object_full_name: &str) -> Option<ObjectMetadata>;

    fn subscribe(&self, observer: Weak<dyn MetadataObserver>) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// Subscriber list shared by the in-memory notifiers
pub(crate) struct ObserverList<T: ?Sized> {
    next_id: AtomicU64,
    observers: Mutex<Vec<(SubscriptionId, Weak<T>)>>,
}

impl<T: ?Sized> ObserverList<T> {
    pub(crate) fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            observers: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self, observer: Weak<T>) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.lock().push((id, observer));
        id
    }

    pub(crate) fn unsubscribe(&self, id: SubscriptionId) {
        self.observers.lock().retain(|(sub, _)| *sub != id);
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Live observers; dead ones are pruned.
    ///
    /// Callbacks run on the returned snapshot so that no list lock is held
    /// while an observer executes.
    fn live(&self) -> Vec<Arc<T>> {
        let mut observers = self.observers.lock();
        observers.retain(|(_, weak)| weak.strong_count() > 0);
        observers.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
    }

    /// Invoke `f` on every live observer; the first error is returned after
    /// all observers have been notified.
    pub(crate) fn notify(&self, mut f: impl FnMut(&T) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for observer in self.live() {
            if let Err(err) = f(&*observer) {
                tracing::warn!(error = %err, "observer notification failed");
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
