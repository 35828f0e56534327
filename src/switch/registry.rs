//! The well-known handle to the active cache.
//!
//! The engine registers its cache here at startup and the control surface
//! receives the registry, rather than anything scanning the process for live
//! instances. The switcher is the only other writer of the active slot.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::hierarchical::Cache;

/// Holds the single "currently active cache" reference for one pipeline.
pub struct CacheRegistry<V> {
    active: RwLock<Option<Arc<Cache<V>>>>,
}

impl<V> CacheRegistry<V> {
    pub fn new() -> Self {
        Self {
            active: RwLock::new(None),
        }
    }

    /// Publish a cache as the active instance.
    ///
    /// A single pointer-sized swap: readers that already resolved the
    /// previous instance keep it and complete against it in full.
    pub fn register(&self, cache: Arc<Cache<V>>) {
        *self.active.write() = Some(cache);
    }

    /// Resolve the currently active cache.
    pub fn active(&self) -> Option<Arc<Cache<V>>> {
        self.active.read().clone()
    }

    /// Drop the active registration (engine shutdown).
    pub fn clear(&self) {
        *self.active.write() = None;
    }
}

impl<V> Default for CacheRegistry<V> {
    fn default() -> Self {
        Self::new()
    }
}
