//! Cache slots and their eviction bookkeeping.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::cache::key::CacheKey;

/// A single cached computation result.
///
/// The value is opaque to the cache and always shared, never copied. The
/// remaining fields are eviction bookkeeping owned by whichever policy is
/// active: the no-eviction policy neither stamps nor consults them.
pub struct CacheEntry<V> {
    value: Arc<V>,
    /// Eviction epoch this entry was last written in.
    generation: u64,
    /// Eviction epoch this entry was last read in. Distinguishes "written"
    /// from "still needed" in a pipeline that re-executes the same graph.
    used_generation: u64,
    /// Wall-clock tie-breaker for eviction ordering.
    last_access: Instant,
    /// Keys that causally depend on this entry's value. An entry with a live
    /// dependent must not be evicted.
    children: HashSet<CacheKey>,
}

impl<V> CacheEntry<V> {
    /// Create an entry written in the given eviction epoch.
    pub fn new(value: Arc<V>, children: HashSet<CacheKey>, generation: u64) -> Self {
        Self {
            value,
            generation,
            used_generation: 0,
            last_access: Instant::now(),
            children,
        }
    }

    /// Shared handle to the computed value.
    pub fn value(&self) -> Arc<V> {
        Arc::clone(&self.value)
    }

    /// Epoch this entry was last written in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Epoch this entry was last read in.
    pub fn used_generation(&self) -> u64 {
        self.used_generation
    }

    /// Time of the last read or write.
    pub fn last_access(&self) -> Instant {
        self.last_access
    }

    /// Keys recorded as depending on this entry's value.
    pub fn children(&self) -> &HashSet<CacheKey> {
        &self.children
    }

    /// Snapshot of the bookkeeping fields.
    pub fn stats(&self) -> EntryStats {
        EntryStats {
            generation: self.generation,
            used_generation: self.used_generation,
            last_access: self.last_access,
            child_count: self.children.len(),
        }
    }

    /// Record a read in the given epoch.
    pub(crate) fn touch(&mut self, generation: u64) {
        self.used_generation = generation;
        self.last_access = Instant::now();
    }

    /// Reinitialize bookkeeping after a policy migration: the entry reads as
    /// written in epoch 1 and never read since.
    pub(crate) fn reset_bookkeeping(&mut self, now: Instant) {
        self.generation = 1;
        self.used_generation = 0;
        self.last_access = now;
    }
}

// Derived Clone would demand `V: Clone`; only the `Arc` handle is cloned.
impl<V> Clone for CacheEntry<V> {
    fn clone(&self) -> Self {
        Self {
            value: Arc::clone(&self.value),
            generation: self.generation,
            used_generation: self.used_generation,
            last_access: self.last_access,
            children: self.children.clone(),
        }
    }
}

/// Bookkeeping snapshot of one entry, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryStats {
    pub generation: u64,
    pub used_generation: u64,
    pub last_access: Instant,
    pub child_count: usize,
}
