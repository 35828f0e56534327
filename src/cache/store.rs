//! Per-scope entry stores and the subcache tree.
//!
//! One `CacheStore` exists per execution scope; scopes nest, forming a
//! shallow tree of subcaches that mirrors nested execution. A key lives in
//! at most one store across the whole tree — enforced at insertion time by
//! the cache handle, verified here when a migration snapshot is taken.

use std::collections::hash_map;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

use crate::cache::entry::CacheEntry;
use crate::cache::key::CacheKey;

/// Names one execution scope. A path of ids from the root addresses a
/// subcache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(String);

impl ScopeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ScopeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Mapping from key to entry for one scope, plus nested subcaches.
pub struct CacheStore<V> {
    entries: HashMap<CacheKey, CacheEntry<V>>,
    subcaches: HashMap<ScopeId, CacheStore<V>>,
}

impl<V> CacheStore<V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            subcaches: HashMap::new(),
        }
    }

    /// Entry for `key` in this scope only.
    pub fn get_local(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        self.entries.get(key)
    }

    /// Mutable entry for `key` in this scope only.
    pub fn get_local_mut(&mut self, key: &CacheKey) -> Option<&mut CacheEntry<V>> {
        self.entries.get_mut(key)
    }

    /// Insert into this scope. Tree-wide key uniqueness is the caller's
    /// responsibility (the cache handle displaces prior occurrences first).
    pub fn insert_local(&mut self, key: CacheKey, entry: CacheEntry<V>) {
        self.entries.insert(key, entry);
    }

    /// Whether `key` is live anywhere in this subtree.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.find(key).is_some()
    }

    /// Entry for `key` anywhere in this subtree.
    pub fn find(&self, key: &CacheKey) -> Option<&CacheEntry<V>> {
        if let Some(entry) = self.entries.get(key) {
            return Some(entry);
        }
        self.subcaches.values().find_map(|sub| sub.find(key))
    }

    /// Unconditionally delete `key` wherever it lives in this subtree.
    ///
    /// Removal is local to the entry: recorded children stay untouched. The
    /// evictor guarantees it never picks an entry whose children are still
    /// present, which makes a cascade unnecessary here.
    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry<V>> {
        if let Some(entry) = self.entries.remove(key) {
            return Some(entry);
        }
        self.subcaches.values_mut().find_map(|sub| sub.remove(key))
    }

    /// Resolve the store for a scope path; `&[]` is this store.
    pub fn resolve(&self, path: &[ScopeId]) -> Option<&CacheStore<V>> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.subcaches.get(head)?.resolve(rest),
        }
    }

    /// Mutable variant of [`resolve`](Self::resolve).
    pub fn resolve_mut(&mut self, path: &[ScopeId]) -> Option<&mut CacheStore<V>> {
        match path.split_first() {
            None => Some(self),
            Some((head, rest)) => self.subcaches.get_mut(head)?.resolve_mut(rest),
        }
    }

    /// Resolve the store for a scope path, creating missing subcaches.
    pub fn ensure_scope(&mut self, path: &[ScopeId]) -> &mut CacheStore<V> {
        match path.split_first() {
            None => self,
            Some((head, rest)) => self
                .subcaches
                .entry(head.clone())
                .or_insert_with(CacheStore::new)
                .ensure_scope(rest),
        }
    }

    /// Destroy the subcache at `path`, removing every key local to it,
    /// nested subcaches included. Returns the number of entries dropped.
    /// The root store is not a droppable scope.
    pub fn drop_scope(&mut self, path: &[ScopeId]) -> usize {
        let Some((last, parents)) = path.split_last() else {
            return 0;
        };
        let Some(parent) = self.resolve_mut(parents) else {
            return 0;
        };
        parent
            .subcaches
            .remove(last)
            .map(|sub| sub.len())
            .unwrap_or(0)
    }

    /// Number of live entries across this subtree.
    pub fn len(&self) -> usize {
        self.entries.len() + self.subcaches.values().map(CacheStore::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy iteration over every live `(key, entry)` pair in this subtree.
    ///
    /// Restartable (call again for a fresh pass); each live entry is visited
    /// exactly once; no ordering guarantee.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            entries: self.entries.iter(),
            pending: self.subcaches.values().collect(),
        }
    }

    /// Verify the tree-wide key-uniqueness invariant, returning the first
    /// offending key if it is violated.
    pub fn verify_unique_keys(&self) -> Result<(), CacheKey> {
        let mut seen = std::collections::HashSet::with_capacity(self.len());
        for (key, _) in self.iter() {
            if !seen.insert(*key) {
                return Err(*key);
            }
        }
        Ok(())
    }

    /// Reinitialize every entry's bookkeeping (policy migration).
    pub(crate) fn reset_bookkeeping(&mut self, now: Instant) {
        for entry in self.entries.values_mut() {
            entry.reset_bookkeeping(now);
        }
        for sub in self.subcaches.values_mut() {
            sub.reset_bookkeeping(now);
        }
    }
}

impl<V> Default for CacheStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

// Shallow clone: entry handles are cloned, values are shared.
impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            subcaches: self.subcaches.clone(),
        }
    }
}

/// Flattened iterator over a store subtree. Depth-first over subcaches,
/// entries of each store in map order.
pub struct Iter<'a, V> {
    entries: hash_map::Iter<'a, CacheKey, CacheEntry<V>>,
    pending: Vec<&'a CacheStore<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a CacheKey, &'a CacheEntry<V>);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.entries.next() {
                return Some(item);
            }
            let store = self.pending.pop()?;
            self.pending.extend(store.subcaches.values());
            self.entries = store.entries.iter();
        }
    }
}
