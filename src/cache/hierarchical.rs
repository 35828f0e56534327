//! The externally visible cache handle.
//!
//! [`Cache`] composes the scope-store tree with whichever eviction policy is
//! active. Pipeline traffic is routed to the store for the requesting
//! execution scope; eviction is delegated to the policy, which operates over
//! the flattened tree — eviction safety is scope-independent.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tracing::debug;

use crate::cache::entry::{CacheEntry, EntryStats};
use crate::cache::evictor::{EvictError, PollOutcome};
use crate::cache::key::CacheKey;
use crate::cache::policy::{EvictionPolicy, PolicyState};
use crate::cache::store::{CacheStore, ScopeId};
use crate::memory::MemoryProbe;

/// A result cache with one attached eviction policy.
///
/// The pipeline holds a long-lived `Arc<Cache<V>>` resolved through the
/// registry. A policy change never mutates a live instance's mode: the
/// switcher builds a replacement and publishes it with a single reference
/// swap, so readers in flight see either the old or the new cache in full.
pub struct Cache<V> {
    inner: RwLock<CacheInner<V>>,
    probe: Arc<dyn MemoryProbe>,
}

struct CacheInner<V> {
    root: CacheStore<V>,
    policy: PolicyState,
}

impl<V> Cache<V> {
    /// Create an empty cache with the given policy.
    pub fn new(policy: EvictionPolicy, probe: Arc<dyn MemoryProbe>) -> Self {
        Self {
            inner: RwLock::new(CacheInner {
                root: CacheStore::new(),
                policy: PolicyState::from_policy(policy),
            }),
            probe,
        }
    }

    /// Create a cache around a migrated payload.
    ///
    /// Entering pressure-based eviction reinitializes every entry's
    /// bookkeeping: written in epoch 1, never read, accessed now. Entering
    /// no-eviction leaves the payload as-is; bookkeeping is simply never
    /// consulted again.
    pub(crate) fn with_payload(
        policy: EvictionPolicy,
        probe: Arc<dyn MemoryProbe>,
        mut payload: CacheStore<V>,
    ) -> Self {
        if matches!(policy, EvictionPolicy::PressureBased { .. }) {
            payload.reset_bookkeeping(Instant::now());
        }
        Self {
            inner: RwLock::new(CacheInner {
                root: payload,
                policy: PolicyState::from_policy(policy),
            }),
            probe,
        }
    }

    /// Look up `key` in the store for the given scope (`&[]` is the root).
    ///
    /// A hit stamps the entry as read in the current eviction epoch when the
    /// pressure policy is active.
    pub fn get(&self, scope: &[ScopeId], key: &CacheKey) -> Option<Arc<V>> {
        let mut inner = self.inner.write();
        let CacheInner { root, policy } = &mut *inner;
        let store = root.resolve_mut(scope)?;
        let entry = store.get_local_mut(key)?;
        if let PolicyState::PressureBased(evictor) = policy {
            entry.touch(evictor.generation());
        }
        Some(entry.value())
    }

    /// Store a computed value under `key` in the given scope.
    ///
    /// Creates or overwrites; any prior occurrence of the key elsewhere in
    /// the tree is displaced first, keeping a key in at most one store.
    /// `children` lists the keys that causally depend on this value.
    pub fn put(
        &self,
        scope: &[ScopeId],
        key: CacheKey,
        value: Arc<V>,
        children: impl IntoIterator<Item = CacheKey>,
    ) {
        let mut inner = self.inner.write();
        let CacheInner { root, policy } = &mut *inner;
        root.remove(&key);
        let generation = match policy {
            PolicyState::NoEviction => 0,
            PolicyState::PressureBased(evictor) => evictor.generation(),
        };
        let entry = CacheEntry::new(value, children.into_iter().collect(), generation);
        root.ensure_scope(scope).insert_local(key, entry);
    }

    /// Explicitly drop a stale key, wherever it lives. Returns whether an
    /// entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.inner.write().root.remove(key).is_some()
    }

    /// Create the subcache for an execution scope being entered.
    pub fn enter_scope(&self, path: &[ScopeId]) {
        self.inner.write().root.ensure_scope(path);
    }

    /// Destroy the subcache for an execution scope being exited, removing
    /// every key local to it. Returns the number of entries dropped.
    pub fn exit_scope(&self, path: &[ScopeId]) -> usize {
        let dropped = self.inner.write().root.drop_scope(path);
        if dropped > 0 {
            debug!(dropped, "scope exited, local entries removed");
        }
        dropped
    }

    /// One eviction poll. A no-op under the no-eviction policy.
    pub fn poll(&self) -> Result<PollOutcome, EvictError> {
        let mut inner = self.inner.write();
        let CacheInner { root, policy } = &mut *inner;
        match policy {
            PolicyState::NoEviction => Ok(PollOutcome::Idle),
            PolicyState::PressureBased(evictor) => evictor.poll(root, self.probe.as_ref()),
        }
    }

    /// Snapshot of the active policy (mode + threshold).
    pub fn policy(&self) -> EvictionPolicy {
        self.inner.read().policy.policy()
    }

    /// Adjust the pressure threshold without a mode switch. Returns whether
    /// it applied (false under no-eviction).
    pub fn set_headroom_gb(&self, headroom_gb: f64) -> bool {
        match &mut self.inner.write().policy {
            PolicyState::NoEviction => false,
            PolicyState::PressureBased(evictor) => {
                evictor.set_headroom_gb(headroom_gb);
                true
            }
        }
    }

    /// Number of live entries across all scopes.
    pub fn len(&self) -> usize {
        self.inner.read().root.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().root.is_empty()
    }

    /// Whether `key` is live in any scope.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.inner.read().root.contains(key)
    }

    /// Every live key, across all scopes.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.inner.read().root.iter().map(|(key, _)| *key).collect()
    }

    /// Bookkeeping snapshot for one entry, wherever it lives.
    pub fn entry_stats(&self, key: &CacheKey) -> Option<EntryStats> {
        self.inner.read().root.find(key).map(CacheEntry::stats)
    }

    /// Shallow snapshot of the store tree for migration: entry handles are
    /// cloned, values are shared, the source cache is left untouched. Fails
    /// with the offending key if the tree violates key uniqueness.
    pub(crate) fn snapshot_payload(&self) -> Result<CacheStore<V>, CacheKey> {
        let inner = self.inner.read();
        inner.root.verify_unique_keys()?;
        Ok(inner.root.clone())
    }

    /// The probe this cache was built with; migrations carry it forward.
    pub(crate) fn probe_handle(&self) -> Arc<dyn MemoryProbe> {
        Arc::clone(&self.probe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemoryProbe;

    fn key(tag: u8) -> CacheKey {
        CacheKey::from_digest([tag; 32])
    }

    fn pressure_cache(headroom_gb: f64, available_gb: f64) -> Cache<String> {
        Cache::new(
            EvictionPolicy::PressureBased { headroom_gb },
            Arc::new(FixedMemoryProbe::new(available_gb)),
        )
    }

    #[test]
    fn test_get_stamps_read_epoch_under_pressure() {
        let cache = pressure_cache(2.0, 0.5);
        cache.put(&[], key(1), Arc::new("a".into()), []);
        cache.put(&[], key(2), Arc::new("b".into()), []);

        // Pressured poll opens generation 2 and evicts the oldest; the
        // survivor read afterwards is stamped with the new epoch.
        // Probe stays low, so everything eligible goes.
        assert!(cache.poll().is_ok());
        assert!(cache.is_empty());

        cache.put(&[], key(3), Arc::new("c".into()), []);
        let stats = cache.entry_stats(&key(3)).unwrap();
        assert_eq!(stats.generation, 2);
        assert_eq!(stats.used_generation, 0);

        cache.get(&[], &key(3)).unwrap();
        let stats = cache.entry_stats(&key(3)).unwrap();
        assert_eq!(stats.used_generation, 2);
    }

    #[test]
    fn test_no_eviction_leaves_bookkeeping_alone() {
        let cache: Cache<String> = Cache::new(
            EvictionPolicy::NoEviction,
            Arc::new(FixedMemoryProbe::new(0.0)),
        );
        cache.put(&[], key(1), Arc::new("a".into()), []);
        cache.get(&[], &key(1)).unwrap();

        let stats = cache.entry_stats(&key(1)).unwrap();
        assert_eq!(stats.generation, 0);
        assert_eq!(stats.used_generation, 0);

        // No headroom at all, and still a no-op.
        assert_eq!(cache.poll(), Ok(PollOutcome::Idle));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_put_displaces_prior_occurrence() {
        let cache = pressure_cache(2.0, 8.0);
        let inner = [ScopeId::from("inner")];
        cache.put(&[], key(1), Arc::new("root".into()), []);
        cache.put(&inner, key(1), Arc::new("moved".into()), []);

        assert_eq!(cache.len(), 1);
        assert!(cache.get(&[], &key(1)).is_none());
        assert_eq!(cache.get(&inner, &key(1)).unwrap().as_str(), "moved");
    }

    #[test]
    fn test_scope_lifecycle() {
        let cache = pressure_cache(2.0, 8.0);
        let inner = [ScopeId::from("sub")];
        cache.enter_scope(&inner);
        cache.put(&inner, key(1), Arc::new("a".into()), []);
        cache.put(&[], key(2), Arc::new("b".into()), []);

        assert_eq!(cache.exit_scope(&inner), 1);
        assert!(!cache.contains(&key(1)));
        assert!(cache.contains(&key(2)));
    }

    #[test]
    fn test_set_headroom_only_applies_under_pressure_policy() {
        let cache = pressure_cache(2.0, 8.0);
        assert!(cache.set_headroom_gb(4.0));
        assert_eq!(
            cache.policy(),
            EvictionPolicy::PressureBased { headroom_gb: 4.0 }
        );

        let classic: Cache<String> = Cache::new(
            EvictionPolicy::NoEviction,
            Arc::new(FixedMemoryProbe::new(8.0)),
        );
        assert!(!classic.set_headroom_gb(4.0));
        assert_eq!(classic.policy(), EvictionPolicy::NoEviction);
    }
}
