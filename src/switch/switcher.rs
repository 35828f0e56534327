//! Live migration between eviction policies.
//!
//! The switcher moves a populated cache's raw payload — the entry mapping
//! and subcache tree — from one policy's bookkeeping to another's without a
//! visible pause and without losing computed values. The replacement cache
//! is constructed entirely off the shared reference; the publish step is one
//! reference swap in the registry.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::hierarchical::Cache;
use crate::cache::key::CacheKey;
use crate::cache::policy::EvictionPolicy;
use crate::config::MIN_HEADROOM_GB;
use crate::switch::registry::CacheRegistry;

/// Switch failures. All non-fatal: every failure path leaves the previously
/// active cache fully intact and registered.
#[derive(Error, Debug)]
pub enum SwitchError {
    /// No cache is registered as active.
    #[error("no active cache is registered")]
    NoActiveCache,
    /// The payload failed its integrity check: `key` is present in more
    /// than one store of the tree.
    #[error("active cache payload is incompatible: key {key} is present in more than one store")]
    IncompatiblePayload { key: CacheKey },
    /// The requested threshold is not a usable headroom figure.
    #[error("headroom threshold {0} GB is below the minimum of {MIN_HEADROOM_GB} GB")]
    InvalidThreshold(f64),
}

/// Performs live policy switches against a registry.
pub struct CacheSwitcher<V> {
    registry: Arc<CacheRegistry<V>>,
}

impl<V> CacheSwitcher<V> {
    pub fn new(registry: Arc<CacheRegistry<V>>) -> Self {
        Self { registry }
    }

    /// Switch the active cache to `target`.
    ///
    /// Idempotent: requesting the mode that is already active updates only
    /// the threshold (if changed) and migrates nothing. A real switch
    /// re-attaches the raw payload by reference — values are shared, never
    /// copied — rebuilds policy bookkeeping from scratch, publishes the
    /// replacement atomically, and, when the target evicts under pressure,
    /// polls once immediately so a switch under existing pressure reacts
    /// without waiting for the next scheduled poll.
    pub fn switch(&self, target: EvictionPolicy) -> Result<(), SwitchError> {
        if let EvictionPolicy::PressureBased { headroom_gb } = target {
            if !headroom_gb.is_finite() || headroom_gb < MIN_HEADROOM_GB {
                return Err(SwitchError::InvalidThreshold(headroom_gb));
            }
        }

        let active = self.registry.active().ok_or(SwitchError::NoActiveCache)?;
        let current = active.policy();

        if current.mode() == target.mode() {
            if let (
                EvictionPolicy::PressureBased { headroom_gb: old },
                EvictionPolicy::PressureBased { headroom_gb: new },
            ) = (current, target)
            {
                if old != new {
                    active.set_headroom_gb(new);
                    info!(old_gb = old, new_gb = new, "updated headroom threshold");
                }
            }
            return Ok(());
        }

        // Build the replacement entirely off the shared reference.
        let payload = active
            .snapshot_payload()
            .map_err(|key| SwitchError::IncompatiblePayload { key })?;
        let migrated = payload.len();
        let replacement = Arc::new(Cache::with_payload(
            target,
            active.probe_handle(),
            payload,
        ));

        // Publish: one reference swap. In-flight readers keep the old
        // instance; the old cache is never touched again from here.
        self.registry.register(Arc::clone(&replacement));
        info!(
            from = %current.mode(),
            to = %target.mode(),
            entries = migrated,
            "switched cache policy"
        );

        if matches!(target, EvictionPolicy::PressureBased { .. }) {
            match replacement.poll() {
                Ok(outcome) => debug!(?outcome, "post-switch poll"),
                Err(err) => warn!(error = %err, "post-switch poll made no progress"),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::FixedMemoryProbe;

    fn key(tag: u8) -> CacheKey {
        CacheKey::from_digest([tag; 32])
    }

    fn registry_with_cache(
        policy: EvictionPolicy,
        available_gb: f64,
    ) -> Arc<CacheRegistry<String>> {
        let registry = Arc::new(CacheRegistry::new());
        registry.register(Arc::new(Cache::new(
            policy,
            Arc::new(FixedMemoryProbe::new(available_gb)),
        )));
        registry
    }

    #[test]
    fn test_switch_without_registration_fails() {
        let registry: Arc<CacheRegistry<String>> = Arc::new(CacheRegistry::new());
        let switcher = CacheSwitcher::new(registry);
        assert!(matches!(
            switcher.switch(EvictionPolicy::NoEviction),
            Err(SwitchError::NoActiveCache)
        ));
    }

    #[test]
    fn test_rejects_unusable_threshold() {
        let registry = registry_with_cache(EvictionPolicy::NoEviction, 8.0);
        let before = registry.active().unwrap();
        let switcher = CacheSwitcher::new(Arc::clone(&registry));

        for bad in [0.05, -1.0, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                switcher.switch(EvictionPolicy::PressureBased { headroom_gb: bad }),
                Err(SwitchError::InvalidThreshold(_))
            ));
        }
        // The active instance was not replaced.
        assert!(Arc::ptr_eq(&registry.active().unwrap(), &before));
    }

    #[test]
    fn test_idempotent_switch_updates_threshold_only() {
        let registry = registry_with_cache(
            EvictionPolicy::PressureBased { headroom_gb: 2.0 },
            8.0,
        );
        let before = registry.active().unwrap();
        before.put(&[], key(1), Arc::new("a".into()), []);

        let switcher = CacheSwitcher::new(Arc::clone(&registry));
        switcher
            .switch(EvictionPolicy::PressureBased { headroom_gb: 4.0 })
            .unwrap();

        let after = registry.active().unwrap();
        assert!(Arc::ptr_eq(&after, &before));
        assert_eq!(
            after.policy(),
            EvictionPolicy::PressureBased { headroom_gb: 4.0 }
        );
        assert_eq!(after.len(), 1);
    }
}
