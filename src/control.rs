//! In-process operator control surface.
//!
//! Two operator actions: apply a cache mode + headroom threshold, and force
//! a deep cleanup that purges aggressively and then restores the prior
//! mode and threshold. No wire protocol — the controller calls these
//! directly, on its own cadence.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::policy::{CacheMode, EvictionPolicy};
use crate::config::{clamp_headroom, DEFAULT_HEADROOM_GB};
use crate::switch::registry::CacheRegistry;
use crate::switch::switcher::{CacheSwitcher, SwitchError};

/// Operator surface over a registry and its switcher.
pub struct CacheControl<V> {
    registry: Arc<CacheRegistry<V>>,
    switcher: CacheSwitcher<V>,
}

impl<V> CacheControl<V> {
    pub fn new(registry: Arc<CacheRegistry<V>>) -> Self {
        Self {
            switcher: CacheSwitcher::new(Arc::clone(&registry)),
            registry,
        }
    }

    /// Apply a cache mode and headroom threshold.
    ///
    /// The threshold is clamped to the operator bounds. Requesting the mode
    /// that is already active updates only the threshold; in pressure mode
    /// every invocation also runs one poll, so an operator re-applying the
    /// current settings still gets pressure handled now.
    pub fn apply(&self, mode: CacheMode, headroom_gb: f64) -> Result<(), SwitchError> {
        let headroom = clamp_headroom(headroom_gb);
        let prior_mode = self.registry.active().map(|cache| cache.policy().mode());

        let target = match mode {
            CacheMode::NoEviction => EvictionPolicy::NoEviction,
            CacheMode::PressureBased => EvictionPolicy::PressureBased {
                headroom_gb: headroom,
            },
        };

        if let Err(err) = self.switcher.switch(target) {
            warn!(error = %err, "cache control left prior state untouched");
            return Err(err);
        }

        match (prior_mode, mode) {
            (Some(CacheMode::PressureBased), CacheMode::PressureBased) => {
                // No migration happened, so no post-switch poll ran either;
                // poll here so this invocation still reacts to pressure.
                if let Some(cache) = self.registry.active() {
                    if let Err(err) = cache.poll() {
                        warn!(error = %err, "poll after threshold update");
                    }
                }
            }
            (Some(prior), current) if prior != current => {
                info!(from = %prior, to = %current, headroom_gb = headroom, "cache mode applied");
            }
            _ => {}
        }
        Ok(())
    }

    /// Force a deep purge: temporarily applies pressure eviction with the
    /// given (usually unreachable) headroom target, lets the purge run, then
    /// restores the prior mode and threshold.
    pub fn force_cleanup(&self, purge_headroom_gb: f64) -> Result<(), SwitchError> {
        let prior = match self.registry.active() {
            Some(cache) => cache.policy(),
            None => {
                warn!("force cleanup skipped, no active cache");
                return Err(SwitchError::NoActiveCache);
            }
        };

        let purge = clamp_headroom(purge_headroom_gb);
        info!(purge_gb = purge, "forcing deep cache cleanup");
        self.apply(CacheMode::PressureBased, purge)?;

        let (prior_mode, prior_headroom) = match prior {
            EvictionPolicy::NoEviction => (CacheMode::NoEviction, DEFAULT_HEADROOM_GB),
            EvictionPolicy::PressureBased { headroom_gb } => {
                (CacheMode::PressureBased, headroom_gb)
            }
        };
        self.apply(prior_mode, prior_headroom)
    }
}
