//! Operator-facing configuration.
//!
//! Configuration can be loaded from a JSON file or constructed
//! programmatically. The threshold bounds match the operator knob: headroom
//! figures are gigabytes of free RAM to maintain.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cache::policy::{CacheMode, EvictionPolicy};

/// Smallest accepted headroom threshold, in gigabytes.
pub const MIN_HEADROOM_GB: f64 = 0.1;

/// Largest accepted headroom threshold, in gigabytes.
pub const MAX_HEADROOM_GB: f64 = 256.0;

/// Threshold applied when none was ever configured.
pub const DEFAULT_HEADROOM_GB: f64 = 2.0;

/// Purge target used by force-cleanup when none is given. High enough to be
/// unreachable on ordinary hosts, which turns the purge into "evict
/// everything eligible".
pub const DEFAULT_PURGE_HEADROOM_GB: f64 = 256.0;

/// Top-level cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Eviction mode to run the pipeline cache in.
    pub mode: CacheMode,

    /// Minimum free RAM to maintain under pressure eviction, in GB.
    pub headroom_gb: f64,

    /// Headroom target for force-cleanup deep purges, in GB.
    pub purge_headroom_gb: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            mode: CacheMode::PressureBased,
            headroom_gb: DEFAULT_HEADROOM_GB,
            purge_headroom_gb: DEFAULT_PURGE_HEADROOM_GB,
        }
    }
}

impl CacheConfig {
    /// Load configuration from a JSON file, falling back to defaults when
    /// the file is missing.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: CacheConfig = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("config file not found at {:?}, using defaults", path);
            Ok(CacheConfig::default())
        }
    }

    /// The eviction policy this configuration selects, with the threshold
    /// clamped to the accepted bounds.
    pub fn policy(&self) -> EvictionPolicy {
        match self.mode {
            CacheMode::NoEviction => EvictionPolicy::NoEviction,
            CacheMode::PressureBased => EvictionPolicy::PressureBased {
                headroom_gb: clamp_headroom(self.headroom_gb),
            },
        }
    }
}

/// Clamp an operator-supplied threshold to the accepted bounds.
pub fn clamp_headroom(headroom_gb: f64) -> f64 {
    headroom_gb.clamp(MIN_HEADROOM_GB, MAX_HEADROOM_GB)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CacheConfig::default();
        assert_eq!(config.mode, CacheMode::PressureBased);
        assert_eq!(config.headroom_gb, DEFAULT_HEADROOM_GB);
        assert_eq!(config.purge_headroom_gb, DEFAULT_PURGE_HEADROOM_GB);
    }

    #[test]
    fn test_clamp_headroom_bounds() {
        assert_eq!(clamp_headroom(0.0), MIN_HEADROOM_GB);
        assert_eq!(clamp_headroom(2.0), 2.0);
        assert_eq!(clamp_headroom(1024.0), MAX_HEADROOM_GB);
    }

    #[test]
    fn test_policy_from_config() {
        let config = CacheConfig {
            mode: CacheMode::PressureBased,
            headroom_gb: 0.01,
            ..Default::default()
        };
        assert_eq!(
            config.policy(),
            EvictionPolicy::PressureBased {
                headroom_gb: MIN_HEADROOM_GB
            }
        );

        let classic = CacheConfig {
            mode: CacheMode::NoEviction,
            ..Default::default()
        };
        assert_eq!(classic.policy(), EvictionPolicy::NoEviction);
    }
}
