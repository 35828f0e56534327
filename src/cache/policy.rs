//! Eviction policy variants.
//!
//! The two strategies are modeled as one closed sum type with policy-specific
//! payloads and matched exhaustively everywhere — a cache is never probed for
//! the presence of bookkeeping fields to learn its mode.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cache::evictor::GenerationalEvictor;

/// The externally visible eviction policy of a cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum EvictionPolicy {
    /// Entries live until explicitly invalidated by the owning pipeline.
    /// The safest mode for correctness-critical runs.
    NoEviction,
    /// Evict under memory pressure, keeping at least `headroom_gb` of RAM
    /// free. The threshold is adjustable at runtime without a mode switch.
    PressureBased { headroom_gb: f64 },
}

impl EvictionPolicy {
    pub fn mode(&self) -> CacheMode {
        match self {
            EvictionPolicy::NoEviction => CacheMode::NoEviction,
            EvictionPolicy::PressureBased { .. } => CacheMode::PressureBased,
        }
    }

    /// The configured headroom threshold, if the policy has one.
    pub fn headroom_gb(&self) -> Option<f64> {
        match self {
            EvictionPolicy::NoEviction => None,
            EvictionPolicy::PressureBased { headroom_gb } => Some(*headroom_gb),
        }
    }
}

/// Policy discriminant, as selected by an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    NoEviction,
    PressureBased,
}

impl fmt::Display for CacheMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMode::NoEviction => f.write_str("no-eviction"),
            CacheMode::PressureBased => f.write_str("ram-pressure"),
        }
    }
}

/// The policy state attached to a live cache. `PressureBased` carries the
/// evictor and its generation counters; they are policy-private and are
/// rebuilt, never migrated, when the policy changes.
pub(crate) enum PolicyState {
    NoEviction,
    PressureBased(GenerationalEvictor),
}

impl PolicyState {
    pub(crate) fn from_policy(policy: EvictionPolicy) -> Self {
        match policy {
            EvictionPolicy::NoEviction => PolicyState::NoEviction,
            EvictionPolicy::PressureBased { headroom_gb } => {
                PolicyState::PressureBased(GenerationalEvictor::new(headroom_gb))
            }
        }
    }

    /// Snapshot of mode + threshold.
    pub(crate) fn policy(&self) -> EvictionPolicy {
        match self {
            PolicyState::NoEviction => EvictionPolicy::NoEviction,
            PolicyState::PressureBased(evictor) => EvictionPolicy::PressureBased {
                headroom_gb: evictor.headroom_gb(),
            },
        }
    }
}
