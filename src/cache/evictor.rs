//! Generational eviction under memory pressure.
//!
//! Eviction rounds are numbered by a monotonic generation counter. Entries
//! are stamped with the generation active when last written (`generation`)
//! and last read (`used_generation`); a poll that finds headroom below the
//! threshold opens a new generation and discards entries in ascending
//! `(used_generation, last_access)` order until headroom recovers or nothing
//! eligible remains. Entries whose recorded dependents are still live are
//! never chosen — evicting leaves first unlocks their parents within the
//! same round.

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::key::CacheKey;
use crate::cache::store::CacheStore;
use crate::memory::MemoryProbe;

/// Eviction failure conditions. None of these are fatal to the host
/// pipeline; the cache stays fully usable.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictError {
    /// A full poll evicted nothing and `min_generation` had already caught
    /// up with `generation`. Reported so the controller can log it; the next
    /// poll simply retries.
    #[error(
        "eviction stalled at generation {generation}: no evictable entries \
         (min_generation {min_generation})"
    )]
    Stalled { generation: u64, min_generation: u64 },
}

/// Outcome of one pressure poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Headroom was already above the threshold, or the active policy never
    /// evicts. No side effects.
    Idle,
    /// Enough entries were discarded to bring headroom back over the
    /// threshold.
    Relieved { evicted: usize },
    /// Some entries were discarded but no eligible candidate remained before
    /// headroom recovered. Best-effort: partial progress, not an error.
    Exhausted { evicted: usize },
}

/// Decides which entries to discard when free RAM falls below the threshold.
pub struct GenerationalEvictor {
    generation: u64,
    min_generation: u64,
    headroom_gb: f64,
}

impl GenerationalEvictor {
    pub fn new(headroom_gb: f64) -> Self {
        Self {
            generation: 1,
            min_generation: 0,
            headroom_gb,
        }
    }

    /// The current eviction epoch. New writes are stamped with this.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The oldest epoch still tracked by candidate selection.
    pub fn min_generation(&self) -> u64 {
        self.min_generation
    }

    /// The configured headroom threshold, in gigabytes.
    pub fn headroom_gb(&self) -> f64 {
        self.headroom_gb
    }

    /// Adjust the threshold without a mode switch.
    pub fn set_headroom_gb(&mut self, headroom_gb: f64) {
        self.headroom_gb = headroom_gb;
    }

    /// One eviction poll over the flattened store tree.
    ///
    /// The common case — headroom above the threshold — returns after a
    /// single probe read with no side effects. Under pressure, candidates
    /// are removed one at a time with a re-probe after each removal, so a
    /// poll never discards more than pressure demands.
    pub fn poll<V>(
        &mut self,
        store: &mut CacheStore<V>,
        probe: &dyn MemoryProbe,
    ) -> Result<PollOutcome, EvictError> {
        let available = probe.available_gb();
        if available >= self.headroom_gb {
            return Ok(PollOutcome::Idle);
        }

        self.generation += 1;
        debug!(
            generation = self.generation,
            available_gb = available,
            threshold_gb = self.headroom_gb,
            entries = store.len(),
            "memory pressure, starting eviction round"
        );

        let mut evicted = 0usize;
        loop {
            if probe.available_gb() >= self.headroom_gb {
                info!(
                    evicted,
                    generation = self.generation,
                    "eviction round relieved memory pressure"
                );
                return Ok(PollOutcome::Relieved { evicted });
            }

            match self.select_candidate(store) {
                Some(key) => {
                    store.remove(&key);
                    evicted += 1;
                    debug!(key = %key, generation = self.generation, "evicted entry");
                }
                None => {
                    if self.min_generation < self.generation {
                        // A pass with no progress unlocks the oldest tracked
                        // epoch and re-scans, bounded by the current
                        // generation.
                        self.min_generation += 1;
                        continue;
                    }
                    if evicted == 0 {
                        warn!(
                            generation = self.generation,
                            entries = store.len(),
                            "eviction stalled, nothing eligible"
                        );
                        return Err(EvictError::Stalled {
                            generation: self.generation,
                            min_generation: self.min_generation,
                        });
                    }
                    info!(
                        evicted,
                        generation = self.generation,
                        remaining = store.len(),
                        "no eligible entries left, pressure unrelieved"
                    );
                    return Ok(PollOutcome::Exhausted { evicted });
                }
            }
        }
    }

    /// Pick the next victim: smallest `(used_generation, last_access)` among
    /// entries of a tracked epoch whose recorded children are all gone.
    ///
    /// Re-run after every removal — evicting a child can turn its parent
    /// into a leaf within the same round.
    fn select_candidate<V>(&self, store: &CacheStore<V>) -> Option<CacheKey> {
        let mut best: Option<(u64, Instant, CacheKey)> = None;
        for (key, entry) in store.iter() {
            if entry.generation() < self.min_generation {
                continue;
            }
            if entry.children().iter().any(|child| store.contains(child)) {
                continue;
            }
            let rank = (entry.used_generation(), entry.last_access());
            let better = match &best {
                None => true,
                Some((used, access, _)) => rank < (*used, *access),
            };
            if better {
                best = Some((rank.0, rank.1, *key));
            }
        }
        best.map(|(_, _, key)| key)
    }
}
