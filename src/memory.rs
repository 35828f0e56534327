//! Free-RAM probing.
//!
//! The cache never measures memory itself: pressure decisions consume an
//! injected [`MemoryProbe`] capability that reports a single headroom figure
//! in the same unit as the configured thresholds (gigabytes).

use parking_lot::Mutex;
use sysinfo::System;

const BYTES_PER_GIB: f64 = (1024u64 * 1024 * 1024) as f64;

/// Capability to query the host's current free-RAM headroom.
pub trait MemoryProbe: Send + Sync {
    /// Currently available RAM, in gigabytes.
    fn available_gb(&self) -> f64;
}

/// `sysinfo`-backed probe.
///
/// The `System` instance is built once and reused — recreating it per call
/// is the expensive part. Each reading refreshes the memory tables only, so
/// an eviction loop that re-probes after every removal sees fresh figures.
pub struct SystemMemoryProbe {
    system: Mutex<System>,
}

impl SystemMemoryProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }
}

impl Default for SystemMemoryProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SystemMemoryProbe {
    fn available_gb(&self) -> f64 {
        let mut system = self.system.lock();
        system.refresh_memory();
        system.available_memory() as f64 / BYTES_PER_GIB
    }
}

/// Probe reporting a settable fixed figure. For tests, simulations and
/// benches.
pub struct FixedMemoryProbe {
    available_gb: Mutex<f64>,
}

impl FixedMemoryProbe {
    pub fn new(available_gb: f64) -> Self {
        Self {
            available_gb: Mutex::new(available_gb),
        }
    }

    pub fn set(&self, available_gb: f64) {
        *self.available_gb.lock() = available_gb;
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn available_gb(&self) -> f64 {
        *self.available_gb.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_probe_reports_sane_figure() {
        let probe = SystemMemoryProbe::new();
        let available = probe.available_gb();
        assert!(available.is_finite());
        assert!(available >= 0.0);
    }

    #[test]
    fn test_fixed_probe_is_settable() {
        let probe = FixedMemoryProbe::new(4.0);
        assert_eq!(probe.available_gb(), 4.0);
        probe.set(0.5);
        assert_eq!(probe.available_gb(), 0.5);
    }
}
