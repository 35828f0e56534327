//! ram-pressure-cache: switchable result cache for graph execution
//! pipelines.
//!
//! A computation-result cache with two interchangeable eviction strategies:
//! classic no-eviction (entries live until the pipeline invalidates them)
//! and generational eviction under RAM pressure. A populated cache can be
//! migrated between the two strategies while the pipeline keeps reading and
//! writing — no pause, no loss of computed values.
//!
//! - [`cache`]: keys, entries, per-scope stores, the generational evictor
//!   and the cache handle
//! - [`switch`]: the active-cache registry and live policy migration
//! - [`control`]: the in-process operator surface
//! - [`config`]: operator configuration
//! - [`memory`]: free-RAM probing

pub mod cache;
pub mod config;
pub mod control;
pub mod memory;
pub mod switch;
