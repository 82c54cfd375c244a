//! Caching subsystem.
//!
//! Two caches:
//!
//! - [`CacheStore`]: the shared, namespaced TTL store in front of every
//!   upstream source and the reasoning aggregator. Bounded, insertion-order
//!   eviction, optional JSON persistence. See [`key`] for the key format.
//!
//! - [`HealthCache`]: a small moka-backed memo of per-tool health reports,
//!   owned by the [`Orchestrator`](crate::Orchestrator).

mod clock;
mod entry;
mod health;
pub mod key;
mod persist;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use entry::{CacheEntry, CachePayload, EntrySummary, Namespace};
pub use health::{HealthCache, HealthCacheConfig};
pub use key::{fingerprint, generate_key};
pub use store::{CacheConfig, CacheCounters, CacheStats, CacheStore};
