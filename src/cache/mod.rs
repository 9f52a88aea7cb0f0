//! Cache Module
//!
//! Provides in-memory caching with TTL/TTI expiration, pluggable eviction
//! and a blocking wrapper that serializes population of missing keys.

mod blocking;
mod clock;
mod engine;
mod entry;
mod eviction;
mod expiration;
mod stats;
mod store;


// Re-export public types
pub use blocking::BlockingCache;
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::Cache;
pub use entry::CacheEntry;
pub use eviction::{
    EvictionPolicy, EvictionStrategy, FirstInFirstOut, LeastFrequentlyUsed, LeastRecentlyUsed,
};
pub use expiration::is_expired;
pub use stats::CacheStats;
pub use store::{EntryStore, Lookup};
