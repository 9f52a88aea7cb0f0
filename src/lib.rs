//! Mini Ehcache - An in-memory key/value cache engine
//!
//! Provides get/put/remove/clear with size accounting, TTL/TTI expiration,
//! LRU/FIFO/LFU eviction under a capacity bound, and a blocking wrapper that
//! lets only one caller populate a missing key at a time.

pub mod cache;
pub mod config;
pub mod error;
pub mod tasks;

pub use cache::{BlockingCache, Cache, CacheStats, EvictionStrategy};
pub use config::CacheConfiguration;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
