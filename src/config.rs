//! Configuration Module
//!
//! Per-cache expiration and capacity settings, loadable from environment variables.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::EvictionStrategy;
use crate::error::{CacheError, Result};

/// Expiration and capacity settings for a single cache instance.
///
/// A value of `0` disables the corresponding bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfiguration {
    /// Maximum age of an entry since it was stored, in seconds
    pub time_to_live_seconds: u32,
    /// Maximum time since the last read or write of an entry, in seconds
    pub time_to_idle_seconds: u32,
    /// Maximum number of entries held in memory
    pub max_entries: u32,
    /// Victim selection strategy used when `max_entries` is exceeded
    pub eviction_strategy: EvictionStrategy,
}

impl CacheConfiguration {
    /// Creates a configuration by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TIME_TO_LIVE_SECONDS` - TTL in seconds (default: 120)
    /// - `CACHE_TIME_TO_IDLE_SECONDS` - TTI in seconds (default: 120)
    /// - `CACHE_MAX_ENTRIES` - Capacity, 0 = unbounded (default: 0)
    /// - `CACHE_EVICTION_POLICY` - `LRU`, `FIFO` or `LFU` (default: LRU)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            time_to_live_seconds: env_or("CACHE_TIME_TO_LIVE_SECONDS", defaults.time_to_live_seconds),
            time_to_idle_seconds: env_or("CACHE_TIME_TO_IDLE_SECONDS", defaults.time_to_idle_seconds),
            max_entries: env_or("CACHE_MAX_ENTRIES", defaults.max_entries),
            eviction_strategy: env_or("CACHE_EVICTION_POLICY", defaults.eviction_strategy),
        }
    }

    /// Returns `true` when a capacity bound is configured.
    pub fn is_bounded(&self) -> bool {
        self.max_entries > 0
    }
}

impl Default for CacheConfiguration {
    fn default() -> Self {
        Self {
            time_to_live_seconds: 120,
            time_to_idle_seconds: 120,
            max_entries: 0,
            eviction_strategy: EvictionStrategy::Lru,
        }
    }
}

/// Validates a runtime setting, rejecting negative or oversized values.
pub(crate) fn checked_setting(name: &str, value: i64) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        CacheError::InvalidConfiguration(format!(
            "{} must be between 0 and {}, got {}",
            name,
            u32::MAX,
            value
        ))
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring unparsable {}={:?}, using default", name, raw);
            default
        }),
        Err(_) => default,
    }
}
