//! Eviction Module
//!
//! Victim selection strategies applied when a cache exceeds its capacity.
//! Every policy maps an entry to a rank; the entry with the lowest rank
//! is evicted first.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::CacheEntry;
use crate::error::CacheError;

/// Orders entries for eviction. Lower ranks are evicted first.
pub trait EvictionPolicy {
    /// Short policy name, as accepted by [`EvictionStrategy::from_str`].
    fn name(&self) -> &'static str;

    /// Eviction rank of `entry`.
    fn victim_rank<V>(&self, entry: &CacheEntry<V>) -> (u64, u64);
}

// == LRU ==
/// Evicts the entry with the oldest last access.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastRecentlyUsed;

impl EvictionPolicy for LeastRecentlyUsed {
    fn name(&self) -> &'static str {
        "LRU"
    }

    fn victim_rank<V>(&self, entry: &CacheEntry<V>) -> (u64, u64) {
        (entry.accessed_tick, 0)
    }
}

// == FIFO ==
/// Evicts the entry that was stored first.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstInFirstOut;

impl EvictionPolicy for FirstInFirstOut {
    fn name(&self) -> &'static str {
        "FIFO"
    }

    fn victim_rank<V>(&self, entry: &CacheEntry<V>) -> (u64, u64) {
        (entry.created_tick, 0)
    }
}

// == LFU ==
/// Evicts the entry read the fewest times, oldest first on ties.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeastFrequentlyUsed;

impl EvictionPolicy for LeastFrequentlyUsed {
    fn name(&self) -> &'static str {
        "LFU"
    }

    fn victim_rank<V>(&self, entry: &CacheEntry<V>) -> (u64, u64) {
        (entry.access_count, entry.created_tick)
    }
}

// == Eviction Strategy ==
/// Configurable choice among the built-in policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EvictionStrategy {
    #[default]
    #[serde(rename = "LRU")]
    Lru,
    #[serde(rename = "FIFO")]
    Fifo,
    #[serde(rename = "LFU")]
    Lfu,
}

impl EvictionStrategy {
    /// Eviction rank of `entry` under this strategy.
    pub fn victim_rank<V>(&self, entry: &CacheEntry<V>) -> (u64, u64) {
        match self {
            EvictionStrategy::Lru => LeastRecentlyUsed.victim_rank(entry),
            EvictionStrategy::Fifo => FirstInFirstOut.victim_rank(entry),
            EvictionStrategy::Lfu => LeastFrequentlyUsed.victim_rank(entry),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EvictionStrategy::Lru => LeastRecentlyUsed.name(),
            EvictionStrategy::Fifo => FirstInFirstOut.name(),
            EvictionStrategy::Lfu => LeastFrequentlyUsed.name(),
        }
    }
}

impl FromStr for EvictionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LRU" => Ok(EvictionStrategy::Lru),
            "FIFO" => Ok(EvictionStrategy::Fifo),
            "LFU" => Ok(EvictionStrategy::Lfu),
            _ => Err(CacheError::InvalidConfiguration(format!(
                "Unknown eviction policy: {:?} (expected LRU, FIFO or LFU)",
                s
            ))),
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
