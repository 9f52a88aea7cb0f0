//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with the metadata
//! needed by expiration and eviction.

// == Cache Entry ==
/// Represents a single cache entry with value and metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Time the entry was stored (clock milliseconds)
    pub created_at: u64,
    /// Time of the last read or write (clock milliseconds)
    pub last_accessed_at: u64,
    /// Number of successful reads since the entry was stored
    pub access_count: u64,
    /// Logical insertion order, unique per store
    pub created_tick: u64,
    /// Logical access order, unique per store
    pub accessed_tick: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a fresh entry stored at `now` with logical order `tick`.
    pub fn new(value: V, now: u64, tick: u64) -> Self {
        Self {
            value,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
            created_tick: tick,
            accessed_tick: tick,
        }
    }

    // == Touch ==
    /// Records a successful read.
    pub fn touch(&mut self, now: u64, tick: u64) {
        self.last_accessed_at = now;
        self.accessed_tick = tick;
        self.access_count += 1;
    }

    /// Milliseconds since the entry was stored.
    pub fn age_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.created_at)
    }

    /// Milliseconds since the entry was last read or written.
    pub fn idle_ms(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_accessed_at)
    }
}
