//! Entry Store Module
//!
//! Concurrent key to entry mapping. Operations on one key are mutually
//! exclusive; operations on keys in different shards run in parallel.

use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::cache::CacheEntry;

/// Outcome of a read that also checks expiration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Hit(V),
    Expired,
    Miss,
}

// == Entry Store ==
/// Sharded storage of cache entries with logical access ordering.
#[derive(Debug)]
pub struct EntryStore<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    /// Source of logical insertion/access ticks
    ticks: AtomicU64,
}

impl<K, V> EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            ticks: AtomicU64::new(0),
        }
    }

    fn next_tick(&self) -> u64 {
        self.ticks.fetch_add(1, Ordering::Relaxed) + 1
    }

    // == Put ==
    /// Inserts or replaces an entry, resetting its timestamps to `now`.
    ///
    /// Returns the logical insertion tick of the new entry.
    pub fn put(&self, key: K, value: V, now: u64) -> u64 {
        let tick = self.next_tick();
        self.entries.insert(key, CacheEntry::new(value, now, tick));
        tick
    }

    // == Get ==
    /// Returns the value and records the access, or `None` on a miss.
    pub fn get(&self, key: &K, now: u64) -> Option<V> {
        match self.get_unless(key, now, |_| false) {
            Lookup::Hit(value) => Some(value),
            _ => None,
        }
    }

    /// Reads `key`, removing it instead if `is_expired` holds for it.
    ///
    /// The access is recorded only on a hit, so an expired entry never
    /// has its idle clock reset by the read that discovers it.
    pub fn get_unless<F>(&self, key: &K, now: u64, is_expired: F) -> Lookup<V>
    where
        F: Fn(&CacheEntry<V>) -> bool,
    {
        let expired_tick = match self.entries.get_mut(key) {
            None => return Lookup::Miss,
            Some(mut entry) => {
                if is_expired(&*entry) {
                    entry.created_tick
                } else {
                    let tick = self.next_tick();
                    entry.touch(now, tick);
                    return Lookup::Hit(entry.value.clone());
                }
            }
        };

        // Guard dropped; a concurrent put may have replaced the entry meanwhile
        if self.remove_if_tick(key, expired_tick) {
            Lookup::Expired
        } else {
            Lookup::Miss
        }
    }

    /// Looks at an entry without recording an access.
    pub fn peek<R>(&self, key: &K, f: impl FnOnce(&CacheEntry<V>) -> R) -> Option<R> {
        self.entries.get(key).map(|entry| f(&*entry))
    }

    // == Remove ==
    /// Deletes an entry, reporting whether one was present.
    pub fn remove(&self, key: &K) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Deletes `key` only if it still holds the entry stored at `created_tick`.
    pub fn remove_if_tick(&self, key: &K, created_tick: u64) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.created_tick == created_tick)
            .is_some()
    }

    // == Clear ==
    pub fn clear(&self) {
        self.entries.clear();
    }

    // == Length ==
    /// Raw entry count, including entries not yet checked for expiration.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // == Find Victim ==
    /// Finds the entry with the lowest rank, skipping `exclude`.
    ///
    /// Returns the key and its insertion tick so the caller can remove
    /// exactly that entry.
    pub fn find_min_by<R, F>(&self, exclude: &K, rank: F) -> Option<(K, u64)>
    where
        R: Ord,
        F: Fn(&CacheEntry<V>) -> R,
    {
        let mut best: Option<(R, K, u64)> = None;

        for item in self.entries.iter() {
            if item.key() == exclude {
                continue;
            }
            let candidate = rank(item.value());
            if best.as_ref().map_or(true, |(lowest, _, _)| candidate < *lowest) {
                best = Some((candidate, item.key().clone(), item.value().created_tick));
            }
        }

        best.map(|(_, key, tick)| (key, tick))
    }

    /// Deletes `key` if `predicate` still holds for its entry.
    pub fn remove_where<F>(&self, key: &K, predicate: F) -> bool
    where
        F: Fn(&CacheEntry<V>) -> bool,
    {
        self.entries
            .remove_if(key, |_, entry| predicate(entry))
            .is_some()
    }

    // == Collect Matching ==
    /// Keys of all entries satisfying `predicate`.
    ///
    /// Shard locks are released before returning.
    pub fn collect_matching<F>(&self, predicate: F) -> Vec<K>
    where
        F: Fn(&CacheEntry<V>) -> bool,
    {
        self.entries
            .iter()
            .filter(|item| predicate(item.value()))
            .map(|item| item.key().clone())
            .collect()
    }
}

impl<K, V> Default for EntryStore<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
