//! Cache Engine Module
//!
//! Thread-safe cache combining the entry store with expiration checks and
//! capacity-driven eviction. Every operation re-reads the current
//! configuration, so runtime changes apply to the next call.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::cache::expiration::is_expired;
use crate::cache::stats::StatsRecorder;
use crate::cache::store::{EntryStore, Lookup};
use crate::cache::{CacheEntry, CacheStats, Clock, EvictionStrategy, SystemClock};
use crate::config::{checked_setting, CacheConfiguration};
use crate::error::{CacheError, Result};

// == Cache ==
/// In-memory key/value cache identified by a string id.
///
/// Two caches are equal when their ids are equal, regardless of content.
pub struct Cache<K, V>
where
    K: Eq + Hash,
{
    id: String,
    store: EntryStore<K, V>,
    config: RwLock<CacheConfiguration>,
    clock: Arc<dyn Clock>,
    stats: StatsRecorder,
    /// Serializes victim selection across concurrent writers
    eviction: Mutex<()>,
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructors ==
    /// Creates a cache with the default configuration.
    ///
    /// Fails with [`CacheError::InvalidArgument`] when `id` is empty.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Self::with_configuration(id, CacheConfiguration::default())
    }

    /// Creates a cache with an explicit configuration.
    pub fn with_configuration(id: impl Into<String>, config: CacheConfiguration) -> Result<Self> {
        Self::with_clock(id, config, Arc::new(SystemClock::new()))
    }

    /// Creates a cache reading time from `clock`.
    pub fn with_clock(
        id: impl Into<String>,
        config: CacheConfiguration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(CacheError::InvalidArgument(
                "Cache instances require an ID".to_string(),
            ));
        }

        info!(
            "Cache {} created: ttl={}s, tti={}s, max_entries={}, eviction={}",
            id,
            config.time_to_live_seconds,
            config.time_to_idle_seconds,
            config.max_entries,
            config.eviction_strategy
        );

        Ok(Self {
            id,
            store: EntryStore::new(),
            config: RwLock::new(config),
            clock,
            stats: StatsRecorder::default(),
            eviction: Mutex::new(()),
        })
    }

    // == Id ==
    /// Identifier this cache was constructed with.
    pub fn id(&self) -> &str {
        &self.id
    }

    // == Put ==
    /// Stores a value, replacing any previous entry for `key`.
    ///
    /// When a capacity bound is set and exceeded, other entries are
    /// evicted until the cache is back within bounds. The entry just
    /// written is never chosen as the victim.
    pub fn put_object(&self, key: K, value: V) {
        let config = self.configuration();
        let now = self.clock.now_ms();

        if config.is_bounded() {
            let written = key.clone();
            self.store.put(key, value, now);
            self.enforce_capacity(&written, &config);
        } else {
            self.store.put(key, value, now);
        }
    }

    // == Get ==
    /// Returns the stored value, or `None` if absent or expired.
    ///
    /// An expired entry is removed by the read that finds it.
    pub fn get_object(&self, key: &K) -> Option<V> {
        self.lookup(key, true)
    }

    pub(crate) fn lookup(&self, key: &K, record_miss: bool) -> Option<V> {
        let config = self.configuration();
        let now = self.clock.now_ms();

        match self
            .store
            .get_unless(key, now, |entry| is_expired(entry, &config, now))
        {
            Lookup::Hit(value) => {
                self.stats.record_hit();
                Some(value)
            }
            Lookup::Expired => {
                self.stats.record_expirations(1);
                if record_miss {
                    self.stats.record_miss();
                }
                debug!("Cache {}: expired entry removed on read", self.id);
                None
            }
            Lookup::Miss => {
                if record_miss {
                    self.stats.record_miss();
                }
                None
            }
        }
    }

    /// Returns `true` if a non-expired entry exists, without touching it.
    pub fn contains_key(&self, key: &K) -> bool {
        let config = self.configuration();
        let now = self.clock.now_ms();
        self.store
            .peek(key, |entry| !is_expired(entry, &config, now))
            .unwrap_or(false)
    }

    // == Remove ==
    /// Removes an entry, reporting whether one was present.
    pub fn remove_object(&self, key: &K) -> bool {
        self.store.remove(key)
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        self.store.clear();
        debug!("Cache {} cleared", self.id);
    }

    // == Size ==
    /// Raw entry count.
    ///
    /// Entries whose TTL or TTI has elapsed are still counted until they
    /// are read or swept by [`Cache::evict_expired`].
    pub fn size(&self) -> usize {
        self.store.len()
    }

    // == Evict Expired ==
    /// Removes every expired entry.
    ///
    /// Returns the number of entries removed.
    pub fn evict_expired(&self) -> usize {
        let config = self.configuration();
        let now = self.clock.now_ms();
        let expired = |entry: &CacheEntry<V>| is_expired(entry, &config, now);

        // Re-checked under the key's lock; the entry may have been replaced
        let mut removed = 0;
        for key in self.store.collect_matching(expired) {
            if self.store.remove_where(&key, expired) {
                removed += 1;
            }
        }

        if removed > 0 {
            self.stats.record_expirations(removed as u64);
        }
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn statistics(&self) -> CacheStats {
        self.stats.snapshot(self.store.len())
    }

    // == Configuration ==
    /// Snapshot of the current configuration.
    pub fn configuration(&self) -> CacheConfiguration {
        *self.config.read()
    }

    /// Sets the time-to-live in seconds; `0` disables it.
    pub fn set_time_to_live_seconds(&self, seconds: i64) -> Result<()> {
        let seconds = checked_setting("timeToLiveSeconds", seconds)?;
        self.config.write().time_to_live_seconds = seconds;
        debug!("Cache {}: time_to_live_seconds={}", self.id, seconds);
        Ok(())
    }

    /// Sets the time-to-idle in seconds; `0` disables it.
    pub fn set_time_to_idle_seconds(&self, seconds: i64) -> Result<()> {
        let seconds = checked_setting("timeToIdleSeconds", seconds)?;
        self.config.write().time_to_idle_seconds = seconds;
        debug!("Cache {}: time_to_idle_seconds={}", self.id, seconds);
        Ok(())
    }

    /// Sets the capacity; `0` removes the bound.
    ///
    /// Lowering the bound does not evict immediately; the next put does.
    pub fn set_max_entries_local_heap(&self, max_entries: i64) -> Result<()> {
        let max_entries = checked_setting("maxEntriesLocalHeap", max_entries)?;
        self.config.write().max_entries = max_entries;
        debug!("Cache {}: max_entries={}", self.id, max_entries);
        Ok(())
    }

    /// Sets the eviction policy by name (`LRU`, `FIFO` or `LFU`).
    pub fn set_memory_store_eviction_policy(&self, policy: &str) -> Result<()> {
        let strategy: EvictionStrategy = policy.parse()?;
        self.config.write().eviction_strategy = strategy;
        debug!("Cache {}: eviction_strategy={}", self.id, strategy);
        Ok(())
    }

    // == Enforce Capacity ==
    fn enforce_capacity(&self, written: &K, config: &CacheConfiguration) {
        let max_entries = config.max_entries as usize;
        let strategy = config.eviction_strategy;

        // Puts stay parallel; only one writer at a time trims the store,
        // and it re-reads the length under the guard
        let _guard = self.eviction.lock();

        while self.store.len() > max_entries {
            let Some((victim, tick)) = self
                .store
                .find_min_by(written, |entry| strategy.victim_rank(entry))
            else {
                break;
            };

            // Lost a race with a concurrent writer; pick again
            if self.store.remove_if_tick(&victim, tick) {
                self.stats.record_eviction();
                debug!("Cache {}: evicted one entry ({})", self.id, strategy);
            }
        }
    }
}

impl<K, V> PartialEq for Cache<K, V>
where
    K: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<K, V> Eq for Cache<K, V> where K: Eq + Hash {}

impl<K, V> Hash for Cache<K, V>
where
    K: Eq + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<K, V> fmt::Display for Cache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EHCache {{{}}}", self.id)
    }
}

impl<K, V> fmt::Debug for Cache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cache")
            .field("id", &self.id)
            .field("config", &*self.config.read())
            .finish_non_exhaustive()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use std::collections::hash_map::DefaultHasher;
    use std::time::Duration;

    fn manual_cache(config: CacheConfiguration) -> (Cache<String, String>, ManualClock) {
        let clock = ManualClock::new();
        let cache = Cache::with_clock("test", config, Arc::new(clock.clone())).unwrap();
        (cache, clock)
    }

    fn unbounded() -> CacheConfiguration {
        CacheConfiguration {
            time_to_live_seconds: 0,
            time_to_idle_seconds: 0,
            ..CacheConfiguration::default()
        }
    }

    fn key(s: &str) -> String {
        s.to_string()
    }

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_cache_rejects_empty_id() {
        let result = Cache::<String, String>::new("");
        assert!(matches!(result, Err(CacheError::InvalidArgument(_))));
    }

    #[test]
    fn test_cache_put_and_get() {
        let (cache, _) = manual_cache(unbounded());
        cache.put_object(key("key1"), key("value1"));

        assert_eq!(cache.get_object(&key("key1")), Some(key("value1")));
        assert_eq!(cache.get_object(&key("missing")), None);
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_cache_remove_reports_presence() {
        let (cache, _) = manual_cache(unbounded());
        cache.put_object(key("key1"), key("value1"));

        assert!(cache.remove_object(&key("key1")));
        assert!(!cache.remove_object(&key("key1")));
        assert_eq!(cache.get_object(&key("key1")), None);
    }

    #[test]
    fn test_cache_clear() {
        let (cache, _) = manual_cache(unbounded());
        for i in 0..5 {
            cache.put_object(i.to_string(), i.to_string());
        }
        cache.clear();

        assert_eq!(cache.size(), 0);
        assert_eq!(cache.get_object(&key("0")), None);
    }

    #[test]
    fn test_cache_ttl_regardless_of_access() {
        let (cache, clock) = manual_cache(unbounded());
        cache.set_time_to_live_seconds(2).unwrap();
        cache.put_object(key("k"), key("v"));

        clock.advance(Duration::from_millis(1_000));
        assert!(cache.get_object(&key("k")).is_some());
        clock.advance(Duration::from_millis(999));
        assert!(cache.get_object(&key("k")).is_some());
        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get_object(&key("k")), None);
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_cache_tti_reset_by_reads() {
        let (cache, clock) = manual_cache(unbounded());
        cache.set_time_to_idle_seconds(1).unwrap();
        cache.put_object(key("k"), key("v"));

        for _ in 0..5 {
            clock.advance(Duration::from_millis(900));
            assert!(cache.get_object(&key("k")).is_some());
        }
        clock.advance(Duration::from_millis(1_000));
        assert_eq!(cache.get_object(&key("k")), None);
    }

    #[test]
    fn test_cache_ttl_change_applies_to_existing_entries() {
        let (cache, clock) = manual_cache(unbounded());
        cache.put_object(key("k"), key("v"));
        clock.advance(Duration::from_millis(1_200));
        assert!(cache.get_object(&key("k")).is_some());

        cache.set_time_to_live_seconds(1).unwrap();
        assert_eq!(cache.get_object(&key("k")), None);
    }

    #[test]
    fn test_cache_size_counts_unswept_expired_entries() {
        let (cache, clock) = manual_cache(unbounded());
        cache.set_time_to_live_seconds(1).unwrap();
        cache.put_object(key("a"), key("1"));
        cache.put_object(key("b"), key("2"));
        clock.advance(Duration::from_secs(1));

        assert_eq!(cache.size(), 2);
        assert!(!cache.contains_key(&key("a")));
        assert_eq!(cache.evict_expired(), 2);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.statistics().expirations, 2);
    }

    #[test]
    fn test_cache_evict_expired_keeps_live_entries() {
        let (cache, clock) = manual_cache(unbounded());
        cache.set_time_to_idle_seconds(1).unwrap();
        cache.put_object(key("stale"), key("1"));
        cache.put_object(key("fresh"), key("2"));
        clock.advance(Duration::from_millis(600));
        cache.get_object(&key("fresh"));
        clock.advance(Duration::from_millis(600));

        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.contains_key(&key("fresh")));
    }

    #[test]
    fn test_cache_fifo_eviction() {
        let (cache, _) = manual_cache(unbounded());
        cache.set_memory_store_eviction_policy("FIFO").unwrap();
        cache.set_max_entries_local_heap(1).unwrap();

        cache.put_object(key("eviction"), key("eviction"));
        cache.put_object(key("eviction2"), key("eviction2"));
        cache.put_object(key("eviction3"), key("eviction3"));

        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get_object(&key("eviction")), None);
        assert_eq!(cache.get_object(&key("eviction2")), None);
        assert_eq!(cache.get_object(&key("eviction3")), Some(key("eviction3")));
        assert_eq!(cache.statistics().evictions, 2);
    }

    #[test]
    fn test_cache_lru_eviction_respects_reads() {
        let (cache, _) = manual_cache(unbounded());
        cache.set_max_entries_local_heap(3).unwrap();
        cache.put_object(key("key1"), key("value1"));
        cache.put_object(key("key2"), key("value2"));
        cache.put_object(key("key3"), key("value3"));

        cache.get_object(&key("key1"));
        cache.put_object(key("key4"), key("value4"));

        assert!(cache.contains_key(&key("key1")));
        assert!(!cache.contains_key(&key("key2")));
        assert_eq!(cache.size(), 3);
    }

    #[test]
    fn test_cache_lfu_eviction() {
        let (cache, _) = manual_cache(unbounded());
        cache.set_memory_store_eviction_policy("lfu").unwrap();
        cache.set_max_entries_local_heap(2).unwrap();
        cache.put_object(key("hot"), key("1"));
        cache.put_object(key("cold"), key("2"));
        cache.get_object(&key("hot"));
        cache.get_object(&key("hot"));

        cache.put_object(key("new"), key("3"));

        assert!(cache.contains_key(&key("hot")));
        assert!(!cache.contains_key(&key("cold")));
        assert!(cache.contains_key(&key("new")));
    }

    #[test]
    fn test_cache_policy_change_is_not_retroactive() {
        let (cache, _) = manual_cache(unbounded());
        cache.set_max_entries_local_heap(2).unwrap();
        cache.put_object(key("a"), key("1"));
        cache.put_object(key("b"), key("2"));
        cache.get_object(&key("a"));

        // Under LRU "b" would go; FIFO picks "a"
        cache.set_memory_store_eviction_policy("FIFO").unwrap();
        cache.put_object(key("c"), key("3"));

        assert!(!cache.contains_key(&key("a")));
        assert!(cache.contains_key(&key("b")));
    }

    #[test]
    fn test_cache_concurrent_puts_never_over_evict() {
        use std::sync::Barrier;
        use std::thread;

        for round in 0..500 {
            let (cache, _) = manual_cache(unbounded());
            cache.set_memory_store_eviction_policy("FIFO").unwrap();
            cache.set_max_entries_local_heap(1).unwrap();
            cache.put_object(key("seed"), key("seed"));

            let cache = Arc::new(cache);
            let barrier = Arc::new(Barrier::new(2));
            let writers: Vec<_> = ["left", "right"]
                .into_iter()
                .map(|name| {
                    let cache = Arc::clone(&cache);
                    let barrier = Arc::clone(&barrier);
                    thread::spawn(move || {
                        barrier.wait();
                        cache.put_object(key(name), key(name));
                    })
                })
                .collect();
            for writer in writers {
                writer.join().unwrap();
            }

            assert_eq!(cache.size(), 1, "round {}", round);
            assert!(
                cache.contains_key(&key("left")) || cache.contains_key(&key("right")),
                "round {}: both written keys were evicted",
                round
            );
        }
    }

    #[test]
    fn test_cache_overwrite_at_capacity_does_not_evict() {
        let (cache, _) = manual_cache(unbounded());
        cache.set_max_entries_local_heap(2).unwrap();
        cache.put_object(key("a"), key("1"));
        cache.put_object(key("b"), key("2"));
        cache.put_object(key("a"), key("3"));

        assert_eq!(cache.size(), 2);
        assert_eq!(cache.get_object(&key("a")), Some(key("3")));
        assert_eq!(cache.statistics().evictions, 0);
    }

    #[test]
    fn test_cache_invalid_configuration() {
        let (cache, _) = manual_cache(unbounded());

        assert!(matches!(
            cache.set_time_to_live_seconds(-1),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            cache.set_time_to_idle_seconds(-5),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            cache.set_max_entries_local_heap(-1),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            cache.set_memory_store_eviction_policy("RANDOM"),
            Err(CacheError::InvalidConfiguration(_))
        ));
        assert_eq!(cache.configuration(), unbounded());
    }

    #[test]
    fn test_cache_statistics() {
        let (cache, _) = manual_cache(unbounded());
        cache.put_object(key("key1"), key("value1"));
        cache.get_object(&key("key1"));
        cache.get_object(&key("missing"));

        let stats = cache.statistics();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.size, 1);
    }

    #[test]
    fn test_cache_identity() {
        let x = Cache::<i32, i32>::new("EHBLOCKINGCACHE").unwrap();
        let y = Cache::<i32, i32>::new("EHBLOCKINGCACHE").unwrap();
        let z = Cache::<i32, i32>::new("other").unwrap();
        x.put_object(1, 1);

        assert_eq!(x, y);
        assert_eq!(y, x);
        assert_eq!(x, x);
        assert_ne!(x, z);
        assert_eq!(hash_of(&x), hash_of(&y));
        assert_eq!(x.id(), "EHBLOCKINGCACHE");
        assert_eq!(x.to_string(), "EHCache {EHBLOCKINGCACHE}");
    }
}
