//! Blocking Cache Module
//!
//! Wraps a [`Cache`] so that, for any missing key, only one caller at a
//! time gets to populate it. Other readers of that key wait until the
//! populating caller puts a value or releases the key.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{trace, warn};

use crate::cache::{Cache, CacheStats};
use crate::config::CacheConfiguration;
use crate::error::{CacheError, Result};

/// Lock state for one key. Present in the table only while held or awaited.
#[derive(Debug, Default)]
struct KeySlot {
    owner: Option<ThreadId>,
    waiters: usize,
    released: Arc<Condvar>,
}

// == Blocking Cache ==
/// Cache wrapper that prevents concurrent recomputation of the same
/// missing value.
///
/// A [`get_object`](Self::get_object) that misses leaves the key locked by
/// the calling thread. The lock is released by that thread's next
/// [`put_object`](Self::put_object) for the key, or by
/// [`release`](Self::release). Keys never block each other.
pub struct BlockingCache<K, V>
where
    K: Eq + Hash,
{
    cache: Cache<K, V>,
    locks: Mutex<HashMap<K, KeySlot>>,
    timeout: RwLock<Option<Duration>>,
}

impl<K, V> BlockingCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    // == Constructors ==
    /// Creates a blocking cache with the default configuration.
    pub fn new(id: impl Into<String>) -> Result<Self> {
        Ok(Self::wrap(Cache::new(id)?))
    }

    /// Wraps an existing cache; readers wait without a time limit.
    pub fn wrap(cache: Cache<K, V>) -> Self {
        Self {
            cache,
            locks: Mutex::new(HashMap::new()),
            timeout: RwLock::new(None),
        }
    }

    /// Wraps an existing cache; readers give up after `timeout`.
    pub fn with_timeout(cache: Cache<K, V>, timeout: Duration) -> Self {
        let blocking = Self::wrap(cache);
        blocking.set_timeout(Some(timeout));
        blocking
    }

    /// The wrapped cache.
    pub fn inner(&self) -> &Cache<K, V> {
        &self.cache
    }

    /// Identifier of the wrapped cache.
    pub fn id(&self) -> &str {
        self.cache.id()
    }

    /// Current key-lock wait limit; `None` waits forever.
    pub fn timeout(&self) -> Option<Duration> {
        *self.timeout.read()
    }

    /// Sets how long readers wait for a key lock; `None` waits forever.
    pub fn set_timeout(&self, timeout: Option<Duration>) {
        *self.timeout.write() = timeout;
    }

    // == Get ==
    /// Returns the value for `key`, waiting while another thread populates it.
    ///
    /// On `Ok(None)` the calling thread holds the lock for `key` and is
    /// expected to call [`put_object`](Self::put_object) or
    /// [`release`](Self::release). Fails with
    /// [`CacheError::AcquisitionTimeout`] if a timeout is set and elapses.
    pub fn get_object(&self, key: &K) -> Result<Option<V>> {
        if let Some(value) = self.cache.lookup(key, false) {
            return Ok(Some(value));
        }

        self.acquire(key)?;

        // The previous holder may have populated the key while we waited
        match self.cache.get_object(key) {
            Some(value) => {
                self.release(key);
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    // == Put ==
    /// Stores a value and releases the caller's lock on `key`, if held.
    pub fn put_object(&self, key: K, value: V) {
        self.cache.put_object(key.clone(), value);
        self.release(&key);
    }

    /// Returns the cached value or computes, stores and returns it.
    ///
    /// `compute` runs at most once across all threads racing on a missing
    /// key. The key is released even if `compute` panics.
    pub fn get_or_insert_with<F>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> V,
    {
        if let Some(value) = self.get_object(&key)? {
            return Ok(value);
        }

        let _held = HeldKey { owner: self, key: &key };
        let value = compute();
        self.cache.put_object(key.clone(), value.clone());
        Ok(value)
    }

    // == Release ==
    /// Releases the calling thread's lock on `key`.
    ///
    /// Returns `false` if the calling thread did not hold it.
    pub fn release(&self, key: &K) -> bool {
        let me = thread::current().id();
        let mut table = self.locks.lock();

        let Some(slot) = table.get_mut(key) else {
            return false;
        };
        if slot.owner != Some(me) {
            return false;
        }

        slot.owner = None;
        if slot.waiters == 0 {
            table.remove(key);
        } else {
            slot.released.notify_all();
        }
        trace!("Cache {}: key lock released", self.cache.id());
        true
    }

    /// Returns `true` if any thread currently holds the lock for `key`.
    pub fn is_locked(&self, key: &K) -> bool {
        self.locks
            .lock()
            .get(key)
            .map_or(false, |slot| slot.owner.is_some())
    }

    fn acquire(&self, key: &K) -> Result<()> {
        let me = thread::current().id();
        let timeout = self.timeout();
        let deadline = timeout.map(|limit| Instant::now() + limit);
        let mut table = self.locks.lock();

        loop {
            let slot = table.entry(key.clone()).or_default();
            match slot.owner {
                None => {
                    slot.owner = Some(me);
                    trace!("Cache {}: key lock acquired", self.cache.id());
                    return Ok(());
                }
                // Already ours from an earlier miss
                Some(owner) if owner == me => return Ok(()),
                Some(_) => {}
            }

            slot.waiters += 1;
            let released = Arc::clone(&slot.released);
            trace!("Cache {}: waiting for key lock", self.cache.id());

            let timed_out = match deadline {
                Some(deadline) => released.wait_until(&mut table, deadline).timed_out(),
                None => {
                    released.wait(&mut table);
                    false
                }
            };

            // Our waiter count kept the slot in the table
            let still_held = match table.get_mut(key) {
                Some(slot) => {
                    slot.waiters -= 1;
                    slot.owner.is_some()
                }
                None => false,
            };

            if timed_out && still_held {
                let timeout_ms = timeout.map_or(0, |limit| limit.as_millis() as u64);
                warn!(
                    "Cache {}: gave up waiting for key lock after {}ms",
                    self.cache.id(),
                    timeout_ms
                );
                return Err(CacheError::AcquisitionTimeout {
                    cache_id: self.cache.id().to_string(),
                    timeout_ms,
                });
            }
        }
    }

    // == Remove ==
    /// Removes an entry, reporting whether one was present. Key locks are untouched.
    pub fn remove_object(&self, key: &K) -> bool {
        self.cache.remove_object(key)
    }

    // == Clear ==
    /// Removes every entry.
    pub fn clear(&self) {
        self.cache.clear();
    }

    // == Size ==
    /// Raw entry count, including entries not yet checked for expiration.
    pub fn size(&self) -> usize {
        self.cache.size()
    }

    /// Returns `true` if a non-expired entry exists, without locking or touching it.
    pub fn contains_key(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    /// Removes every expired entry and returns how many were removed.
    pub fn evict_expired(&self) -> usize {
        self.cache.evict_expired()
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn statistics(&self) -> CacheStats {
        self.cache.statistics()
    }

    // == Configuration ==
    /// Snapshot of the current configuration.
    pub fn configuration(&self) -> CacheConfiguration {
        self.cache.configuration()
    }

    /// Sets the time-to-live in seconds; `0` disables it.
    pub fn set_time_to_live_seconds(&self, seconds: i64) -> Result<()> {
        self.cache.set_time_to_live_seconds(seconds)
    }

    /// Sets the time-to-idle in seconds; `0` disables it.
    pub fn set_time_to_idle_seconds(&self, seconds: i64) -> Result<()> {
        self.cache.set_time_to_idle_seconds(seconds)
    }

    /// Sets the capacity; `0` removes the bound.
    pub fn set_max_entries_local_heap(&self, max_entries: i64) -> Result<()> {
        self.cache.set_max_entries_local_heap(max_entries)
    }

    /// Sets the eviction policy by name (`LRU`, `FIFO` or `LFU`).
    pub fn set_memory_store_eviction_policy(&self, policy: &str) -> Result<()> {
        self.cache.set_memory_store_eviction_policy(policy)
    }
}

/// Releases a key on drop, including during unwinding.
struct HeldKey<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    owner: &'a BlockingCache<K, V>,
    key: &'a K,
}

impl<K, V> Drop for HeldKey<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        self.owner.release(self.key);
    }
}

impl<K, V> PartialEq for BlockingCache<K, V>
where
    K: Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.cache == other.cache
    }
}

impl<K, V> Eq for BlockingCache<K, V> where K: Eq + Hash {}

impl<K, V> Hash for BlockingCache<K, V>
where
    K: Eq + Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cache.hash(state);
    }
}

impl<K, V> fmt::Display for BlockingCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.cache, f)
    }
}

impl<K, V> fmt::Debug for BlockingCache<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingCache")
            .field("cache", &self.cache)
            .field("timeout", &*self.timeout.read())
            .finish_non_exhaustive()
    }
}
