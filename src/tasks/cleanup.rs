//! Expiration Sweep Task
//!
//! Background task that periodically removes expired cache entries that
//! are never read again. Reads already drop expired entries lazily; the
//! sweep only reclaims memory sooner.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::{BlockingCache, Cache};

/// A cache whose expired entries can be swept in bulk.
pub trait ExpirationSweep: Send + Sync {
    /// Cache id, for logging.
    fn sweep_id(&self) -> &str;

    /// Removes every expired entry and returns how many were removed.
    fn sweep_expired(&self) -> usize;
}

impl<K, V> ExpirationSweep for Cache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn sweep_id(&self) -> &str {
        self.id()
    }

    fn sweep_expired(&self) -> usize {
        self.evict_expired()
    }
}

impl<K, V> ExpirationSweep for BlockingCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn sweep_id(&self) -> &str {
        self.id()
    }

    fn sweep_expired(&self) -> usize {
        self.evict_expired()
    }
}

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task runs until aborted, sleeping `interval` between sweeps. Each
/// sweep holds only the shard locks of the entries it inspects.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(Cache::<String, String>::new("sessions")?);
/// let cleanup_handle = spawn_cleanup_task(cache.clone(), Duration::from_secs(1));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task<C>(cache: Arc<C>, interval: Duration) -> JoinHandle<()>
where
    C: ExpirationSweep + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting expiration sweep for cache {} every {:?}",
            cache.sweep_id(),
            interval
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = cache.sweep_expired();

            if removed > 0 {
                info!(
                    "Expiration sweep: removed {} expired entries from cache {}",
                    removed,
                    cache.sweep_id()
                );
            } else {
                debug!(
                    "Expiration sweep: no expired entries in cache {}",
                    cache.sweep_id()
                );
            }
        }
    })
}
