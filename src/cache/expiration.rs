//! Expiration Module
//!
//! Time-to-live and time-to-idle checks.

use crate::cache::CacheEntry;
use crate::config::CacheConfiguration;

// == Is Expired ==
/// Checks whether `entry` has outlived the configured TTL or TTI at `now`.
///
/// Boundary condition: an entry is expired once the full TTL (or TTI)
/// has elapsed, i.e. when the elapsed time is greater than or equal to
/// the bound. A bound of `0` disables that check.
pub fn is_expired<V>(entry: &CacheEntry<V>, config: &CacheConfiguration, now: u64) -> bool {
    let ttl_ms = u64::from(config.time_to_live_seconds) * 1000;
    let tti_ms = u64::from(config.time_to_idle_seconds) * 1000;

    (ttl_ms > 0 && entry.age_ms(now) >= ttl_ms) || (tti_ms > 0 && entry.idle_ms(now) >= tti_ms)
}
