//! Background Tasks Module
//!
//! Contains background tasks that run periodically alongside a cache.
//!
//! # Tasks
//! - Expiration sweep: Removes expired cache entries at configured intervals

mod cleanup;

pub use cleanup::{spawn_cleanup_task, ExpirationSweep};
