//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Misses, expirations and evictions are ordinary outcomes and never
/// surface as errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Invalid constructor argument (e.g. an empty cache id)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Rejected configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// A blocking read gave up waiting for another caller to populate a key
    #[error("Timed out after {timeout_ms}ms waiting for a key lock on cache {cache_id}")]
    AcquisitionTimeout {
        /// Id of the cache the lock belongs to
        cache_id: String,
        /// Configured wait limit in milliseconds
        timeout_ms: u64,
    },
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
