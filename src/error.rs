//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// Only `put` validation and snapshot (de)serialization can fail; lookups,
/// deletes and clears are total.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A precondition on an argument was violated
    #[error("{0}")]
    InvalidArgument(String),

    /// Snapshot JSON could not be parsed or produced
    #[error("Invalid snapshot: {0}")]
    Snapshot(#[from] serde_json::Error),
}

impl CacheError {
    /// Error raised by `put` for a TTL that is not a positive number.
    pub fn invalid_ttl() -> Self {
        CacheError::InvalidArgument("timeout must be a positive number".to_string())
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
