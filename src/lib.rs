//! Timed Cache - An embeddable in-memory cache
//!
//! Keys map to values with optional per-entry TTL, expiration callbacks and
//! JSON snapshots that preserve absolute deadlines across export/import.

pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use cache::{Cache, CacheStats, ImportOptions};
pub use config::Config;
pub use error::{CacheError, Result};
