//! Cache Module
//!
//! Provides the in-memory cache with per-entry TTL timers and JSON snapshots.

mod entry;
mod order;
mod stats;
mod store;


// Re-export public types
pub use entry::{CacheRecord, Expiry, NEVER_EXPIRES_TAG};
pub use order::InsertionOrder;
pub use stats::CacheStats;
pub use store::{Cache, ExpireCallback, ImportOptions};
