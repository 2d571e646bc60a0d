//! Data Models Module
//!
//! Wire DTOs for cache snapshots.

pub mod snapshot;

pub use snapshot::{parse_snapshot, ImportRecord, ImportedExpiry, Remaining, SnapshotView};
