//! Snapshot DTOs
//!
//! JSON shape used by `export_json` / `import_json`:
//!
//! ```text
//! { "<key>": { "value": <T>, "expire": <epoch ms> | "NaN" }, ... }
//! ```
//!
//! `expire` is an absolute deadline, so an import recomputes how long each
//! entry has left instead of restarting its original TTL.

use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::cache::Expiry;

// == Export ==
/// One exported record.
#[derive(Debug, Serialize)]
pub struct ExportRecord<'a, T> {
    pub value: &'a T,
    pub expire: Expiry,
}

/// Ordered view of the cache contents, serialized as a single JSON object.
#[derive(Debug)]
pub struct SnapshotView<'a, T> {
    records: Vec<(&'a str, ExportRecord<'a, T>)>,
}

impl<'a, T> SnapshotView<'a, T> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn push(&mut self, key: &'a str, value: &'a T, expire: Expiry) {
        self.records.push((key, ExportRecord { value, expire }));
    }
}

impl<T: Serialize> Serialize for SnapshotView<'_, T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for (key, record) in &self.records {
            map.serialize_entry(key, record)?;
        }
        map.end()
    }
}

// == Import ==
/// One imported record.
#[derive(Debug, Deserialize)]
pub struct ImportRecord<T> {
    pub value: T,
    #[serde(default)]
    pub expire: ImportedExpiry,
}

/// Deadline as read from a snapshot.
///
/// Numbers may be fractional or negative. Any string (the `"NaN"` tag
/// included), `null`, or a missing field means the entry never expires.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ImportedExpiry {
    At(f64),
    #[default]
    Never,
}

/// Lifetime an imported record has left at import time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// Deadline already reached; the record is dropped
    Expired,
    /// Re-arm with this TTL in milliseconds (at least 1)
    Ttl(u64),
    /// No deadline
    Forever,
}

impl ImportedExpiry {
    /// Computes the remaining lifetime relative to `now_ms`.
    pub fn remaining(&self, now_ms: u64) -> Remaining {
        match self {
            ImportedExpiry::Never => Remaining::Forever,
            ImportedExpiry::At(deadline) => {
                let remaining = deadline - now_ms as f64;
                if remaining <= 0.0 {
                    Remaining::Expired
                } else {
                    Remaining::Ttl(remaining.ceil() as u64)
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for ImportedExpiry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_f64()
                .filter(|ms| ms.is_finite())
                .map(ImportedExpiry::At)
                .ok_or_else(|| de::Error::custom("expire is not a finite number")),
            Value::String(_) | Value::Null => Ok(ImportedExpiry::Never),
            other => Err(de::Error::custom(format!(
                "expire must be a number or \"NaN\", got {}",
                other
            ))),
        }
    }
}

/// Parses a snapshot into `(key, record)` pairs in document order.
///
/// Every record is decoded before any is returned, so a malformed payload
/// fails as a whole.
pub fn parse_snapshot<T>(json: &str) -> serde_json::Result<Vec<(String, ImportRecord<T>)>>
where
    T: for<'de> Deserialize<'de>,
{
    let document: serde_json::Map<String, Value> = serde_json::from_str(json)?;
    document
        .into_iter()
        .map(|(key, raw)| Ok((key, serde_json::from_value(raw)?)))
        .collect()
}
