//! Cache Record Module
//!
//! Defines the structure for individual cache records with TTL support.

use serde::{Serialize, Serializer};

use crate::tasks::TimerGuard;

/// Wire tag for a deadline that never passes.
pub const NEVER_EXPIRES_TAG: &str = "NaN";

// == Expiry ==
/// Absolute deadline of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Expires at this Unix timestamp (milliseconds)
    At(u64),
    /// Never expires
    Never,
}

impl Expiry {
    // == Constructor ==
    /// Deadline `ttl_ms` after `now_ms`, or `Never` without a TTL.
    pub fn after(now_ms: u64, ttl_ms: Option<u64>) -> Self {
        match ttl_ms {
            Some(ttl) => Expiry::At(now_ms.saturating_add(ttl)),
            None => Expiry::Never,
        }
    }

    // == Is Passed ==
    /// True once `now_ms` is strictly past the deadline.
    ///
    /// A record is still readable during the millisecond it expires in.
    pub fn is_passed(&self, now_ms: u64) -> bool {
        match self {
            Expiry::At(deadline) => *deadline < now_ms,
            Expiry::Never => false,
        }
    }

    /// Milliseconds left before the deadline, or None for `Never`.
    pub fn remaining_ms(&self, now_ms: u64) -> Option<u64> {
        match self {
            Expiry::At(deadline) => Some(deadline.saturating_sub(now_ms)),
            Expiry::Never => None,
        }
    }
}

/// Numeric deadline, or the `"NaN"` tag for `Never`.
impl Serialize for Expiry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expiry::At(deadline) => serializer.serialize_u64(*deadline),
            Expiry::Never => serializer.serialize_str(NEVER_EXPIRES_TAG),
        }
    }
}

// == Cache Record ==
/// A single stored value with its deadline and the timer that enforces it.
#[derive(Debug)]
pub struct CacheRecord<T> {
    /// The stored value
    pub value: T,
    /// Absolute deadline
    pub expire: Expiry,
    /// Identifies this record to its own timer; bumped on every put
    pub generation: u64,
    /// Pending expiry timer, present iff `expire` is finite
    pub timer: Option<TimerGuard>,
}

impl<T> CacheRecord<T> {
    /// Creates a record. `timer` must be `Some` exactly when `expire` is `At`.
    pub fn new(value: T, expire: Expiry, generation: u64, timer: Option<TimerGuard>) -> Self {
        Self {
            value,
            expire,
            generation,
            timer,
        }
    }

    // == Is Expired ==
    /// Lazy expiry check used by reads.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expire.is_passed(now_ms)
    }

    // == Cancel Timer ==
    /// Cancels the pending timer, if any.
    pub fn cancel_timer(&mut self) {
        if let Some(mut timer) = self.timer.take() {
            timer.cancel();
        }
    }

    // == Into Fired ==
    /// Consumes a record whose timer has just fired, releasing the timer
    /// handle without cancelling it.
    pub fn into_fired(mut self) -> T {
        if let Some(timer) = self.timer.take() {
            timer.disarm();
        }
        self.value
    }
}
