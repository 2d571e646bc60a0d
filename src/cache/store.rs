//! Cache Store Module
//!
//! Main cache engine: keyed records, one expiry timer per record, hit/miss
//! accounting and JSON snapshots.
//!
//! Reads use a lazy expiry check. A record whose deadline has passed is
//! reported absent by `get` but stays in storage (and in `size()`/`keys()`)
//! until its timer fires and removes it.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::{CacheRecord, CacheStats, Expiry, InsertionOrder};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::models::{parse_snapshot, Remaining, SnapshotView};
use crate::tasks::{Clock, Scheduler, SystemClock, TimerGuard, TokioScheduler};

/// Called with `(key, value)` when a record expires naturally.
pub type ExpireCallback<T> = Box<dyn FnOnce(String, T) + Send + 'static>;

// == Import Options ==
/// Options for [`Cache::import_json`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ImportOptions {
    /// Keep the existing record when the snapshot contains a key already cached
    pub skip_duplicates: bool,
}

// == Cache Inner ==
/// State shared between the cache handle and its pending timers.
struct CacheInner<T> {
    /// Key-value storage
    entries: HashMap<String, CacheRecord<T>>,
    /// Key insertion order
    order: InsertionOrder,
    /// Live entry count, always equal to `entries.len()`
    size: usize,
    /// Hit/miss counters, only advanced in debug mode
    stats: CacheStats,
    /// Debug mode flag
    debug: bool,
}

impl<T> CacheInner<T> {
    fn new() -> Self {
        Self {
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            size: 0,
            stats: CacheStats::new(),
            debug: false,
        }
    }

    /// Removes a record, keeping size and order in sync. Absent keys are a no-op.
    fn remove(&mut self, key: &str) -> Option<CacheRecord<T>> {
        let record = self.entries.remove(key)?;
        self.order.remove(key);
        self.size -= 1;
        Some(record)
    }

    /// Removes the record a timer was armed for, unless it has been replaced
    /// or deleted in the meantime.
    fn take_fired(&mut self, key: &str, generation: u64) -> Option<T> {
        let current = self.entries.get(key)?.generation;
        if current != generation {
            return None;
        }
        self.remove(key).map(CacheRecord::into_fired)
    }
}

// == Cache ==
/// In-process key-value cache with per-entry TTL and expiration callbacks.
///
/// All methods take `&self`; the cache can be shared behind an `Arc`.
/// Dropping the cache releases every record and cancels its pending timer.
pub struct Cache<T> {
    inner: Arc<Mutex<CacheInner<T>>>,
    scheduler: Arc<dyn Scheduler>,
    clock: Arc<dyn Clock>,
    /// Source of record generations
    generations: AtomicU64,
}

impl<T> Cache<T> {
    // == Constructors ==
    /// Creates a cache on real time: tokio timers and the system clock.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn new() -> Self {
        Self::with_parts(Arc::new(TokioScheduler::current()), Arc::new(SystemClock))
    }

    /// Creates a cache that schedules expirations on `scheduler` and reads
    /// time from `clock`.
    pub fn with_parts(scheduler: Arc<dyn Scheduler>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner::new())),
            scheduler,
            clock,
            generations: AtomicU64::new(0),
        }
    }

    /// Creates a real-time cache with settings from `config`.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime.
    pub fn from_config(config: &Config) -> Self {
        let cache = Self::new();
        cache.debug(config.debug);
        cache
    }

    // == Delete ==
    /// Removes `key`, cancelling its pending timer.
    ///
    /// Returns false when there was nothing to remove. The expiration
    /// callback is never invoked.
    pub fn del(&self, key: &str) -> bool {
        let removed = self.lock().remove(key);
        match removed {
            Some(mut record) => {
                record.cancel_timer();
                true
            }
            None => false,
        }
    }

    // == Clear ==
    /// Removes every record and cancels every pending timer.
    ///
    /// Hit/miss counters are reset only when debug mode is on at the time of
    /// the call; otherwise they carry over.
    pub fn clear(&self) {
        let mut inner = self.lock();
        for (_, mut record) in inner.entries.drain() {
            record.cancel_timer();
        }
        inner.order.clear();
        inner.size = 0;
        if inner.debug {
            inner.stats.reset();
        }
    }

    // == Size ==
    /// Number of stored records.
    ///
    /// May include a record whose deadline has passed but whose timer has
    /// not fired yet.
    pub fn size(&self) -> usize {
        self.lock().size
    }

    /// Number of records physically held in storage.
    pub fn memsize(&self) -> usize {
        self.lock().entries.len()
    }

    // == Debug Mode ==
    /// Turns hit/miss counting and operation logging on or off.
    ///
    /// Existing counts are kept as they are.
    pub fn debug(&self, enabled: bool) {
        self.lock().debug = enabled;
    }

    pub fn is_debug(&self) -> bool {
        self.lock().debug
    }

    // == Stats ==
    /// Reads counted as hits while debug mode was on.
    pub fn hits(&self) -> u64 {
        self.lock().stats.hits
    }

    /// Reads counted as misses while debug mode was on.
    pub fn misses(&self) -> u64 {
        self.lock().stats.misses
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }

    // == Keys ==
    /// All stored keys in insertion order.
    ///
    /// This is the storage view: keys whose deadline has passed are listed
    /// until their timer removes them, even though `get` reports them absent.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    /// Returns true if `key` is stored, expired or not.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<T>> {
        lock_inner(&self.inner)
    }
}

fn lock_inner<T>(inner: &Mutex<CacheInner<T>>) -> MutexGuard<'_, CacheInner<T>> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T: Clone> Cache<T> {
    // == Get ==
    /// Returns the value for `key`, or None if it is absent or past its
    /// deadline.
    ///
    /// Does not remove expired records; that is left to their timer.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now_ms();
        let mut inner = self.lock();

        let found = inner
            .entries
            .get(key)
            .filter(|record| !record.is_expired(now))
            .map(|record| record.value.clone());

        if inner.debug {
            match found {
                Some(_) => inner.stats.record_hit(),
                None => inner.stats.record_miss(),
            }
        }
        found
    }
}

impl<T> Cache<T>
where
    T: Clone + Serialize + Send + 'static,
{
    // == Put ==
    /// Stores `value` under `key` and returns it.
    ///
    /// With `ttl_ms`, the record expires that many milliseconds from now.
    /// Replacing an existing key cancels its old timer and keeps its
    /// position in `keys()`.
    ///
    /// # Errors
    /// `InvalidArgument` if `ttl_ms` is zero. The cache is left untouched.
    pub fn put(&self, key: impl Into<String>, value: T, ttl_ms: Option<u64>) -> Result<T> {
        self.store(key.into(), value.clone(), ttl_ms, None)?;
        Ok(value)
    }

    /// Like [`Cache::put`], and calls `on_expire(key, value)` once if the
    /// record reaches its deadline.
    ///
    /// The callback is dropped unused when the record is replaced, deleted or
    /// cleared, or when no TTL is given.
    pub fn put_with_callback<F>(
        &self,
        key: impl Into<String>,
        value: T,
        ttl_ms: Option<u64>,
        on_expire: F,
    ) -> Result<T>
    where
        F: FnOnce(String, T) + Send + 'static,
    {
        self.store(key.into(), value.clone(), ttl_ms, Some(Box::new(on_expire)))?;
        Ok(value)
    }

    fn store(
        &self,
        key: String,
        value: T,
        ttl_ms: Option<u64>,
        on_expire: Option<ExpireCallback<T>>,
    ) -> Result<()> {
        if ttl_ms == Some(0) {
            return Err(CacheError::invalid_ttl());
        }

        let generation = self.generations.fetch_add(1, Ordering::Relaxed);
        let now = self.clock.now_ms();
        let expire = Expiry::after(now, ttl_ms);

        // Armed under the lock so the timer cannot run before its record exists
        let mut guard = self.lock();
        let inner = &mut *guard;
        let timer = ttl_ms.map(|ttl| self.arm_timer(key.clone(), generation, ttl, on_expire));

        if inner.debug {
            let rendered = serde_json::to_string(&value).unwrap_or_else(|_| "?".to_string());
            match ttl_ms {
                Some(ttl) => debug!("caching: {} = {} (@{})", key, rendered, ttl),
                None => debug!("caching: {} = {} (@never)", key, rendered),
            }
        }

        match inner.entries.get_mut(&key) {
            Some(existing) => existing.cancel_timer(),
            None => {
                inner.order.push(&key);
                inner.size += 1;
            }
        }
        inner
            .entries
            .insert(key, CacheRecord::new(value, expire, generation, timer));

        Ok(())
    }

    /// Schedules removal of `key` (if still at `generation`) after `ttl_ms`.
    fn arm_timer(
        &self,
        key: String,
        generation: u64,
        ttl_ms: u64,
        on_expire: Option<ExpireCallback<T>>,
    ) -> TimerGuard {
        let shared: Weak<Mutex<CacheInner<T>>> = Arc::downgrade(&self.inner);

        self.scheduler.schedule_once(
            Duration::from_millis(ttl_ms),
            Box::new(move || {
                let Some(shared) = shared.upgrade() else {
                    return;
                };
                let fired = lock_inner(&shared).take_fired(&key, generation);
                drop(shared);

                if let Some(value) = fired {
                    debug!("Expired key '{}'", key);
                    if let Some(callback) = on_expire {
                        callback(key, value);
                    }
                }
            }),
        )
    }

    // == Export ==
    /// Serializes every stored record, expired or not, in insertion order.
    ///
    /// Deadlines are absolute epoch milliseconds; records without one carry
    /// the `"NaN"` tag.
    pub fn export_json(&self) -> Result<String> {
        let inner = self.lock();
        let mut view = SnapshotView::new();
        for key in inner.order.iter() {
            if let Some(record) = inner.entries.get(key) {
                view.push(key, &record.value, record.expire);
            }
        }
        Ok(serde_json::to_string(&view)?)
    }
}

impl<T> Cache<T>
where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
    // == Import ==
    /// Loads a snapshot produced by [`Cache::export_json`] and returns the
    /// resulting `size()`.
    ///
    /// Each record gets whatever is left of its original lifetime. Records
    /// already past their deadline are not inserted, and any record cached
    /// under the same key is deleted. With `skip_duplicates`, keys already
    /// cached are left alone.
    ///
    /// # Errors
    /// `Snapshot` if the payload is not a valid snapshot. Nothing is imported
    /// in that case.
    pub fn import_json(&self, json: &str, options: ImportOptions) -> Result<usize> {
        let records = parse_snapshot::<T>(json)?;
        let now = self.clock.now_ms();
        let debug_enabled = self.is_debug();

        for (key, record) in records {
            if options.skip_duplicates && self.contains_key(&key) {
                if debug_enabled {
                    debug!("Skipping duplicate imported key '{}'", key);
                }
                continue;
            }

            match record.expire.remaining(now) {
                Remaining::Expired => {
                    if debug_enabled {
                        debug!("Dropping expired imported key '{}'", key);
                    }
                    self.del(&key);
                }
                Remaining::Ttl(ttl) => self.store(key, record.value, Some(ttl), None)?,
                Remaining::Forever => self.store(key, record.value, None, None)?,
            }
        }

        Ok(self.size())
    }
}

impl<T> fmt::Debug for Cache<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Cache")
            .field("size", &inner.size)
            .field("debug", &inner.debug)
            .field("stats", &inner.stats)
            .finish()
    }
}
