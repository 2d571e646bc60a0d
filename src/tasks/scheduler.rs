//! Expiry Scheduler
//!
//! One-shot timers that the cache arms for every entry with a TTL.
//!
//! A [`Scheduler`] runs a task once after a delay and hands back a
//! [`TimerGuard`]. The guard owns the pending timer: dropping it cancels the
//! timer, so a record that is replaced, deleted or cleared can never leave a
//! stale callback behind.

use std::fmt;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Work run by a scheduler when a timer fires.
pub type TimerTask = Box<dyn FnOnce() + Send + 'static>;

// == Scheduler ==
/// Deadline facility the cache schedules expirations against.
pub trait Scheduler: Send + Sync {
    /// Runs `task` once, at or after `delay`, unless the returned guard is
    /// cancelled (or dropped) first.
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerGuard;
}

/// Cancellation side of a scheduled timer.
pub trait TimerCancel: Send {
    /// Cancels the timer. Must be a no-op when the timer already fired.
    fn cancel(&mut self);
}

// == Timer Guard ==
/// Owned handle to a pending timer. Cancels the timer on drop.
pub struct TimerGuard {
    inner: Option<Box<dyn TimerCancel>>,
}

impl TimerGuard {
    /// Wraps a scheduler-specific cancel handle.
    pub fn new(cancel: impl TimerCancel + 'static) -> Self {
        Self {
            inner: Some(Box::new(cancel)),
        }
    }

    // == Cancel ==
    /// Cancels the timer now. Calling it twice is harmless.
    pub fn cancel(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            inner.cancel();
        }
    }

    // == Disarm ==
    /// Releases the guard without cancelling. Used once the timer has fired.
    pub fn disarm(mut self) {
        self.inner = None;
    }

    /// Returns true while the guard still holds a cancel handle.
    pub fn is_armed(&self) -> bool {
        self.inner.is_some()
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl fmt::Debug for TimerGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerGuard")
            .field("armed", &self.is_armed())
            .finish()
    }
}

// == Tokio Scheduler ==
/// Scheduler backed by tokio tasks: one spawned `sleep` per timer.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    handle: Handle,
}

impl TokioScheduler {
    /// Creates a scheduler bound to the runtime of the calling context.
    ///
    /// # Panics
    /// Panics when called outside a tokio runtime, like `tokio::spawn`.
    pub fn current() -> Self {
        Self {
            handle: Handle::current(),
        }
    }

    /// Creates a scheduler that spawns its timers on `handle`.
    pub fn from_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Scheduler for TokioScheduler {
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerGuard {
        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            trace!("Timer fired after {:?}", delay);
            task();
        });
        TimerGuard::new(AbortOnCancel(join))
    }
}

/// Aborting a finished task is a no-op, which gives the required semantics.
struct AbortOnCancel(JoinHandle<()>);

impl TimerCancel for AbortOnCancel {
    fn cancel(&mut self) {
        self.0.abort();
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_task(counter: &Arc<AtomicUsize>) -> TimerTask {
        let counter = counter.clone();
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_tokio_timer_fires_once() {
        let scheduler = TokioScheduler::current();
        let fired = Arc::new(AtomicUsize::new(0));

        let guard = scheduler.schedule_once(Duration::from_millis(5), counting_task(&fired));
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Cancelling after the fact must not panic
        drop(guard);
    }

    #[tokio::test]
    async fn test_tokio_timer_cancelled_on_drop() {
        let scheduler = TokioScheduler::current();
        let fired = Arc::new(AtomicUsize::new(0));

        let guard = scheduler.schedule_once(Duration::from_millis(20), counting_task(&fired));
        drop(guard);
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_disarmed_guard_lets_timer_fire() {
        let scheduler = TokioScheduler::current();
        let fired = Arc::new(AtomicUsize::new(0));

        let guard = scheduler.schedule_once(Duration::from_millis(5), counting_task(&fired));
        guard.disarm();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_guard_cancel_is_idempotent() {
        struct Count(Arc<AtomicUsize>);
        impl TimerCancel for Count {
            fn cancel(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let cancels = Arc::new(AtomicUsize::new(0));
        let mut guard = TimerGuard::new(Count(cancels.clone()));
        assert!(guard.is_armed());

        guard.cancel();
        guard.cancel();
        drop(guard);

        assert_eq!(cancels.load(Ordering::SeqCst), 1);
    }
}
