//! Manual Time
//!
//! A caller-driven clock and scheduler pair. Nothing happens until
//! [`ManualClock::advance`] moves time forward, which makes expiry fully
//! deterministic in tests of code that embeds the cache.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::clock::Clock;
use super::scheduler::{Scheduler, TimerCancel, TimerGuard, TimerTask};

/// Pending timers keyed by (deadline, sequence) so equal deadlines fire in
/// scheduling order.
type TimerQueue = BTreeMap<(u64, u64), (Arc<AtomicBool>, TimerTask)>;

#[derive(Default)]
struct ManualState {
    now: u64,
    next_seq: u64,
    pending: TimerQueue,
}

// == Manual Clock ==
/// Clock whose time only moves through [`ManualClock::advance`].
///
/// Cloning yields another handle to the same timeline.
#[derive(Clone, Default)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    /// Creates a timeline starting at `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        let clock = Self::default();
        clock.lock().now = start_ms;
        clock
    }

    /// Returns a scheduler whose timers run on this timeline.
    pub fn scheduler(&self) -> ManualScheduler {
        ManualScheduler {
            state: self.state.clone(),
        }
    }

    // == Advance ==
    /// Moves time forward by `ms`, running every due timer in deadline order.
    ///
    /// Timers are run without holding the timeline lock, so a task may
    /// schedule further timers; those fire too if they fall inside the window.
    /// Returns the number of timers that ran.
    pub fn advance(&self, ms: u64) -> usize {
        let target = self.lock().now.saturating_add(ms);
        let mut fired = 0;

        loop {
            let next = {
                let mut state = self.lock();
                let due = state
                    .pending
                    .keys()
                    .next()
                    .copied()
                    .filter(|(deadline, _)| *deadline <= target);
                match due {
                    Some(slot) => {
                        state.now = state.now.max(slot.0);
                        state.pending.remove(&slot)
                    }
                    None => {
                        state.now = target;
                        None
                    }
                }
            };

            match next {
                Some((cancelled, task)) => {
                    if !cancelled.load(Ordering::SeqCst) {
                        task();
                        fired += 1;
                    }
                }
                None => return fired,
            }
        }
    }

    /// Number of timers that are scheduled and not cancelled.
    pub fn pending_timers(&self) -> usize {
        self.lock()
            .pending
            .values()
            .filter(|(cancelled, _)| !cancelled.load(Ordering::SeqCst))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.lock().now
    }
}

// == Manual Scheduler ==
/// Scheduler driven by the [`ManualClock`] it was created from.
#[derive(Clone)]
pub struct ManualScheduler {
    state: Arc<Mutex<ManualState>>,
}

impl Scheduler for ManualScheduler {
    fn schedule_once(&self, delay: Duration, task: TimerTask) -> TimerGuard {
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());

        let delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        let deadline = state.now.saturating_add(delay_ms);
        let seq = state.next_seq;
        state.next_seq += 1;
        state
            .pending
            .insert((deadline, seq), (cancelled.clone(), task));

        TimerGuard::new(CancelFlag(cancelled))
    }
}

struct CancelFlag(Arc<AtomicBool>);

impl TimerCancel for CancelFlag {
    fn cancel(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}
