//! Timer Plumbing Module
//!
//! Clocks and one-shot schedulers that drive entry expiration.
//!
//! # Implementations
//! - `TokioScheduler` + `SystemClock`: real time, used by `Cache::new`
//! - `ManualScheduler` + `ManualClock`: caller-driven time for tests

mod clock;
mod manual;
mod scheduler;

pub use clock::{current_timestamp_ms, Clock, SystemClock};
pub use manual::{ManualClock, ManualScheduler};
pub use scheduler::{Scheduler, TimerCancel, TimerGuard, TimerTask, TokioScheduler};
