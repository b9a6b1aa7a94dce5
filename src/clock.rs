// src/clock.rs

//! Monotonic-enough wall-clock source for operation and obliteration
//! timestamps.
//!
//! Persisted records need a real timestamp, not a placeholder; tests need a
//! way to control that timestamp without sleeping. Collaborators that need
//! "now" take `Arc<dyn Clock>` at construction, the same shape the engine
//! uses for injecting other policy objects.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that advances by one tick (millisecond) on every read, for tests
/// that need distinguishable, strictly increasing timestamps without racing
/// the system clock's resolution.
pub struct SteppingClock {
    next_millis: AtomicI64,
}

impl SteppingClock {
    pub fn starting_at(millis: i64) -> Self {
        Self {
            next_millis: AtomicI64::new(millis),
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.next_millis.fetch_add(1, Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).expect("in-range timestamp")
    }
}

pub fn system_clock() -> Arc<dyn Clock> {
    Arc::new(SystemClock)
}
