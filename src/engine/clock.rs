//! Clock sources driving the cooperative session loop.
//!
//! All engine time is expressed as `f64` seconds since the clock's origin.
//! The session worker reads the clock to decide when periodic callbacks are
//! due; tests substitute [ManualClock] to step time deterministically.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Monotonic time source, in seconds.
pub trait ClockSource: Send + Sync {
    fn now(&self) -> f64;
}

/// Default clock backed by `Instant::now`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for SystemClock {
    fn now(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }
}

/// Deterministic clock for tests and offline simulation.
///
/// Time only moves when told to. The value is stored as raw `f64` bits so a
/// `set(t)` followed by `now()` returns exactly `t`.
pub struct ManualClock {
    seconds_bits: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(seconds: f64) -> Self {
        Self {
            seconds_bits: AtomicU64::new(seconds.to_bits()),
        }
    }

    /// Jump to an absolute time. Moving backwards is ignored.
    pub fn set(&self, seconds: f64) {
        let current = f64::from_bits(self.seconds_bits.load(Ordering::SeqCst));
        if seconds > current {
            self.seconds_bits.store(seconds.to_bits(), Ordering::SeqCst);
        }
    }

    pub fn advance(&self, by: Duration) {
        let current = f64::from_bits(self.seconds_bits.load(Ordering::SeqCst));
        self.set(current + by.as_secs_f64());
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockSource for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.seconds_bits.load(Ordering::SeqCst))
    }
}
