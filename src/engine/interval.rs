//! Periodic callback registration.
//!
//! A [PeriodicTask] is the engine's equivalent of an interval timer: it is
//! armed at some instant, reports when its next firing is due, and is
//! cancelled synchronously. Due times are computed as
//! `anchor + n * period` so long runs never accumulate rounding drift.

use std::time::Duration;

/// What to do with firings that were missed because the host stalled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissedTicks {
    /// Deliver every missed firing, one per `take_due` call.
    Burst,
    /// Collapse all missed firings into one and realign to the period grid.
    Skip,
}

#[derive(Debug, Clone)]
pub struct PeriodicTask {
    period: f64,
    anchor: f64,
    fired: u64,
    armed: bool,
    missed: MissedTicks,
}

impl PeriodicTask {
    /// # Panics
    /// Panics if `period` is zero.
    pub fn new(period: Duration, missed: MissedTicks) -> Self {
        assert!(!period.is_zero(), "period must be greater than 0");
        Self {
            period: period.as_secs_f64(),
            anchor: 0.0,
            fired: 0,
            armed: false,
            missed,
        }
    }

    /// Start firing every period, first firing one period after `now`.
    pub fn arm(&mut self, now: f64) {
        self.anchor = now;
        self.fired = 0;
        self.armed = true;
    }

    /// Cancel the registration. No firing is reported after this returns.
    pub fn cancel(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn period(&self) -> f64 {
        self.period
    }

    pub fn next_due(&self) -> Option<f64> {
        self.armed
            .then(|| self.anchor + (self.fired + 1) as f64 * self.period)
    }

    /// Consume the pending firing if it is due at `now`.
    pub fn take_due(&mut self, now: f64) -> bool {
        match self.next_due() {
            Some(due) if due <= now => {
                match self.missed {
                    MissedTicks::Burst => self.fired += 1,
                    MissedTicks::Skip => {
                        let estimate = ((now - self.anchor) / self.period).floor() as u64;
                        let mut fired = estimate.saturating_sub(1).max(self.fired + 1);
                        while self.anchor + (fired + 1) as f64 * self.period <= now {
                            fired += 1;
                        }
                        self.fired = fired;
                    }
                }
                true
            }
            _ => false,
        }
    }
}
