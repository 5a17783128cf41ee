//! Pausable, resettable countdown timer
//!
//! Time is kept in whole milliseconds so a 3 s timer reaches exactly zero
//! after thirty 100 ms ticks instead of drifting around it.

use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::interval::{MissedTicks, PeriodicTask};

/// Read-only view of a timer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CountdownState {
    pub remaining: f64,
    pub running: bool,
    pub total: f64,
}

/// Outcome of a `fire` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownTick {
    /// Nothing was due
    Idle,
    Ticked,
    /// Remaining just reached zero; reported once per run
    Completed,
}

pub struct CountdownTimer {
    name: &'static str,
    total_ms: u64,
    remaining_ms: u64,
    step_ms: u64,
    running: bool,
    task: PeriodicTask,
}

/// Any positive duration keeps at least one millisecond, so the timer can
/// always start and complete.
fn to_millis(seconds: f64) -> u64 {
    if seconds.is_finite() && seconds > 0.0 {
        ((seconds * 1000.0).round() as u64).max(1)
    } else {
        0
    }
}

impl CountdownTimer {
    /// # Panics
    /// Panics if `tick` is zero.
    pub fn new(name: &'static str, total_seconds: f64, tick: Duration) -> Self {
        let total_ms = to_millis(total_seconds);
        Self {
            name,
            total_ms,
            remaining_ms: total_ms,
            step_ms: (tick.as_millis() as u64).max(1),
            running: false,
            task: PeriodicTask::new(tick, MissedTicks::Burst),
        }
    }

    /// Begin counting down. No-op if already running or nothing remains.
    pub fn start(&mut self, now: f64) {
        if self.running || self.remaining_ms == 0 {
            return;
        }
        self.running = true;
        self.task.arm(now);
        debug!(
            "[Countdown] {} started with {:.1}s remaining",
            self.name,
            self.remaining()
        );
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.task.cancel();
    }

    pub fn reset(&mut self) {
        self.pause();
        self.remaining_ms = self.total_ms;
    }

    /// Replace the total. Always leaves the timer stopped and full.
    pub fn reconfigure(&mut self, total_seconds: f64) {
        self.total_ms = to_millis(total_seconds);
        self.reset();
    }

    pub fn remaining(&self) -> f64 {
        self.remaining_ms as f64 / 1000.0
    }

    pub fn total(&self) -> f64 {
        self.total_ms as f64 / 1000.0
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Elapsed share of the total, 0..=100
    pub fn progress(&self) -> f64 {
        if self.total_ms == 0 {
            return 0.0;
        }
        (self.total_ms - self.remaining_ms) as f64 / self.total_ms as f64 * 100.0
    }

    pub fn state(&self) -> CountdownState {
        CountdownState {
            remaining: self.remaining(),
            running: self.running,
            total: self.total(),
        }
    }

    pub fn next_due(&self) -> Option<f64> {
        self.task.next_due()
    }

    /// Apply the tick registered for `now`, if one is due.
    pub fn fire(&mut self, now: f64) -> CountdownTick {
        if !self.running || !self.task.take_due(now) {
            return CountdownTick::Idle;
        }

        self.remaining_ms = self.remaining_ms.saturating_sub(self.step_ms);
        if self.remaining_ms == 0 {
            self.pause();
            debug!("[Countdown] {} completed", self.name);
            return CountdownTick::Completed;
        }
        CountdownTick::Ticked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: Duration = Duration::from_millis(100);

    /// Fire every due tick up to `until`, collecting outcomes
    fn run(timer: &mut CountdownTimer, until: f64) -> Vec<(f64, CountdownTick)> {
        let mut fired = Vec::new();
        while let Some(due) = timer.next_due() {
            if due > until {
                break;
            }
            fired.push((due, timer.fire(due)));
        }
        fired
    }

    #[test]
    fn test_completes_exactly_once() {
        let mut timer = CountdownTimer::new("warmup", 3.0, TICK);
        timer.start(10.0);
        let fired = run(&mut timer, 20.0);

        assert_eq!(fired.len(), 30);
        let completions: Vec<_> = fired
            .iter()
            .filter(|(_, tick)| *tick == CountdownTick::Completed)
            .collect();
        assert_eq!(completions.len(), 1);
        assert_eq!(fired.last().unwrap().1, CountdownTick::Completed);
        assert!((completions[0].0 - 13.0).abs() < 1e-9);

        assert_eq!(timer.remaining(), 0.0);
        assert!(!timer.is_running());
        assert_eq!(timer.next_due(), None);
        assert_eq!(timer.fire(30.0), CountdownTick::Idle);
    }

    #[test]
    fn test_start_at_zero_is_noop() {
        let mut timer = CountdownTimer::new("exercise", 0.2, TICK);
        timer.start(0.0);
        run(&mut timer, 1.0);
        assert_eq!(timer.remaining(), 0.0);

        timer.start(1.0);
        assert!(!timer.is_running());
        assert_eq!(timer.next_due(), None);
    }

    #[test]
    fn test_tiny_total_still_completes() {
        let mut timer = CountdownTimer::new("exercise", 0.0004, TICK);
        assert!(timer.total() > 0.0);
        timer.start(0.0);
        assert!(timer.is_running());

        let fired = run(&mut timer, 1.0);
        assert_eq!(fired, vec![(0.1, CountdownTick::Completed)]);
        assert_eq!(timer.progress(), 100.0);
    }

    #[test]
    fn test_pause_preserves_remaining() {
        let mut timer = CountdownTimer::new("exercise", 10.0, TICK);
        timer.start(0.0);
        run(&mut timer, 2.05);
        assert_eq!(timer.remaining(), 8.0);

        timer.pause();
        assert_eq!(timer.next_due(), None);
        assert_eq!(timer.remaining(), 8.0);

        timer.start(5.0);
        run(&mut timer, 6.0);
        assert_eq!(timer.remaining(), 7.0);
    }

    #[test]
    fn test_reset_and_reconfigure() {
        let mut timer = CountdownTimer::new("exercise", 10.0, TICK);
        timer.start(0.0);
        run(&mut timer, 1.0);
        timer.reset();
        assert_eq!(timer.remaining(), 10.0);
        assert!(!timer.is_running());

        timer.start(2.0);
        timer.reconfigure(45.0);
        assert_eq!(timer.state(), CountdownState {
            remaining: 45.0,
            running: false,
            total: 45.0,
        });
        assert_eq!(timer.next_due(), None);
    }

    #[test]
    fn test_progress_bounds() {
        let mut timer = CountdownTimer::new("warmup", 3.0, TICK);
        assert_eq!(timer.progress(), 0.0);
        timer.start(0.0);
        run(&mut timer, 1.55);
        assert!((timer.progress() - 50.0).abs() < 1e-9);
        run(&mut timer, 5.0);
        assert_eq!(timer.progress(), 100.0);
    }

    #[test]
    fn test_late_fire_bursts_missed_ticks() {
        let mut timer = CountdownTimer::new("exercise", 5.0, TICK);
        timer.start(0.0);
        // A stalled host delivers the backlog one tick per call
        let mut ticks = 0;
        while timer.fire(1.05) != CountdownTick::Idle {
            ticks += 1;
        }
        assert_eq!(ticks, 10);
        assert_eq!(timer.remaining(), 4.0);
    }
}
