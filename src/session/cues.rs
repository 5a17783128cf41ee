//! Warmup countdown cues: one beep per whole second crossed.

#[derive(Debug, Clone)]
pub struct CountdownCues {
    warmup_seconds: u32,
    last_cued: u32,
}

impl CountdownCues {
    pub fn new(warmup_seconds: u32) -> Self {
        Self {
            warmup_seconds,
            last_cued: warmup_seconds + 1,
        }
    }

    /// Arm for a fresh warmup.
    pub fn reset(&mut self) {
        self.last_cued = self.warmup_seconds + 1;
    }

    pub fn last_cued(&self) -> u32 {
        self.last_cued
    }

    /// Observe the warmup timer's remaining time.
    ///
    /// Returns the second to cue when `ceil(remaining)` dropped below the last
    /// cued second, never for zero.
    pub fn observe(&mut self, remaining: f64) -> Option<u32> {
        let current = remaining.max(0.0).ceil() as u32;
        if current < self.last_cued && current > 0 {
            self.last_cued = current;
            return Some(current);
        }
        None
    }
}
