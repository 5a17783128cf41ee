//! Tempo setting and its conversions to metronome tick spacing.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;

pub const MIN_BPM: u32 = 40;
pub const MAX_BPM: u32 = 300;
pub const DEFAULT_BPM: u32 = 120;

/// Metronome ticks per beat; a tick is a sixteenth note.
pub const TICKS_PER_BEAT: u8 = 4;

/// A validated tempo in beats (quarter notes) per minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct TempoSetting {
    bpm: u32,
}

impl TempoSetting {
    pub fn new(bpm: u32) -> Result<Self, SessionError> {
        if !(MIN_BPM..=MAX_BPM).contains(&bpm) {
            return Err(SessionError::TempoOutOfRange { bpm });
        }
        Ok(Self { bpm })
    }

    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    #[inline]
    pub fn seconds_per_beat(&self) -> f64 {
        60.0 / self.bpm as f64
    }

    /// Spacing between consecutive sixteenth-note ticks
    #[inline]
    pub fn tick_interval(&self) -> f64 {
        0.25 * self.seconds_per_beat()
    }
}

impl Default for TempoSetting {
    fn default() -> Self {
        Self { bpm: DEFAULT_BPM }
    }
}

impl TryFrom<u32> for TempoSetting {
    type Error = SessionError;

    fn try_from(bpm: u32) -> Result<Self, Self::Error> {
        Self::new(bpm)
    }
}

impl From<TempoSetting> for u32 {
    fn from(tempo: TempoSetting) -> u32 {
        tempo.bpm
    }
}
