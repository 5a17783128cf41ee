//! Per-run session configuration, supplied by whatever loads an exercise.

use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::metronome::TempoSetting;

/// Request to load an exercise, as it arrives from a loader or the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLoad {
    pub title: String,
    /// Exercise length in seconds
    pub duration: f64,
    pub bpm: u32,
    #[serde(default)]
    pub notes: Option<String>,
}

/// Validated configuration for one session.
///
/// Replaced wholesale on every load; only the tempo changes during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub title: String,
    pub exercise_duration: f64,
    pub warmup_duration: f64,
    pub tempo: TempoSetting,
    pub notes: Option<String>,
}

impl SessionConfig {
    pub const QUICK_START_TITLE: &'static str = "Quick Start";
    pub const QUICK_START_SECONDS: f64 = 300.0;

    /// Build from a load request. Rejects a duration that is not finite or
    /// rounds to less than one millisecond, and out-of-range tempo.
    pub fn from_load(load: SessionLoad, warmup_seconds: u32) -> Result<Self, SessionError> {
        if !load.duration.is_finite() || (load.duration * 1000.0).round() < 1.0 {
            return Err(SessionError::ConfigInvalid {
                reason: format!(
                    "exercise duration must be at least 1 ms (got {})",
                    load.duration
                ),
            });
        }
        if warmup_seconds == 0 {
            return Err(SessionError::ConfigInvalid {
                reason: "warmup duration must be positive".to_string(),
            });
        }
        let tempo = TempoSetting::new(load.bpm)?;

        Ok(Self {
            title: load.title,
            exercise_duration: load.duration,
            warmup_duration: warmup_seconds as f64,
            tempo,
            notes: load.notes.filter(|notes| !notes.trim().is_empty()),
        })
    }

    /// Session loaded before the user picks anything
    pub fn quick_start() -> Self {
        Self {
            title: Self::QUICK_START_TITLE.to_string(),
            exercise_duration: Self::QUICK_START_SECONDS,
            warmup_duration: 3.0,
            tempo: TempoSetting::default(),
            notes: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::quick_start()
    }
}
