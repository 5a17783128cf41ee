//! Configuration management for engine tuning
//!
//! This module provides runtime configuration loading from JSON files,
//! so polling cadence, look-ahead horizon and output settings can be
//! adjusted without recompilation. The defaults reproduce the reference
//! timing: 25 ms scheduler polls, a 0.1 s look-ahead window and 100 ms
//! countdown ticks.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ErrorCode, SessionError};

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub countdown: CountdownConfig,
    #[serde(default)]
    pub audio: AudioConfig,
}

/// Look-ahead scheduler timing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often the scheduler wakes up to queue ticks (milliseconds)
    pub lookahead_poll_ms: u64,
    /// Horizon within which ticks are handed to the sink (seconds)
    pub schedule_ahead_s: f64,
    /// Offset of the first tick after `start()` so it is never in the past (seconds)
    pub start_delay_s: f64,
    /// Upper bound on ticks dispatched by a single poll; 0 disables the bound
    pub max_catch_up_ticks: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lookahead_poll_ms: 25,
            schedule_ahead_s: 0.1,
            start_delay_s: 0.1,
            max_catch_up_ticks: 64,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.lookahead_poll_ms)
    }
}

/// Countdown timer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountdownConfig {
    /// Countdown tick period; each tick removes exactly this much time
    pub tick_ms: u64,
    /// Length of the warmup countdown in whole seconds
    pub warmup_seconds: u32,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_ms: 100,
            warmup_seconds: 3,
        }
    }
}

impl CountdownConfig {
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate for offline renders; preferred rate for hardware output
    pub sample_rate: u32,
    /// Capacity of the tone queue feeding the audio callback
    pub tone_queue_capacity: usize,
    /// Output gain applied after mixing
    pub master_gain: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            tone_queue_capacity: 256,
            master_gain: 0.8,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// # Arguments
    /// * `path` - Path to JSON config file
    ///
    /// # Returns
    /// The loaded configuration, or defaults if the file is missing,
    /// unparseable or fails validation.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<AppConfig>(&contents) {
                Ok(config) => match config.validate() {
                    Ok(()) => {
                        log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                        config
                    }
                    Err(err) => {
                        log::warn!(
                            "[Config] Rejected configuration from {:?}: {}. Using defaults.",
                            path.as_ref(),
                            err.message()
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Load configuration from the default asset location
    pub fn load() -> Self {
        Self::load_from_file("assets/fretflow_config.json")
    }

    /// Reject values that would stall or spin the engine
    pub fn validate(&self) -> Result<(), SessionError> {
        let invalid = |reason: &str| {
            Err(SessionError::ConfigInvalid {
                reason: reason.to_string(),
            })
        };

        if self.scheduler.lookahead_poll_ms == 0 {
            return invalid("scheduler.lookahead_poll_ms must be > 0");
        }
        if !(self.scheduler.schedule_ahead_s.is_finite() && self.scheduler.schedule_ahead_s > 0.0)
        {
            return invalid("scheduler.schedule_ahead_s must be > 0");
        }
        if !(self.scheduler.start_delay_s.is_finite() && self.scheduler.start_delay_s >= 0.0) {
            return invalid("scheduler.start_delay_s must be >= 0");
        }
        if self.countdown.tick_ms == 0 {
            return invalid("countdown.tick_ms must be > 0");
        }
        if self.countdown.warmup_seconds == 0 {
            return invalid("countdown.warmup_seconds must be > 0");
        }
        if self.audio.sample_rate == 0 {
            return invalid("audio.sample_rate must be > 0");
        }
        if self.audio.tone_queue_capacity == 0 {
            return invalid("audio.tone_queue_capacity must be > 0");
        }
        Ok(())
    }
}
