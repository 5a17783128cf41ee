//! Audio sink capability.
//!
//! The scheduler and the countdown cues never touch audio hardware directly;
//! they hand [ToneRequest]s to an `AudioSink`. The sink owns its own clock
//! (`current_time`) and that clock, not the polling cadence, decides when a
//! tone is heard.

use std::sync::Arc;

use crate::audio::tone::ToneRequest;
use crate::error::AudioError;

/// Trait implemented by every audio output.
///
/// Scheduling is fire-and-forget: once `schedule` returns `Ok`, the tone
/// plays at its start time and cannot be recalled.
pub trait AudioSink: Send + Sync {
    /// Acquire the output device. Cheap and idempotent once it has succeeded.
    fn acquire(&self) -> Result<(), AudioError>;

    /// Whether a previous `acquire` succeeded and the output is still usable.
    fn is_available(&self) -> bool;

    /// The sink's own clock in seconds; tone start times are on this clock.
    fn current_time(&self) -> f64;

    fn schedule(&self, tone: ToneRequest) -> Result<(), AudioError>;
}

/// Shared handle used by every component that emits sound.
pub type SharedSink = Arc<dyn AudioSink>;
