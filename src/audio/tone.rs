//! Tone requests - the only thing the engine ever asks an audio sink to play.
//!
//! Every sound in a session is a sine voice with an exponential decay:
//! - metronome downbeat: 880 Hz, 1.0 peak decaying to 0.001 in 20 ms, 30 ms long
//! - metronome quarter note: 440 Hz, same envelope
//! - countdown beep: 440 Hz, 0.2 peak decaying to 0.001 in 100 ms, 150 ms long
//! - completion chime: 523.25 Hz, 0.4 peak decaying to 0.01 in 1.5 s, 2 s long

use serde::{Deserialize, Serialize};

pub const DOWNBEAT_HZ: f64 = 880.0;
pub const BEAT_HZ: f64 = 440.0;
pub const COUNTDOWN_BEEP_HZ: f64 = 440.0;
pub const COMPLETION_CHIME_HZ: f64 = 523.25;

/// Which cue a tone belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneKind {
    Downbeat,
    Beat,
    CountdownBeep,
    CompletionChime,
}

/// Exponential decay from `peak_gain` to `floor_gain` over `decay_seconds`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub peak_gain: f32,
    pub floor_gain: f32,
    pub decay_seconds: f64,
}

impl Envelope {
    const CLICK: Envelope = Envelope {
        peak_gain: 1.0,
        floor_gain: 0.001,
        decay_seconds: 0.02,
    };

    const BEEP: Envelope = Envelope {
        peak_gain: 0.2,
        floor_gain: 0.001,
        decay_seconds: 0.1,
    };

    const CHIME: Envelope = Envelope {
        peak_gain: 0.4,
        floor_gain: 0.01,
        decay_seconds: 1.5,
    };

    /// Gain `elapsed` seconds after the voice started
    pub fn gain_at(&self, elapsed: f64) -> f32 {
        if elapsed < 0.0 {
            return 0.0;
        }
        if elapsed >= self.decay_seconds {
            return self.floor_gain;
        }
        let ratio = (self.floor_gain / self.peak_gain) as f64;
        (self.peak_gain as f64 * ratio.powf(elapsed / self.decay_seconds)) as f32
    }
}

/// A request to play one tone at an absolute audio-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToneRequest {
    pub kind: ToneKind,
    pub frequency_hz: f64,
    pub start_time: f64,
    pub duration_seconds: f64,
    pub envelope: Envelope,
}

impl ToneRequest {
    /// Build the preset tone for `kind` starting at `start_time`
    pub fn new(kind: ToneKind, start_time: f64) -> Self {
        let (frequency_hz, duration_seconds, envelope) = match kind {
            ToneKind::Downbeat => (DOWNBEAT_HZ, 0.03, Envelope::CLICK),
            ToneKind::Beat => (BEAT_HZ, 0.03, Envelope::CLICK),
            ToneKind::CountdownBeep => (COUNTDOWN_BEEP_HZ, 0.15, Envelope::BEEP),
            ToneKind::CompletionChime => (COMPLETION_CHIME_HZ, 2.0, Envelope::CHIME),
        };
        Self {
            kind,
            frequency_hz,
            start_time,
            duration_seconds,
            envelope,
        }
    }

    /// Metronome click for a sounded tick; index 0 of the bar is the downbeat.
    pub fn click(tick_index: u8, start_time: f64) -> Self {
        if tick_index == 0 {
            Self::new(ToneKind::Downbeat, start_time)
        } else {
            Self::new(ToneKind::Beat, start_time)
        }
    }

    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration_seconds
    }

    pub fn is_metronome(&self) -> bool {
        matches!(self.kind, ToneKind::Downbeat | ToneKind::Beat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_frequencies() {
        assert_eq!(ToneRequest::new(ToneKind::Downbeat, 0.0).frequency_hz, 880.0);
        assert_eq!(ToneRequest::new(ToneKind::Beat, 0.0).frequency_hz, 440.0);
        assert_eq!(
            ToneRequest::new(ToneKind::CountdownBeep, 0.0).frequency_hz,
            440.0
        );
        assert_eq!(
            ToneRequest::new(ToneKind::CompletionChime, 0.0).frequency_hz,
            523.25
        );
    }

    #[test]
    fn test_click_pitch_follows_bar_position() {
        assert_eq!(ToneRequest::click(0, 1.0).kind, ToneKind::Downbeat);
        assert_eq!(ToneRequest::click(4, 1.0).kind, ToneKind::Beat);
        assert_eq!(ToneRequest::click(12, 1.0).kind, ToneKind::Beat);
    }

    #[test]
    fn test_envelope_decays_to_floor() {
        let env = ToneRequest::new(ToneKind::CompletionChime, 0.0).envelope;
        assert!((env.gain_at(0.0) - 0.4).abs() < 1e-6);
        assert!((env.gain_at(1.5) - 0.01).abs() < 1e-6);
        assert!(env.gain_at(0.75) < 0.4 && env.gain_at(0.75) > 0.01);
        assert_eq!(env.gain_at(-0.1), 0.0);
    }

    #[test]
    fn test_end_time() {
        let beep = ToneRequest::new(ToneKind::CountdownBeep, 2.0);
        assert!((beep.end_time() - 2.15).abs() < 1e-12);
        assert!(!beep.is_metronome());
    }
}
