//! Tone synthesis shared by the hardware sink and the offline renderer.
//!
//! Pure functions of time: a voice's output at audio-clock time `t` depends
//! only on its [ToneRequest], never on when the request arrived. That is
//! what lets the scheduler queue a click early without shifting it.

use std::f64::consts::TAU;

use crate::audio::tone::ToneRequest;

/// Voices the real-time mixer can hold at once. A busy bar at 300 BPM with a
/// countdown beep and a ringing chime stays far below this.
pub const MAX_VOICES: usize = 32;

/// One sounding (or pending) tone
#[derive(Debug, Clone, Copy)]
pub struct Voice {
    tone: ToneRequest,
}

impl Voice {
    pub fn new(tone: ToneRequest) -> Self {
        Self { tone }
    }

    #[inline]
    pub fn sample_at(&self, t: f64) -> f32 {
        let elapsed = t - self.tone.start_time;
        if elapsed < 0.0 || elapsed >= self.tone.duration_seconds {
            return 0.0;
        }
        let phase = (TAU * self.tone.frequency_hz * elapsed).sin() as f32;
        phase * self.tone.envelope.gain_at(elapsed)
    }

    #[inline]
    pub fn is_finished(&self, t: f64) -> bool {
        t >= self.tone.end_time()
    }
}

/// Fixed-capacity voice mixer
///
/// All allocation happens in [Mixer::new], so `push`, `next_sample` and
/// `prune` are safe to call from an audio callback.
pub struct Mixer {
    voices: Vec<Voice>,
    gain: f32,
}

impl Mixer {
    pub fn new(gain: f32) -> Self {
        Self {
            voices: Vec::with_capacity(MAX_VOICES),
            gain,
        }
    }

    /// Add a voice. Returns `false` (and drops the tone) when full.
    pub fn push(&mut self, tone: ToneRequest) -> bool {
        if self.voices.len() >= MAX_VOICES {
            return false;
        }
        self.voices.push(Voice::new(tone));
        true
    }

    #[inline]
    pub fn next_sample(&self, t: f64) -> f32 {
        let mixed: f32 = self.voices.iter().map(|voice| voice.sample_at(t)).sum();
        (mixed * self.gain).clamp(-1.0, 1.0)
    }

    /// Drop voices that have finished by time `t`
    pub fn prune(&mut self, t: f64) {
        self.voices.retain(|voice| !voice.is_finished(t));
    }

    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }
}

/// Render tones into a mono buffer long enough to hold the last one.
///
/// Sample `i` corresponds to audio-clock time `i / sample_rate`.
pub fn render(tones: &[ToneRequest], sample_rate: u32, gain: f32) -> Vec<f32> {
    let sr = sample_rate as f64;
    let end = tones
        .iter()
        .map(|tone| tone.end_time())
        .fold(0.0_f64, f64::max);
    let len = (end * sr).ceil() as usize;
    let mut buffer = vec![0.0_f32; len];

    for tone in tones {
        let voice = Voice::new(*tone);
        let first = (tone.start_time.max(0.0) * sr).floor() as usize;
        let last = ((tone.end_time() * sr).ceil() as usize).min(len);
        for (i, sample) in buffer.iter_mut().enumerate().take(last).skip(first) {
            *sample += voice.sample_at(i as f64 / sr);
        }
    }

    for sample in buffer.iter_mut() {
        *sample = (*sample * gain).clamp(-1.0, 1.0);
    }
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::ToneKind;

    #[test]
    fn test_voice_silent_outside_its_window() {
        let voice = Voice::new(ToneRequest::new(ToneKind::Beat, 1.0));
        assert_eq!(voice.sample_at(0.999), 0.0);
        assert_eq!(voice.sample_at(1.03), 0.0);
        assert!(!voice.is_finished(1.02));
        assert!(voice.is_finished(1.03));
    }

    #[test]
    fn test_voice_audible_inside_window() {
        let voice = Voice::new(ToneRequest::new(ToneKind::Downbeat, 0.0));
        // quarter period of 880 Hz: sine peak, envelope still near 1.0
        let t = 1.0 / (4.0 * 880.0);
        assert!(voice.sample_at(t) > 0.8);
    }

    #[test]
    fn test_mixer_capacity_is_fixed() {
        let mut mixer = Mixer::new(1.0);
        for i in 0..MAX_VOICES {
            assert!(mixer.push(ToneRequest::new(ToneKind::Beat, i as f64)));
        }
        assert!(!mixer.push(ToneRequest::new(ToneKind::Beat, 99.0)));
        assert_eq!(mixer.active_voices(), MAX_VOICES);

        mixer.prune(5.0);
        assert_eq!(mixer.active_voices(), MAX_VOICES - 5);
    }

    #[test]
    fn test_render_places_tone_at_start_time() {
        let sample_rate = 48000;
        let tone = ToneRequest::new(ToneKind::Beat, 0.5);
        let buffer = render(&[tone], sample_rate, 1.0);

        assert_eq!(buffer.len(), (tone.end_time() * 48000.0).ceil() as usize);
        assert!(buffer[..24000].iter().all(|s| *s == 0.0));
        assert!(buffer[24000..24100].iter().any(|s| s.abs() > 0.1));
    }

    #[test]
    fn test_render_empty() {
        assert!(render(&[], 48000, 1.0).is_empty());
    }
}
