//! WAV export of a rendered session.

use std::path::Path;

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::audio::synth;
use crate::audio::tone::ToneRequest;
use crate::error::AudioError;

/// Render `tones` offline and write them as 16-bit mono PCM.
///
/// Returns the number of samples written.
pub fn write_wav<P: AsRef<Path>>(
    path: P,
    tones: &[ToneRequest],
    sample_rate: u32,
    gain: f32,
) -> Result<usize, AudioError> {
    let samples = synth::render(tones, sample_rate, gain);
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path.as_ref(), spec)?;
    for sample in &samples {
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;

    log::info!(
        "[Wav] Wrote {} samples ({:.2}s) to {:?}",
        samples.len(),
        samples.len() as f64 / sample_rate as f64,
        path.as_ref()
    );
    Ok(samples.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::tone::ToneKind;

    #[test]
    fn test_write_and_read_back() {
        let path = std::env::temp_dir().join(format!("fretflow-wav-{}.wav", std::process::id()));
        let tones = [
            ToneRequest::click(0, 0.1),
            ToneRequest::new(ToneKind::CompletionChime, 0.2),
        ];

        let written = write_wav(&path, &tones, 8000, 0.8).unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len() as usize, written);
        assert_eq!(written, (2.2_f64 * 8000.0).ceil() as usize);

        let _ = std::fs::remove_file(&path);
    }
}
