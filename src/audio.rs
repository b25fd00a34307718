//! WAV read/write at the generator's fixed sample rate.

use std::path::Path;

use crate::error::{Error, Result};

/// Audio sample rate produced by the generation backend.
pub const SAMPLE_RATE: u32 = 24_000;

/// Duration in seconds of a sample buffer at [`SAMPLE_RATE`].
pub fn duration_secs(samples: &[f32]) -> f32 {
    samples.len() as f32 / SAMPLE_RATE as f32
}

/// Write `samples` to a mono 16-bit PCM WAV file at [`SAMPLE_RATE`] Hz.
pub fn write_wav(path: &Path, samples: &[f32]) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        // f32 [-1.0, 1.0] → i16 [-32768, 32767]
        let s16 = (s * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16;
        writer.write_sample(s16)?;
    }
    writer.finalize()?;
    log::info!(
        "saved {} samples ({:.2} s) to {}",
        samples.len(),
        duration_secs(samples),
        path.display()
    );
    Ok(())
}

/// Read a mono 16-bit PCM WAV file written by [`write_wav`] back into
/// f32 samples.  Used to reload persisted chunks when resuming a job.
pub fn read_wav(path: &Path) -> Result<Vec<f32>> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_format != hound::SampleFormat::Int
        || spec.bits_per_sample != 16
        || spec.channels != 1
    {
        return Err(Error::Config(format!(
            "{}: expected mono 16-bit PCM, got {} ch / {} bit {:?}",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        )));
    }
    reader
        .into_samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32).map_err(Error::from))
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wav_roundtrip() {
        let path = std::env::temp_dir()
            .join(format!("longbark-audio-{}.wav", std::process::id()));
        let samples: Vec<f32> = (0..480)
            .map(|i| (i as f32 / 480.0 * std::f32::consts::TAU).sin() * 0.5)
            .collect();

        write_wav(&path, &samples).unwrap();
        let loaded = read_wav(&path).unwrap();

        assert_eq!(loaded.len(), samples.len());
        for (a, b) in samples.iter().zip(&loaded) {
            // 16-bit quantisation error bound
            assert!((a - b).abs() < 1.0 / 16_384.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_duration() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize * 2];
        assert!((duration_secs(&samples) - 2.0).abs() < f32::EPSILON);
    }
}
