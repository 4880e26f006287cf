//! Audio test file generation
//!
//! Deterministic WAV files with known content for load and analysis tests.

use hound::{WavSpec, WavWriter};
use std::f32::consts::PI;
use std::path::Path;

/// Generate a 16-bit sine WAV file.
///
/// Every channel carries the same signal.
pub fn generate_sine_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    frequency_hz: f32,
    amplitude: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * PI * frequency_hz * t).sin() * amplitude;
        let value = (sample * i16::MAX as f32) as i16;
        for _ in 0..channels {
            writer.write_sample(value)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Generate a silent 16-bit WAV file
pub fn generate_silent_wav<P: AsRef<Path>>(
    path: P,
    sample_rate: u32,
    channels: u16,
    frames: usize,
) -> Result<(), hound::Error> {
    generate_sine_wav(path, sample_rate, channels, frames, 0.0, 0.0)
}

/// Sine samples in memory
pub fn sine_samples(sample_rate: u32, len: usize, frequency_hz: f32, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin() * amplitude)
        .collect()
}
