//! Audio source: the immutable sample buffer a session plays and analyzes
//!
//! The buffer is loaded once, scaled once, and then shared read-only between the
//! real-time output callback and the analysis thread via `Arc<[f32]>`.

use crate::audio::decoder::decode_file;
use crate::audio::resampler::Resampler;
use crate::error::{Error, Result};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Immutable mono samples at a fixed sample rate
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// Shared handle to the samples
    pub fn samples(&self) -> Arc<[f32]> {
        Arc::clone(&self.samples)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Loaded audio plus the block geometry used to slice it
#[derive(Debug, Clone)]
pub struct AudioSource {
    buffer: SampleBuffer,
    block_size: usize,
    path: Option<PathBuf>,
}

impl AudioSource {
    /// Load a file as mono at `sample_rate`, applying `scale` once.
    ///
    /// # Errors
    /// `Error::Load` for missing/unsupported/corrupt files, an empty decode, or
    /// invalid parameters.
    pub fn load(path: &Path, sample_rate: u32, block_size: usize, scale: f32) -> Result<Self> {
        validate_params(sample_rate, block_size)?;
        if !scale.is_finite() {
            return Err(Error::Load(format!("Invalid amplitude scale: {}", scale)));
        }

        let decoded = decode_file(path)?;
        let mut samples =
            Resampler::resample_mono(&decoded.samples, decoded.sample_rate, sample_rate)?;

        if scale != 1.0 {
            samples.iter_mut().for_each(|s| *s *= scale);
        }

        let source = Self {
            buffer: SampleBuffer::new(samples, sample_rate),
            block_size,
            path: Some(path.to_path_buf()),
        };

        info!(
            "Loaded {}: {} samples @ {}Hz ({:.2}s, {} source channels), {} blocks of {}",
            path.display(),
            source.total_samples(),
            sample_rate,
            source.duration().as_secs_f64(),
            decoded.source_channels,
            source.total_blocks(),
            block_size
        );

        Ok(source)
    }

    /// Build a source from in-memory samples already at `sample_rate`
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, block_size: usize) -> Result<Self> {
        validate_params(sample_rate, block_size)?;
        Ok(Self {
            buffer: SampleBuffer::new(samples, sample_rate),
            block_size,
            path: None,
        })
    }

    pub fn buffer(&self) -> &SampleBuffer {
        &self.buffer
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }

    pub fn total_samples(&self) -> usize {
        self.buffer.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of complete blocks
    pub fn full_blocks(&self) -> usize {
        self.total_samples() / self.block_size
    }

    /// Number of blocks including a partial tail
    pub fn total_blocks(&self) -> usize {
        self.total_samples().div_ceil(self.block_size)
    }

    /// Length of the partial tail block (0 when the buffer divides evenly)
    pub fn tail_len(&self) -> usize {
        self.total_samples() % self.block_size
    }

    /// Sample range covered by block `index`, clamped to the buffer end
    pub fn block_range(&self, index: usize) -> Option<Range<usize>> {
        let start = index.checked_mul(self.block_size)?;
        if start >= self.total_samples() {
            return None;
        }
        let end = (start + self.block_size).min(self.total_samples());
        Some(start..end)
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.total_samples() as f64 / self.sample_rate() as f64)
    }
}

fn validate_params(sample_rate: u32, block_size: usize) -> Result<()> {
    if sample_rate == 0 {
        return Err(Error::Load("Sample rate must be greater than zero".to_string()));
    }
    if block_size == 0 {
        return Err(Error::Load("Block size must be greater than zero".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_geometry_with_tail() {
        let source = AudioSource::from_samples(vec![0.0; 2048 * 3 + 100], 44100, 2048).unwrap();
        assert_eq!(source.full_blocks(), 3);
        assert_eq!(source.total_blocks(), 4);
        assert_eq!(source.tail_len(), 100);
        assert_eq!(source.block_range(0), Some(0..2048));
        assert_eq!(source.block_range(3), Some(6144..6244));
        assert_eq!(source.block_range(4), None);
    }

    #[test]
    fn test_block_geometry_exact() {
        let source = AudioSource::from_samples(vec![0.0; 1024 * 2], 8000, 1024).unwrap();
        assert_eq!(source.full_blocks(), 2);
        assert_eq!(source.total_blocks(), 2);
        assert_eq!(source.tail_len(), 0);
    }

    #[test]
    fn test_invalid_params() {
        assert!(matches!(
            AudioSource::from_samples(vec![0.0; 10], 0, 4),
            Err(Error::Load(_))
        ));
        assert!(matches!(
            AudioSource::from_samples(vec![0.0; 10], 44100, 0),
            Err(Error::Load(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = AudioSource::load(Path::new("/nonexistent/test_track.wav"), 44100, 2048, 1.0);
        assert!(matches!(result, Err(Error::Load(_))));
    }

    #[test]
    fn test_duration() {
        let source = AudioSource::from_samples(vec![0.0; 22050], 44100, 2048).unwrap();
        assert_eq!(source.duration(), Duration::from_millis(500));
    }
}
