//! Dominant frequency via a short-time Fourier transform
//!
//! Framing follows the usual centred STFT: the block is zero padded by
//! `fft_size / 2` on both sides, frames of `fft_size` samples are taken every
//! `hop` samples (hop = block length) and weighted by a periodic Hann window.
//! Magnitudes are averaged over frames and the loudest bin wins.

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Default transform length
pub const DEFAULT_FFT_SIZE: usize = 2048;

/// Reusable STFT state for one transform size
pub struct SpectrumAnalyzer {
    fft_size: usize,
    fft: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    frame: Vec<f32>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// `fft_size` must be at least 2
    pub fn new(fft_size: usize) -> Self {
        let fft_size = fft_size.max(2);
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(fft_size);

        let frame = fft.make_input_vec();
        let spectrum = fft.make_output_vec();
        let scratch = fft.make_scratch_vec();
        let magnitudes = vec![0.0; spectrum.len()];

        Self {
            fft_size,
            fft,
            window: hann_periodic(fft_size),
            frame,
            spectrum,
            scratch,
            magnitudes,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Frequency resolution in Hz
    pub fn bin_width(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.fft_size as f32
    }

    /// Mean magnitude per bin (`fft_size / 2 + 1` bins) over the block's frames
    pub fn average_magnitudes(&mut self, block: &[f32]) -> &[f32] {
        self.magnitudes.fill(0.0);
        if block.is_empty() {
            return &self.magnitudes;
        }

        let pad = self.fft_size / 2;
        let hop = block.len();
        let padded_len = block.len() + 2 * pad;
        let n_frames = 1 + (padded_len - self.fft_size) / hop;

        for t in 0..n_frames {
            let frame_start = t * hop;
            for (i, (slot, w)) in self.frame.iter_mut().zip(&self.window).enumerate() {
                // Position in the unpadded block
                let pos = (frame_start + i).checked_sub(pad);
                let sample = pos.and_then(|p| block.get(p)).copied().unwrap_or(0.0);
                *slot = sample * w;
            }

            // Lengths come from the plan, so this cannot fail
            if self
                .fft
                .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch)
                .is_err()
            {
                continue;
            }

            for (mag, bin) in self.magnitudes.iter_mut().zip(&self.spectrum) {
                *mag += bin.norm();
            }
        }

        let scale = 1.0 / n_frames as f32;
        self.magnitudes.iter_mut().for_each(|m| *m *= scale);
        &self.magnitudes
    }

    /// Frequency of the bin with the highest mean magnitude.
    ///
    /// Ties resolve to the lowest bin; an all-zero block reports 0 Hz.
    pub fn dominant_frequency(&mut self, block: &[f32], sample_rate: u32) -> f32 {
        let fft_size = self.fft_size;
        let magnitudes = self.average_magnitudes(block);

        let mut best_bin = 0;
        let mut best = f32::NEG_INFINITY;
        for (k, &m) in magnitudes.iter().enumerate() {
            if m > best {
                best = m;
                best_bin = k;
            }
        }

        best_bin as f32 * sample_rate as f32 / fft_size as f32
    }
}

/// Periodic Hann window of length `n`
fn hann_periodic(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / n as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_hann_periodic() {
        let w = hann_periodic(4);
        assert!((w[0] - 0.0).abs() < 1e-6);
        assert!((w[1] - 0.5).abs() < 1e-6);
        assert!((w[2] - 1.0).abs() < 1e-6);
        assert!((w[3] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sine_resolves_to_nearest_bin() {
        let sr = 44100;
        let mut analyzer = SpectrumAnalyzer::new(2048);
        let bin_width = analyzer.bin_width(sr);

        for freq in [440.0f32, 1000.0, 5000.0] {
            let freq_found = analyzer.dominant_frequency(&sine(freq, sr, 2048), sr);
            assert!(
                (freq_found - freq).abs() <= bin_width,
                "expected ~{}Hz, got {}Hz",
                freq,
                freq_found
            );
        }
    }

    #[test]
    fn test_bin_center_exact() {
        // Bin 20 at 8 kHz / 256 = 625 Hz
        let sr = 8000;
        let mut analyzer = SpectrumAnalyzer::new(256);
        let found = analyzer.dominant_frequency(&sine(625.0, sr, 1024), sr);
        assert_eq!(found, 625.0);
    }

    #[test]
    fn test_silence_is_zero_hz() {
        let mut analyzer = SpectrumAnalyzer::new(512);
        assert_eq!(analyzer.dominant_frequency(&[0.0; 512], 44100), 0.0);
    }

    #[test]
    fn test_block_shorter_than_fft() {
        let sr = 8000;
        let mut analyzer = SpectrumAnalyzer::new(1024);
        let found = analyzer.dominant_frequency(&sine(1000.0, sr, 300), sr);
        assert!((found - 1000.0).abs() <= 2.0 * analyzer.bin_width(sr), "got {}", found);
    }

    #[test]
    fn test_magnitudes_len() {
        let mut analyzer = SpectrumAnalyzer::new(2048);
        assert_eq!(analyzer.average_magnitudes(&[0.1; 100]).len(), 1025);
    }
}
