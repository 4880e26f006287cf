//! Per-block feature analysis
//!
//! - `zcr`, `spectrum`: the numeric feature steps
//! - `store`: append-only result store queried by index
//! - `worker`: the background analysis thread

pub mod spectrum;
pub mod store;
pub mod worker;
pub mod zcr;

pub use spectrum::SpectrumAnalyzer;
pub use store::ResultStore;
pub use worker::{AnalyzerOptions, AnalyzerStats, FeatureAnalyzer};

use thiserror::Error;

/// Features computed for one block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockFeatures {
    pub zcr: f32,
    pub dominant_frequency: f32,
}

/// A block the extractor refused to analyze.
///
/// Logged and counted by the worker; never propagated to callers.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisSkipped {
    #[error("block too short for analysis ({len} samples)")]
    TooShort { len: usize },

    #[error("block contains a non-finite sample at offset {offset}")]
    NonFinite { offset: usize },
}

/// Computes [`BlockFeatures`] for blocks at a fixed sample rate
pub struct FeatureExtractor {
    sample_rate: u32,
    spectrum: SpectrumAnalyzer,
}

impl FeatureExtractor {
    pub fn new(sample_rate: u32, fft_size: usize) -> Self {
        Self {
            sample_rate,
            spectrum: SpectrumAnalyzer::new(fft_size),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn fft_size(&self) -> usize {
        self.spectrum.fft_size()
    }

    pub fn analyze(&mut self, block: &[f32]) -> Result<BlockFeatures, AnalysisSkipped> {
        if let Some(offset) = block.iter().position(|s| !s.is_finite()) {
            return Err(AnalysisSkipped::NonFinite { offset });
        }
        let zcr = zcr::zero_crossing_rate(block)
            .ok_or(AnalysisSkipped::TooShort { len: block.len() })?;
        let dominant_frequency = self.spectrum.dominant_frequency(block, self.sample_rate);

        Ok(BlockFeatures {
            zcr,
            dominant_frequency,
        })
    }
}
