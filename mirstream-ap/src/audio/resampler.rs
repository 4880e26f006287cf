//! Audio resampling using rubato
//!
//! Converts decoded mono audio to the session's target sample rate.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Mono sample rate converter
pub struct Resampler;

impl Resampler {
    /// Resample mono audio from `input_rate` to `output_rate`.
    ///
    /// Returns a copy when the rates already match. The whole input is processed
    /// as a single chunk, so the output length is close to
    /// `input.len() * output_rate / input_rate`.
    pub fn resample_mono(input: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
        if input_rate == 0 || output_rate == 0 {
            return Err(Error::Load(format!(
                "Invalid resample rates: {}Hz -> {}Hz",
                input_rate, output_rate
            )));
        }

        if input_rate == output_rate || input.is_empty() {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }

        debug!("Resampling {} samples from {}Hz to {}Hz", input.len(), input_rate, output_rate);

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // no runtime ratio changes
            PolynomialDegree::Septic,
            input.len(),
            1,
        )
        .map_err(|e| Error::Load(format!("Failed to create resampler: {}", e)))?;

        let planar_input = vec![input.to_vec()];
        let mut planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Load(format!("Resampling failed: {}", e)))?;

        let output = planar_output.pop().unwrap_or_default();
        debug!("Resampled to {} samples", output.len());
        Ok(output)
    }
}
