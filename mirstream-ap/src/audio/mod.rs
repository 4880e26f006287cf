//! Audio loading and output
//!
//! - `decoder`: file decoding to mono f32 (symphonia)
//! - `resampler`: sample rate conversion (rubato)
//! - `source`: the immutable, block-addressable sample buffer
//! - `output`: output sinks that drive the render callback (cpal or clocked)

pub mod decoder;
pub mod output;
pub mod resampler;
pub mod source;

pub use output::{ClockedOutput, CpalOutput, OutputSink, RenderCallback, RenderStatus, SinkFactory};
pub use source::{AudioSource, SampleBuffer};
