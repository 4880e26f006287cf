//! Audio decoder using symphonia
//!
//! Decodes supported formats (WAV, FLAC, MP3, AAC/MP4, Vorbis) to mono f32 PCM.
//! Multi-channel sources are downmixed by averaging the channels of each frame.

use crate::error::{Error, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer as PcmBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded mono audio at the file's native sample rate
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Native sample rate of the file
    pub sample_rate: u32,
    /// Channel count of the source before downmix
    pub source_channels: u16,
}

/// Decode an entire file to mono f32 samples.
///
/// # Errors
/// `Error::Load` when the file cannot be opened, the format is not recognized,
/// no decodable audio track exists, or decoding yields no samples.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    debug!("Decoding file: {}", path.display());

    let file = std::fs::File::open(path)
        .map_err(|e| Error::Load(format!("Failed to open {}: {}", path.display(), e)))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Hint from the extension helps the probe pick a reader
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Load(format!("Unsupported format ({}): {}", path.display(), e)))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Load(format!("No audio track found in {}", path.display())))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Load("Sample rate not found".to_string()))?;
    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Load("Channel count not found".to_string()))?;

    debug!("Audio format: sample_rate={}, channels={}", sample_rate, channels);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Load(format!("Failed to create decoder: {}", e)))?;

    let mut samples = Vec::new();
    let mut pcm: Option<PcmBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                debug!("Reached end of file");
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let needed = decoded.capacity() * spec.channels.count();
                if pcm.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                    pcm = Some(PcmBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = pcm.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    downmix_into(buf.samples(), spec.channels.count(), &mut samples);
                }
            }
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packet: skip it and keep going
                warn!("Decode error: {}", e);
                continue;
            }
            Err(e) => {
                return Err(Error::Load(format!("Decode failed: {}", e)));
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Load(format!(
            "No audio samples decoded from {}",
            path.display()
        )));
    }

    debug!("Decoded {} mono samples", samples.len());

    Ok(DecodedAudio {
        samples,
        sample_rate,
        source_channels: channels,
    })
}

/// Average interleaved frames down to one channel, appending to `output`
fn downmix_into(interleaved: &[f32], channels: usize, output: &mut Vec<f32>) {
    if channels <= 1 {
        output.extend_from_slice(interleaved);
        return;
    }
    output.reserve(interleaved.len() / channels);
    for frame in interleaved.chunks_exact(channels) {
        output.push(frame.iter().sum::<f32>() / channels as f32);
    }
}
