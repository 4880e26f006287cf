//! Audio output backends
//!
//! [`OutputSink`] is the seam between the playback driver and whatever invokes
//! its render callback:
//! - [`CpalOutput`]: a hardware device through cpal, callback on the driver's
//!   real-time thread
//! - [`ClockedOutput`]: no device; a plain thread invokes the callback, paced in
//!   real time or free-running (headless machines, tests)
//!
//! Sinks are created and owned by the driver's output thread, so they need not be
//! `Send` (cpal streams are not).

use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig, SupportedBufferSize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Result of one render callback invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStatus {
    /// More audio follows
    Continue,
    /// Buffer exhausted or stopped; no further callbacks expected
    Complete,
}

/// Render callback: fills an interleaved f32 buffer with `channels` channels.
///
/// Runs on a real-time thread: must not block, lock, allocate or log.
pub type RenderCallback = Box<dyn FnMut(&mut [f32], usize) -> RenderStatus + Send + 'static>;

/// Deferred sink construction, run on the thread that will own the sink
pub type SinkFactory = Box<dyn FnOnce() -> Result<Box<dyn OutputSink>> + Send + 'static>;

/// An audio output that periodically invokes a render callback
pub trait OutputSink {
    /// Begin invoking `render`
    fn start(&mut self, render: RenderCallback) -> Result<()>;

    /// Stop invoking the callback and release the stream
    fn stop(&mut self) -> Result<()>;

    fn device_name(&self) -> String;

    /// Actual output sample rate
    fn sample_rate(&self) -> u32;

    /// Actual output channel count
    fn channels(&self) -> u16;

    /// True once the backend has reported a stream error
    fn has_error(&self) -> bool {
        false
    }
}

// ============================================================================
// cpal backend
// ============================================================================

/// Audio output using cpal.
pub struct CpalOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    /// Kept (paused) after `stop` until the output is dropped
    stream: Option<Stream>,
    paused: bool,
    /// Stream error flag - set by the error callback
    error_flag: Arc<AtomicBool>,
}

impl CpalOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device.
    ///
    /// # Arguments
    /// - `device_name`: device to use (None = default device). An unknown name
    ///   falls back to the default device.
    /// - `sample_rate`: preferred output rate (the session's sample rate)
    /// - `buffer_frames`: preferred frames per callback; applied only when the
    ///   device reports it as supported
    pub fn open(device_name: Option<&str>, sample_rate: u32, buffer_frames: Option<u32>) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::AudioOutput(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?,
        };

        let (mut config, sample_format, buffer_range) = Self::get_best_config(&device, sample_rate)?;

        if config.sample_rate.0 != sample_rate {
            warn!(
                "Device does not support {}Hz, playing at {}Hz (pitch will differ, analysis unaffected)",
                sample_rate, config.sample_rate.0
            );
        }

        if let Some(frames) = buffer_frames {
            match buffer_range {
                SupportedBufferSize::Range { min, max } if (min..=max).contains(&frames) => {
                    config.buffer_size = cpal::BufferSize::Fixed(frames);
                    debug!("Using requested buffer size: {} frames", frames);
                }
                _ => debug!(
                    "Buffer size {} not supported by device, using device default",
                    frames
                ),
            }
        }

        info!(
            "Audio device: {} ({}Hz, {} channels, {:?}, buffer {:?})",
            device.name().unwrap_or_else(|_| "Unknown".to_string()),
            config.sample_rate.0,
            config.channels,
            sample_format,
            config.buffer_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            paused: false,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Pick a configuration, preferring the target rate and f32 samples.
    fn get_best_config(
        device: &Device,
        sample_rate: u32,
    ) -> Result<(StreamConfig, SampleFormat, SupportedBufferSize)> {
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?
            .collect();

        let rate_ok = |c: &cpal::SupportedStreamConfigRange| {
            c.min_sample_rate().0 <= sample_rate && c.max_sample_rate().0 >= sample_rate
        };
        let format_ok = |c: &cpal::SupportedStreamConfigRange| {
            matches!(c.sample_format(), SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16)
        };

        let preferred = supported
            .iter()
            .filter(|c| rate_ok(c) && c.sample_format() == SampleFormat::F32)
            .min_by_key(|c| c.channels())
            .or_else(|| {
                supported
                    .iter()
                    .filter(|c| rate_ok(c) && format_ok(c))
                    .min_by_key(|c| c.channels())
            });

        if let Some(range) = preferred {
            let chosen = range.clone().with_sample_rate(cpal::SampleRate(sample_rate));
            let buffer_range = chosen.buffer_size().clone();
            return Ok((chosen.config(), chosen.sample_format(), buffer_range));
        }

        // Fallback: device default config
        let chosen = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get default config: {}", e)))?;
        let buffer_range = chosen.buffer_size().clone();
        Ok((chosen.config(), chosen.sample_format(), buffer_range))
    }

    fn error_callback(&self) -> impl FnMut(cpal::StreamError) + Send + 'static {
        let error_flag = Arc::clone(&self.error_flag);
        move |err| {
            error!("Audio stream error: {}", err);
            error_flag.store(true, Ordering::SeqCst);
        }
    }

    fn build_stream_f32(&self, mut render: RenderCallback) -> Result<Stream> {
        let channels = self.config.channels as usize;
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    render(data, channels);
                },
                self.error_callback(),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_i16(&self, mut render: RenderCallback) -> Result<Stream> {
        let channels = self.config.channels as usize;
        // Grows once to the device period, then reused
        let mut scratch: Vec<f32> = Vec::new();
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render(&mut scratch, channels);
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    }
                },
                self.error_callback(),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }

    fn build_stream_u16(&self, mut render: RenderCallback) -> Result<Stream> {
        let channels = self.config.channels as usize;
        let mut scratch: Vec<f32> = Vec::new();
        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    scratch.resize(data.len(), 0.0);
                    render(&mut scratch, channels);
                    for (out, sample) in data.iter_mut().zip(scratch.iter()) {
                        // [-1.0, 1.0] -> [0, 65535]
                        *out = ((sample.clamp(-1.0, 1.0) + 1.0) * 32767.5) as u16;
                    }
                },
                self.error_callback(),
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
    }
}

impl OutputSink for CpalOutput {
    fn start(&mut self, render: RenderCallback) -> Result<()> {
        if self.stream.is_some() {
            return Err(Error::StreamState("Output stream already started".to_string()));
        }

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(render)?,
            SampleFormat::I16 => self.build_stream_i16(render)?,
            SampleFormat::U16 => self.build_stream_u16(render)?,
            sample_format => {
                return Err(Error::AudioOutput(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started");
        Ok(())
    }

    /// Pause the stream. The stream itself is released when the output is
    /// dropped.
    fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.as_ref().filter(|_| !self.paused) {
            info!("Stopping audio stream");
            self.paused = true;
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    fn channels(&self) -> u16 {
        self.config.channels
    }

    fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        let _ = self.stop();
        if self.stream.take().is_some() {
            debug!("Audio stream released");
        }
    }
}

// ============================================================================
// Clocked (deviceless) backend
// ============================================================================

/// Deviceless output: a plain thread invokes the render callback.
///
/// With `realtime` the callback runs once per period (`period_frames /
/// sample_rate`), like a hardware device. Without it the callback runs
/// back-to-back, which plays a buffer as fast as the CPU allows.
pub struct ClockedOutput {
    sample_rate: u32,
    channels: u16,
    period_frames: usize,
    realtime: bool,
    running: Arc<AtomicBool>,
    callbacks: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl ClockedOutput {
    pub fn new(sample_rate: u32, channels: u16, period_frames: usize, realtime: bool) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
            period_frames: period_frames.max(1),
            realtime,
            running: Arc::new(AtomicBool::new(false)),
            callbacks: Arc::new(AtomicU64::new(0)),
            thread: None,
        }
    }

    /// Duration of one callback period
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_frames as f64 / self.sample_rate as f64)
    }

    /// Callback invocations so far
    pub fn callback_count(&self) -> u64 {
        self.callbacks.load(Ordering::Relaxed)
    }

    /// Wait for the clock thread to exit on its own (the callback returned
    /// `Complete`).
    ///
    /// Returns false if it is still running after `timeout`. Returns true
    /// immediately when the output was never started.
    pub fn wait_complete(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            match &self.thread {
                Some(handle) if !handle.is_finished() => {}
                _ => return true,
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl OutputSink for ClockedOutput {
    fn start(&mut self, mut render: RenderCallback) -> Result<()> {
        if self.thread.is_some() {
            return Err(Error::StreamState("Output stream already started".to_string()));
        }

        self.running.store(true, Ordering::SeqCst);

        let running = Arc::clone(&self.running);
        let callbacks = Arc::clone(&self.callbacks);
        let channels = self.channels as usize;
        let mut buffer = vec![0.0f32; self.period_frames * channels];
        let period = self.period();
        let realtime = self.realtime;

        let handle = std::thread::Builder::new()
            .name("mirstream-clock".to_string())
            .spawn(move || {
                let mut next_deadline = Instant::now();
                while running.load(Ordering::SeqCst) {
                    let status = render(&mut buffer, channels);
                    callbacks.fetch_add(1, Ordering::Relaxed);
                    if status == RenderStatus::Complete {
                        break;
                    }
                    if realtime {
                        next_deadline += period;
                        let now = Instant::now();
                        if next_deadline > now {
                            std::thread::sleep(next_deadline - now);
                        }
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn clock thread: {}", e)))?;

        self.thread = Some(handle);
        info!(
            "Clocked output started ({}Hz, {} channels, {} frames per period, realtime={})",
            self.sample_rate, self.channels, self.period_frames, self.realtime
        );
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::AudioOutput("Clock thread panicked".to_string()))?;
            debug!("Clocked output stopped after {} callbacks", self.callback_count());
        }
        Ok(())
    }

    fn device_name(&self) -> String {
        "clocked".to_string()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }
}

impl Drop for ClockedOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
