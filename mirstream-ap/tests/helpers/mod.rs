//! Test helpers for mirstream-ap integration tests
//!
//! - Audio fixtures (WAV files, in-memory signals)
//! - Sessions wired to deviceless sinks

#![allow(dead_code)]

pub mod audio_generator;

pub use audio_generator::{generate_silent_wav, generate_sine_wav, sine_samples};

use mirstream_ap::audio::{AudioSource, ClockedOutput, OutputSink, RenderCallback, SinkFactory};
use mirstream_ap::playback::{Session, SessionOptions, TailPolicy};
use mirstream_common::EventBus;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_SAMPLE_RATE: u32 = 44100;

/// Free-running clocked sink: plays the buffer as fast as possible
pub fn fast_sink(period_frames: usize) -> SinkFactory {
    Box::new(move || -> mirstream_ap::Result<Box<dyn OutputSink>> {
        Ok(Box::new(ClockedOutput::new(TEST_SAMPLE_RATE, 2, period_frames, false)))
    })
}

/// Real-time clocked sink: plays at the nominal rate
pub fn realtime_sink(period_frames: usize) -> SinkFactory {
    Box::new(move || -> mirstream_ap::Result<Box<dyn OutputSink>> {
        Ok(Box::new(ClockedOutput::new(TEST_SAMPLE_RATE, 2, period_frames, true)))
    })
}

/// Sink that accepts a stream but never invokes the callback
pub struct SilentSink {
    render: Option<RenderCallback>,
}

impl OutputSink for SilentSink {
    fn start(&mut self, render: RenderCallback) -> mirstream_ap::Result<()> {
        self.render = Some(render);
        Ok(())
    }

    fn stop(&mut self) -> mirstream_ap::Result<()> {
        self.render = None;
        Ok(())
    }

    fn device_name(&self) -> String {
        "silent".to_string()
    }

    fn sample_rate(&self) -> u32 {
        TEST_SAMPLE_RATE
    }

    fn channels(&self) -> u16 {
        2
    }
}

pub fn silent_sink() -> SinkFactory {
    Box::new(|| -> mirstream_ap::Result<Box<dyn OutputSink>> {
        Ok(Box::new(SilentSink { render: None }))
    })
}

pub fn failing_sink() -> SinkFactory {
    Box::new(|| -> mirstream_ap::Result<Box<dyn OutputSink>> {
        Err(mirstream_ap::Error::AudioOutput("No default output device found".to_string()))
    })
}

/// Options with short timeouts so tests finish quickly
pub fn test_options(tail_policy: TailPolicy) -> SessionOptions {
    SessionOptions {
        tail_policy,
        dequeue_timeout: Duration::from_millis(20),
        poll_interval: Duration::from_millis(5),
        ..SessionOptions::default()
    }
}

/// Session over in-memory samples
pub fn session_for(
    samples: Vec<f32>,
    block_size: usize,
    sink: SinkFactory,
    options: SessionOptions,
) -> (Arc<Session>, Arc<EventBus>) {
    let source = AudioSource::from_samples(samples, TEST_SAMPLE_RATE, block_size)
        .expect("valid source");
    let events = Arc::new(EventBus::new(4096));
    let session = Arc::new(Session::new(source, sink, Arc::clone(&events), options));
    (session, events)
}

/// Run a session to natural completion on a free-running sink
pub fn run_to_completion(
    samples: Vec<f32>,
    block_size: usize,
    tail_policy: TailPolicy,
) -> Arc<Session> {
    let (session, _) = session_for(samples, block_size, fast_sink(256), test_options(tail_policy));
    session.start().expect("session starts");
    session.join().expect("session joins");
    session
}
