//! Playback driver: owns the output thread
//!
//! Output sinks may not be `Send` (cpal streams are not), so the sink is built,
//! started, stopped and dropped on a dedicated "mirstream-output" thread. The
//! thread keeps the stream alive until stop is requested or rendering finishes,
//! then stops the sink. The stopped sink (for cpal, the paused stream) is only
//! dropped when teardown releases it.

use crate::audio::output::{OutputSink, SinkFactory};
use crate::error::{Error, Result};
use crate::playback::cursor::{BlockCursor, CursorFlags};
use crate::playback::state::StopSignal;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default keep-alive poll interval of the output thread
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Output device as actually opened
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Drives one output stream from start to teardown
pub struct PlaybackDriver {
    factory: Option<SinkFactory>,
    cursor: Option<BlockCursor>,
    flags: CursorFlags,
    stop: StopSignal,
    poll_interval: Duration,
    /// Set by the output thread once the sink has stopped invoking the callback
    stopped: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    release_tx: Option<mpsc::Sender<()>>,
    device: Option<DeviceInfo>,
    torn_down: bool,
}

impl PlaybackDriver {
    pub fn new(
        factory: SinkFactory,
        cursor: BlockCursor,
        flags: CursorFlags,
        stop: StopSignal,
        poll_interval: Duration,
    ) -> Self {
        Self {
            factory: Some(factory),
            cursor: Some(cursor),
            flags,
            stop,
            poll_interval,
            stopped: Arc::new(AtomicBool::new(false)),
            thread: None,
            release_tx: None,
            device: None,
            torn_down: false,
        }
    }

    /// Open the output and begin rendering.
    ///
    /// Blocks until the output thread reports whether the device started.
    ///
    /// # Errors
    /// - `Error::StreamState` if already started or torn down
    /// - `Error::AudioOutput` if the device cannot be opened or started
    pub fn start(&mut self) -> Result<DeviceInfo> {
        if self.torn_down {
            return Err(Error::StreamState("Output already torn down".to_string()));
        }
        let (factory, mut cursor) = match (self.factory.take(), self.cursor.take()) {
            (Some(factory), Some(cursor)) => (factory, cursor),
            _ => return Err(Error::StreamState("Output already started".to_string())),
        };

        let (ready_tx, ready_rx) = mpsc::channel::<Result<DeviceInfo>>();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let flags = self.flags.clone();
        let stop = self.stop.clone();
        let stopped = Arc::clone(&self.stopped);
        let poll_interval = self.poll_interval;

        let handle = std::thread::Builder::new()
            .name("mirstream-output".to_string())
            .spawn(move || {
                // Create the sink here: it must live and die on this thread
                let mut sink: Box<dyn OutputSink> = match factory() {
                    Ok(sink) => sink,
                    Err(e) => {
                        error!("Failed to create audio output: {}", e);
                        stopped.store(true, Ordering::Release);
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };

                let info = DeviceInfo {
                    name: sink.device_name(),
                    sample_rate: sink.sample_rate(),
                    channels: sink.channels(),
                };

                if let Err(e) = sink.start(Box::new(move |out: &mut [f32], channels: usize| {
                    cursor.render(out, channels)
                })) {
                    error!("Failed to start audio output: {}", e);
                    stopped.store(true, Ordering::Release);
                    let _ = ready_tx.send(Err(e));
                    return;
                }

                let _ = ready_tx.send(Ok(info));

                // Keep the stream alive until stopped or the buffer is done
                let mut error_reported = false;
                while !stop.is_requested() && !flags.is_finished() {
                    if !error_reported && sink.has_error() {
                        warn!("Audio device reported a stream error, continuing");
                        error_reported = true;
                    }
                    std::thread::sleep(poll_interval);
                }

                if let Err(e) = sink.stop() {
                    warn!("Error stopping audio output: {}", e);
                }
                stopped.store(true, Ordering::Release);
                info!("Audio output stopped");

                // Hold the device until teardown (or until the driver is dropped)
                let _ = release_rx.recv();
                drop(sink);
                debug!("Audio device released");
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn output thread: {}", e)))?;

        let ready = ready_rx.recv().unwrap_or_else(|_| {
            Err(Error::AudioOutput("Output thread exited during startup".to_string()))
        });

        match ready {
            Ok(info) => {
                info!(
                    "Audio output started: {} ({}Hz, {} channels)",
                    info.name, info.sample_rate, info.channels
                );
                self.thread = Some(handle);
                self.release_tx = Some(release_tx);
                self.device = Some(info.clone());
                Ok(info)
            }
            Err(e) => {
                let _ = handle.join();
                self.torn_down = true;
                Err(e)
            }
        }
    }

    /// True once the output has stopped invoking the render callback
    pub fn is_finished(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Shared handle to the flag behind [`is_finished`](Self::is_finished)
    pub fn finished_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stopped)
    }

    /// Block until the output has stopped.
    ///
    /// Returns immediately if the driver was never started.
    pub fn wait_finished(&self) {
        if self.thread.is_none() {
            return;
        }
        while !self.is_finished() {
            std::thread::sleep(self.poll_interval.min(Duration::from_millis(10)));
        }
    }

    pub fn device(&self) -> Option<&DeviceInfo> {
        self.device.as_ref()
    }

    /// Release the device and join the output thread.
    ///
    /// # Errors
    /// `Error::StreamState` if the output is still running or teardown already
    /// happened.
    pub fn teardown(&mut self) -> Result<()> {
        if self.torn_down {
            return Err(Error::StreamState("Output already torn down".to_string()));
        }
        if self.thread.is_some() && !self.is_finished() {
            return Err(Error::StreamState(
                "Output still running; stop it before teardown".to_string(),
            ));
        }

        if let Some(tx) = self.release_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.thread.take() {
            handle
                .join()
                .map_err(|_| Error::AudioOutput("Output thread panicked".to_string()))?;
        }
        self.torn_down = true;
        debug!("Playback driver torn down");
        Ok(())
    }
}

impl Drop for PlaybackDriver {
    fn drop(&mut self) {
        if let Some(handle) = self.thread.take() {
            self.stop.request();
            self.release_tx.take();
            let _ = handle.join();
        }
    }
}
