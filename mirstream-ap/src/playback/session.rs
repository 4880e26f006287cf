//! Session lifecycle controller
//!
//! Coordinates the playback driver and the analysis thread through
//! `Idle -> Streaming -> Stopping -> Stopped`.
//!
//! The state is an atomic so status reads never wait on a lock. The thread
//! handles live behind a mutex; joiners take them out of the lock while waiting
//! and late joiners park on a condvar until the first joiner is done.

use crate::analysis::worker::{AnalyzerContext, AnalyzerOptions, AnalyzerStats, DEFAULT_DEQUEUE_TIMEOUT};
use crate::analysis::{FeatureAnalyzer, ResultStore};
use crate::audio::output::SinkFactory;
use crate::audio::source::AudioSource;
use crate::error::{Error, Result};
use crate::playback::cursor::{BlockCursor, CursorFlags};
use crate::playback::driver::{DeviceInfo, PlaybackDriver, DEFAULT_POLL_INTERVAL};
use crate::playback::queue::{frame_queue, DEFAULT_QUEUE_CAPACITY};
use crate::playback::state::{PipelineCounters, PipelineStats, StopSignal, TailPolicy};
use crate::analysis::spectrum::DEFAULT_FFT_SIZE;
use mirstream_common::{EventBus, MirEvent, SessionState};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

/// Pipeline tuning for one session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub fft_size: usize,
    pub tail_policy: TailPolicy,
    pub queue_capacity: usize,
    pub dequeue_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            fft_size: DEFAULT_FFT_SIZE,
            tail_policy: TailPolicy::default(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dequeue_timeout: DEFAULT_DEQUEUE_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Status snapshot for `/status` and logs
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub state: SessionState,
    pub sample_rate: u32,
    pub block_size: usize,
    pub total_blocks: usize,
    pub tail_policy: TailPolicy,
    /// Records currently in the result store
    pub analyzed: usize,
    pub exhausted: bool,
    #[serde(flatten)]
    pub pipeline: PipelineStats,
    pub device: Option<DeviceInfo>,
}

#[derive(Default)]
struct Inner {
    sink_factory: Option<SinkFactory>,
    driver: Option<PlaybackDriver>,
    analyzer: Option<FeatureAnalyzer>,
    device: Option<DeviceInfo>,
    /// Outlives `driver`, which a joiner takes out of the lock while waiting
    output_finished: Option<Arc<AtomicBool>>,
    joining: bool,
    joined: bool,
    torn_down: bool,
    analyzer_stats: Option<AnalyzerStats>,
    /// Failure seen by the first joiner, reported to every later joiner
    join_error: Option<String>,
}

impl Inner {
    fn join_result(&self) -> Result<AnalyzerStats> {
        match &self.join_error {
            Some(message) => Err(Error::StreamState(message.clone())),
            None => Ok(self.analyzer_stats.unwrap_or_default()),
        }
    }
}

/// One playback-and-analysis run over an [`AudioSource`]
pub struct Session {
    source: AudioSource,
    options: SessionOptions,
    store: Arc<ResultStore>,
    events: Arc<EventBus>,
    stop: StopSignal,
    flags: CursorFlags,
    counters: Arc<PipelineCounters>,
    state: AtomicU8,
    inner: Mutex<Inner>,
    join_done: Condvar,
}

impl Session {
    pub fn new(
        source: AudioSource,
        sink_factory: SinkFactory,
        events: Arc<EventBus>,
        options: SessionOptions,
    ) -> Self {
        Self {
            source,
            options,
            store: Arc::new(ResultStore::new()),
            events,
            stop: StopSignal::new(),
            flags: CursorFlags::default(),
            counters: PipelineCounters::new(),
            state: AtomicU8::new(SessionState::Idle.as_u8()),
            inner: Mutex::new(Inner {
                sink_factory: Some(sink_factory),
                ..Inner::default()
            }),
            join_done: Condvar::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn store(&self) -> Arc<ResultStore> {
        Arc::clone(&self.store)
    }

    pub fn source(&self) -> &AudioSource {
        &self.source
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Start the analysis thread, then the output.
    ///
    /// # Errors
    /// - `Error::StreamState` unless the session is Idle
    /// - `Error::AudioOutput` if the device fails; the session ends Stopped
    pub fn start(&self) -> Result<()> {
        let mut inner = self.lock();

        if self.state() != SessionState::Idle {
            return Err(Error::StreamState(format!(
                "Cannot start session in state {}",
                self.state()
            )));
        }
        let factory = inner
            .sink_factory
            .take()
            .ok_or_else(|| Error::StreamState("Session already started".to_string()))?;

        let (producer, consumer) =
            frame_queue(self.options.queue_capacity, Arc::clone(&self.counters));
        let samples = self.source.buffer().samples();

        let analyzer = FeatureAnalyzer::spawn(
            AnalyzerOptions {
                sample_rate: self.source.sample_rate(),
                fft_size: self.options.fft_size,
                dequeue_timeout: self.options.dequeue_timeout,
            },
            AnalyzerContext {
                consumer,
                samples: Arc::clone(&samples),
                store: Arc::clone(&self.store),
                events: Arc::clone(&self.events),
                stop: self.stop.clone(),
                flags: self.flags.clone(),
                counters: Arc::clone(&self.counters),
            },
        );
        let analyzer = match analyzer {
            Ok(analyzer) => analyzer,
            Err(e) => {
                self.fail_start(&mut inner);
                return Err(e);
            }
        };

        let cursor = BlockCursor::new(
            samples,
            self.source.block_size(),
            self.options.tail_policy,
            producer,
            self.stop.clone(),
            self.flags.clone(),
            Arc::clone(&self.counters),
        );
        let mut driver = PlaybackDriver::new(
            factory,
            cursor,
            self.flags.clone(),
            self.stop.clone(),
            self.options.poll_interval,
        );

        match driver.start() {
            Ok(device) => {
                inner.device = Some(device);
                inner.output_finished = Some(driver.finished_flag());
                inner.driver = Some(driver);
                inner.analyzer = Some(analyzer);
                self.transition(SessionState::Streaming);
                info!(
                    "Session streaming: {} blocks of {} samples @ {}Hz (tail policy {})",
                    self.source.total_blocks(),
                    self.source.block_size(),
                    self.source.sample_rate(),
                    self.options.tail_policy
                );
                Ok(())
            }
            Err(e) => {
                self.stop.request();
                if let Err(join_err) = analyzer.join() {
                    warn!("Analysis thread failed during aborted start: {}", join_err);
                }
                self.fail_start(&mut inner);
                Err(e)
            }
        }
    }

    fn fail_start(&self, inner: &mut MutexGuard<'_, Inner>) {
        inner.joined = true;
        inner.torn_down = true;
        self.transition(SessionState::Stopped);
    }

    /// Ask the pipeline to stop.
    ///
    /// Returns `Ok(true)` if this call initiated the stop, `Ok(false)` if a stop
    /// was already in progress or the session had already stopped.
    pub fn request_stop(&self) -> Result<bool> {
        let streaming = SessionState::Streaming.as_u8();
        let stopping = SessionState::Stopping.as_u8();

        match self
            .state
            .compare_exchange(streaming, stopping, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                self.stop.request();
                self.emit_state_change(SessionState::Streaming, SessionState::Stopping);
                info!("Stop requested");
                Ok(true)
            }
            Err(current) => match SessionState::from_u8(current) {
                SessionState::Idle => Err(Error::StreamState(
                    "Cannot stop a session that was never started".to_string(),
                )),
                _ => Ok(false),
            },
        }
    }

    /// Wait until the output has stopped and the analysis thread has exited.
    ///
    /// Works after a stop request or after natural completion. Concurrent
    /// callers all return once the first joiner finishes.
    pub fn join(&self) -> Result<AnalyzerStats> {
        if self.state() == SessionState::Idle {
            return Err(Error::StreamState(
                "Cannot join a session that was never started".to_string(),
            ));
        }

        let mut inner = self.lock();
        if inner.joined {
            return inner.join_result();
        }
        if inner.joining {
            while !inner.joined {
                inner = self
                    .join_done
                    .wait(inner)
                    .unwrap_or_else(|e| e.into_inner());
            }
            return inner.join_result();
        }

        inner.joining = true;
        let driver = inner.driver.take();
        let analyzer = inner.analyzer.take();
        drop(inner);

        if let Some(driver) = driver.as_ref() {
            driver.wait_finished();
        }
        let result = match analyzer {
            Some(analyzer) => analyzer.join(),
            None => Ok(AnalyzerStats::default()),
        };

        let mut inner = self.lock();
        inner.driver = driver;
        inner.joining = false;
        inner.joined = true;
        let stats = result.as_ref().copied().unwrap_or_default();
        inner.analyzer_stats = Some(stats);
        inner.join_error = match &result {
            Ok(_) => None,
            Err(Error::StreamState(message)) => Some(message.clone()),
            Err(e) => Some(e.to_string()),
        };
        drop(inner);

        let old = self.state.swap(SessionState::Stopped.as_u8(), Ordering::AcqRel);
        self.emit_state_change(SessionState::from_u8(old), SessionState::Stopped);

        let pipeline = self.counters.snapshot();
        self.events.emit(MirEvent::PlaybackCompleted {
            blocks_enqueued: pipeline.blocks_enqueued,
            blocks_dropped: pipeline.blocks_dropped,
            exhausted: self.flags.is_exhausted(),
            timestamp: chrono::Utc::now(),
        });
        info!(
            "Session joined: {} blocks analyzed, {} dropped on full queue, {} skipped",
            stats.analyzed, pipeline.blocks_dropped, stats.skipped
        );

        self.join_done.notify_all();
        result
    }

    /// Release the output device.
    ///
    /// Valid once Stopped, or while Streaming after the output finished on its
    /// own (the session is joined first).
    pub fn teardown(&self) -> Result<()> {
        match self.state() {
            SessionState::Idle => {
                return Err(Error::StreamState(
                    "Cannot tear down a session that was never started".to_string(),
                ))
            }
            SessionState::Stopping => {
                return Err(Error::StreamState(
                    "Session is stopping; join before teardown".to_string(),
                ))
            }
            SessionState::Streaming => {
                let finished = self
                    .lock()
                    .output_finished
                    .as_ref()
                    .map_or(false, |flag| flag.load(Ordering::Acquire));
                if !finished {
                    return Err(Error::StreamState(
                        "Session is still streaming; stop it before teardown".to_string(),
                    ));
                }
                self.join()?;
            }
            SessionState::Stopped => {}
        }

        let mut inner = self.lock();
        if inner.torn_down {
            return Err(Error::StreamState("Session already torn down".to_string()));
        }
        if !inner.joined {
            return Err(Error::StreamState("Session not joined yet".to_string()));
        }
        inner.torn_down = true;
        let driver = inner.driver.take();
        drop(inner);

        if let Some(mut driver) = driver {
            driver.teardown()?;
        }
        info!("Session torn down");
        Ok(())
    }

    /// Stop, join and tear down, tolerating any of those having happened
    /// already. An Idle session goes straight to Stopped.
    pub fn shutdown(&self) -> Result<()> {
        {
            let mut inner = self.lock();
            if self.state() == SessionState::Idle {
                inner.sink_factory = None;
                inner.joined = true;
                inner.torn_down = true;
                self.transition(SessionState::Stopped);
                info!("Session shut down before start");
                return Ok(());
            }
        }

        self.request_stop()?;
        self.join()?;

        if self.is_torn_down() {
            return Ok(());
        }
        match self.teardown() {
            Err(Error::StreamState(_)) if self.is_torn_down() => Ok(()),
            other => other,
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.lock().torn_down
    }

    pub fn stats(&self) -> SessionStats {
        let device = self.lock().device.clone();
        SessionStats {
            state: self.state(),
            sample_rate: self.source.sample_rate(),
            block_size: self.source.block_size(),
            total_blocks: self.source.total_blocks(),
            tail_policy: self.options.tail_policy,
            analyzed: self.store.len(),
            exhausted: self.flags.is_exhausted(),
            pipeline: self.counters.snapshot(),
            device,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn transition(&self, new_state: SessionState) {
        let old = self.state.swap(new_state.as_u8(), Ordering::AcqRel);
        self.emit_state_change(SessionState::from_u8(old), new_state);
    }

    fn emit_state_change(&self, old_state: SessionState, new_state: SessionState) {
        if old_state == new_state {
            return;
        }
        info!("Session state: {} -> {}", old_state, new_state);
        self.events.emit(MirEvent::SessionStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop.request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::output::{ClockedOutput, OutputSink};

    fn idle_session() -> Session {
        let source = AudioSource::from_samples(vec![0.0; 256], 8000, 64).unwrap();
        let factory: SinkFactory = Box::new(|| -> Result<Box<dyn OutputSink>> {
            Ok(Box::new(ClockedOutput::new(8000, 1, 32, false)))
        });
        Session::new(source, factory, Arc::new(EventBus::new(16)), SessionOptions::default())
    }

    #[test]
    fn test_analysis_panic_reported_to_every_joiner() {
        let session = Arc::new(idle_session());
        {
            let mut inner = session.lock();
            inner.sink_factory = None;
            inner.analyzer = Some(FeatureAnalyzer::from_handle(std::thread::spawn(
                || -> AnalyzerStats {
                    std::thread::sleep(Duration::from_millis(50));
                    panic!("analysis failed");
                },
            )));
        }
        session.transition(SessionState::Streaming);

        let joiners: Vec<_> = (0..3)
            .map(|_| {
                let session = Arc::clone(&session);
                std::thread::spawn(move || session.join())
            })
            .collect();
        for joiner in joiners {
            assert!(matches!(joiner.join().unwrap(), Err(Error::StreamState(_))));
        }

        // Joining after the fact sees the same failure
        assert!(matches!(session.join(), Err(Error::StreamState(_))));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_successful_join_repeats_stats() {
        let session = idle_session();
        session.start().unwrap();
        let first = session.join().unwrap();
        let second = session.join().unwrap();
        assert_eq!(first, second);
        assert!(!first.cancelled);
    }
}
