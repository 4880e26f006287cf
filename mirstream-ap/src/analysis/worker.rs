//! Analysis worker thread
//!
//! Single consumer of the analysis queue. Processes blocks in FIFO order and
//! appends results to the [`ResultStore`], so stored indices are dense.
//!
//! Exit conditions, checked between dequeues:
//! - stop requested
//! - the playback cursor exhausted the buffer and the queue is drained

use crate::analysis::{FeatureExtractor, ResultStore};
use crate::error::{Error, Result};
use crate::playback::cursor::CursorFlags;
use crate::playback::queue::{Block, FrameConsumer};
use crate::playback::state::{PipelineCounters, StopSignal};
use mirstream_common::{EventBus, MirEvent};
use serde::Serialize;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default bounded wait for one dequeue
pub const DEFAULT_DEQUEUE_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    pub sample_rate: u32,
    pub fft_size: usize,
    pub dequeue_timeout: Duration,
}

/// Summary returned when the worker exits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnalyzerStats {
    pub analyzed: u64,
    pub skipped: u64,
    /// True when the worker exited because of a stop request
    pub cancelled: bool,
}

/// Everything the worker thread needs, moved onto it at spawn
pub struct AnalyzerContext {
    pub consumer: FrameConsumer,
    pub samples: Arc<[f32]>,
    pub store: Arc<ResultStore>,
    pub events: Arc<EventBus>,
    pub stop: StopSignal,
    pub flags: CursorFlags,
    pub counters: Arc<PipelineCounters>,
}

/// Handle to the running analysis thread
pub struct FeatureAnalyzer {
    handle: JoinHandle<AnalyzerStats>,
}

impl FeatureAnalyzer {
    /// Spawn the "mirstream-analysis" thread
    pub fn spawn(options: AnalyzerOptions, ctx: AnalyzerContext) -> Result<Self> {
        let handle = std::thread::Builder::new()
            .name("mirstream-analysis".to_string())
            .spawn(move || run(options, ctx))
            .map_err(|e| Error::StreamState(format!("Failed to spawn analysis thread: {}", e)))?;
        Ok(Self { handle })
    }

    /// Wrap an already running thread
    #[cfg(test)]
    pub(crate) fn from_handle(handle: JoinHandle<AnalyzerStats>) -> Self {
        Self { handle }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to exit
    pub fn join(self) -> Result<AnalyzerStats> {
        self.handle
            .join()
            .map_err(|_| Error::StreamState("Analysis thread panicked".to_string()))
    }
}

fn run(options: AnalyzerOptions, mut ctx: AnalyzerContext) -> AnalyzerStats {
    let mut extractor = FeatureExtractor::new(options.sample_rate, options.fft_size);
    // Grows to the block size on the first block, then reused
    let mut block_buf: Vec<f32> = Vec::new();
    let mut stats = AnalyzerStats::default();

    info!(
        "Analysis thread started (sample_rate={}, fft_size={})",
        options.sample_rate, options.fft_size
    );

    loop {
        if ctx.stop.is_requested() {
            stats.cancelled = true;
            break;
        }

        // Exhausted is published after the final push, so check it before the
        // queue: a drained queue observed after it is truly drained.
        if ctx.flags.is_exhausted() && ctx.consumer.is_empty() {
            break;
        }

        let block = match ctx.consumer.pop_timeout(options.dequeue_timeout) {
            Some(block) => block,
            None => continue,
        };

        let samples = slice_block(&ctx.samples, &block, &mut block_buf);

        match extractor.analyze(samples) {
            Ok(features) => {
                let record = ctx.store.append(block.index, features);
                ctx.counters.record_analyzed();
                stats.analyzed += 1;
                ctx.events.emit(MirEvent::FeatureComputed {
                    record,
                    timestamp: chrono::Utc::now(),
                });
            }
            Err(skipped) => {
                debug!("Skipping block {}: {}", block.index, skipped);
                ctx.counters.record_skipped();
                stats.skipped += 1;
            }
        }
    }

    if stats.cancelled {
        let pending = ctx.consumer.len();
        if pending > 0 {
            warn!("Analysis cancelled with {} blocks still queued", pending);
        }
    }

    info!(
        "Analysis thread stopped: {} analyzed, {} skipped{}",
        stats.analyzed,
        stats.skipped,
        if stats.cancelled { " (cancelled)" } else { "" }
    );
    stats
}

/// Borrow the block's samples, copying into `buf` only when zero padding is needed
fn slice_block<'a>(samples: &'a [f32], block: &Block, buf: &'a mut Vec<f32>) -> &'a [f32] {
    let end = block.end().min(samples.len());
    let start = block.start.min(end);
    let data = &samples[start..end];

    if block.padded_len <= data.len() {
        return data;
    }

    buf.clear();
    buf.extend_from_slice(data);
    buf.resize(block.padded_len, 0.0);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::frame_queue;
    use std::sync::atomic::Ordering;

    fn spawn_worker(
        samples: Vec<f32>,
    ) -> (
        FeatureAnalyzer,
        crate::playback::queue::FrameProducer,
        Arc<ResultStore>,
        StopSignal,
        CursorFlags,
    ) {
        let counters = PipelineCounters::new();
        let (producer, consumer) = frame_queue(16, Arc::clone(&counters));
        let store = Arc::new(ResultStore::new());
        let stop = StopSignal::new();
        let flags = CursorFlags::default();

        let analyzer = FeatureAnalyzer::spawn(
            AnalyzerOptions {
                sample_rate: 8000,
                fft_size: 256,
                dequeue_timeout: Duration::from_millis(20),
            },
            AnalyzerContext {
                consumer,
                samples: samples.into(),
                store: Arc::clone(&store),
                events: Arc::new(EventBus::new(16)),
                stop: stop.clone(),
                flags: flags.clone(),
                counters,
            },
        )
        .unwrap();

        (analyzer, producer, store, stop, flags)
    }

    #[test]
    fn test_exits_after_exhaustion_and_drain() {
        let (analyzer, mut producer, store, _, flags) = spawn_worker(vec![0.5; 1024]);
        for i in 0..4u64 {
            producer.push(Block::new(i, i as usize * 256, 256));
        }
        flags.exhausted.store(true, Ordering::Release);

        let stats = analyzer.join().unwrap();
        assert_eq!(stats.analyzed, 4);
        assert!(!stats.cancelled);
        assert_eq!(store.len(), 4);
        for i in 0..4 {
            assert_eq!(store.get(i).unwrap().block_index, i as u64);
        }
    }

    #[test]
    fn test_stop_exits_promptly() {
        let (analyzer, _producer, store, stop, _) = spawn_worker(vec![0.0; 256]);
        stop.request();
        let stats = analyzer.join().unwrap();
        assert!(stats.cancelled);
        assert!(store.is_empty());
    }

    #[test]
    fn test_skipped_block_does_not_consume_index() {
        let mut samples = vec![0.25; 768];
        samples[300] = f32::NAN;
        let (analyzer, mut producer, store, _, flags) = spawn_worker(samples);
        producer.push(Block::new(0, 0, 256));
        producer.push(Block::new(1, 256, 256));
        producer.push(Block::new(2, 512, 256));
        flags.exhausted.store(true, Ordering::Release);

        let stats = analyzer.join().unwrap();
        assert_eq!(stats.analyzed, 2);
        assert_eq!(stats.skipped, 1);
        let second = store.get(1).unwrap();
        assert_eq!(second.index, 1);
        assert_eq!(second.block_index, 2);
    }

    #[test]
    fn test_slice_block_zero_pads() {
        let samples = [1.0f32, 2.0, 3.0];
        let mut buf = Vec::new();
        let block = Block::new(1, 2, 1).with_padding(4);
        assert_eq!(slice_block(&samples, &block, &mut buf), &[3.0, 0.0, 0.0, 0.0]);

        let block = Block::new(0, 0, 2);
        assert_eq!(slice_block(&samples, &block, &mut buf), &[1.0, 2.0]);
    }
}
