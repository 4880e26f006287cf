//! Shared pipeline state: stop signal, tail policy and counters

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// One-way cancellation flag shared by the output callback, the analysis
/// thread and the lifecycle controller.
///
/// Once requested it never resets; a new session gets a new signal.
#[derive(Debug, Clone, Default)]
pub struct StopSignal {
    flag: Arc<AtomicBool>,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request stop. Returns true if this call set the flag.
    pub fn request(&self) -> bool {
        !self.flag.swap(true, Ordering::AcqRel)
    }

    pub fn is_requested(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// What to do with a final block shorter than the block size
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum TailPolicy {
    /// Play the tail but do not analyze it
    #[default]
    Drop,
    /// Analyze the tail zero-padded to the block size
    ZeroPad,
    /// Analyze the tail at its actual length
    Short,
}

impl std::fmt::Display for TailPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TailPolicy::Drop => write!(f, "drop"),
            TailPolicy::ZeroPad => write!(f, "zero_pad"),
            TailPolicy::Short => write!(f, "short"),
        }
    }
}

/// Lock-free counters updated from the pipeline threads
#[derive(Debug, Default)]
pub struct PipelineCounters {
    blocks_produced: AtomicU64,
    tail_dropped: AtomicU64,
    blocks_enqueued: AtomicU64,
    blocks_dropped: AtomicU64,
    blocks_analyzed: AtomicU64,
    blocks_skipped: AtomicU64,
    render_callbacks: AtomicU64,
}

impl PipelineCounters {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_produced(&self) {
        self.blocks_produced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tail_dropped(&self) {
        self.tail_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.blocks_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the new total
    pub fn record_dropped(&self) -> u64 {
        self.blocks_dropped.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_analyzed(&self) {
        self.blocks_analyzed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.blocks_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_callback(&self) {
        self.render_callbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            blocks_produced: self.blocks_produced.load(Ordering::Relaxed),
            tail_dropped: self.tail_dropped.load(Ordering::Relaxed),
            blocks_enqueued: self.blocks_enqueued.load(Ordering::Relaxed),
            blocks_dropped: self.blocks_dropped.load(Ordering::Relaxed),
            blocks_analyzed: self.blocks_analyzed.load(Ordering::Relaxed),
            blocks_skipped: self.blocks_skipped.load(Ordering::Relaxed),
            render_callbacks: self.render_callbacks.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`PipelineCounters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStats {
    /// Blocks completed by the playback cursor and offered for analysis
    pub blocks_produced: u64,
    /// Partial tail blocks played but not analyzed
    pub tail_dropped: u64,
    /// Blocks handed to the analysis queue
    pub blocks_enqueued: u64,
    /// Blocks discarded because the queue was full
    pub blocks_dropped: u64,
    /// Blocks analyzed and stored
    pub blocks_analyzed: u64,
    /// Blocks the extractor rejected
    pub blocks_skipped: u64,
    /// Render callback invocations
    pub render_callbacks: u64,
}
