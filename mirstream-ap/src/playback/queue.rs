//! Lock-free analysis queue
//!
//! Single-producer single-consumer ring buffer carrying completed block
//! descriptors from the output callback to the analysis thread.
//!
//! - Producer (output callback): `push` never blocks; a full queue drops the
//!   block and counts it
//! - Consumer (analysis thread): `pop_timeout` waits up to a deadline so the
//!   worker can re-check its exit conditions

use crate::playback::state::PipelineCounters;
use ringbuf::{traits::*, HeapRb};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Interval between empty-queue polls in `pop_timeout`
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// Default queue capacity in blocks
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// A completed block, described as a range of the shared sample buffer.
///
/// Carries no samples, so enqueueing from the output callback never allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    /// Physical block number (start / block_size)
    pub index: u64,
    /// First sample of the block
    pub start: usize,
    /// Samples taken from the buffer
    pub len: usize,
    /// Length the analyzer sees; `> len` means zero padding
    pub padded_len: usize,
}

impl Block {
    pub fn new(index: u64, start: usize, len: usize) -> Self {
        Self {
            index,
            start,
            len,
            padded_len: len,
        }
    }

    pub fn with_padding(mut self, padded_len: usize) -> Self {
        self.padded_len = padded_len.max(self.len);
        self
    }

    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

/// Create a queue of `capacity` blocks
pub fn frame_queue(capacity: usize, counters: Arc<PipelineCounters>) -> (FrameProducer, FrameConsumer) {
    let (producer, consumer) = HeapRb::<Block>::new(capacity.max(1)).split();
    (
        FrameProducer {
            producer,
            counters: Arc::clone(&counters),
        },
        FrameConsumer { consumer },
    )
}

/// Producer half (output callback)
pub struct FrameProducer {
    producer: ringbuf::HeapProd<Block>,
    counters: Arc<PipelineCounters>,
}

impl FrameProducer {
    /// Enqueue a block without blocking.
    ///
    /// Returns false if the queue was full and the block was dropped.
    pub fn push(&mut self, block: Block) -> bool {
        match self.producer.try_push(block) {
            Ok(()) => {
                self.counters.record_enqueued();
                true
            }
            Err(_) => {
                self.counters.record_dropped();
                false
            }
        }
    }

    pub fn capacity(&self) -> usize {
        self.producer.capacity().into()
    }

    pub fn occupied_len(&self) -> usize {
        self.producer.occupied_len()
    }
}

/// Consumer half (analysis thread)
pub struct FrameConsumer {
    consumer: ringbuf::HeapCons<Block>,
}

impl FrameConsumer {
    pub fn try_pop(&mut self) -> Option<Block> {
        self.consumer.try_pop()
    }

    /// Dequeue a block, waiting at most `timeout`.
    pub fn pop_timeout(&mut self, timeout: Duration) -> Option<Block> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(block) = self.consumer.try_pop() {
                return Some(block);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            std::thread::sleep(POLL_INTERVAL.min(deadline - now));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.consumer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.consumer.occupied_len()
    }
}
