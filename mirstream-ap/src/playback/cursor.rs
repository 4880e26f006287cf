//! Playback cursor: the render state owned by the output callback
//!
//! Copies samples from the shared buffer into device buffers and enqueues a
//! block descriptor each time the cursor crosses a block boundary. Block
//! boundaries depend only on the cursor, never on the device period.

use crate::audio::output::RenderStatus;
use crate::playback::queue::{Block, FrameProducer};
use crate::playback::state::{PipelineCounters, StopSignal, TailPolicy};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flags published by the cursor for the other pipeline threads
#[derive(Debug, Clone, Default)]
pub struct CursorFlags {
    /// Set after the last block has been enqueued at natural end of buffer
    pub exhausted: Arc<AtomicBool>,
    /// Set when rendering has finished, either exhausted or stopped
    pub finished: Arc<AtomicBool>,
}

impl CursorFlags {
    pub fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Acquire)
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }
}

/// Render state moved into the output callback.
///
/// `render` does not allocate, lock or log.
pub struct BlockCursor {
    samples: Arc<[f32]>,
    block_size: usize,
    cursor: usize,
    block_start: usize,
    next_block: u64,
    tail_policy: TailPolicy,
    producer: FrameProducer,
    stop: StopSignal,
    flags: CursorFlags,
    counters: Arc<PipelineCounters>,
    complete: bool,
}

impl BlockCursor {
    pub fn new(
        samples: Arc<[f32]>,
        block_size: usize,
        tail_policy: TailPolicy,
        producer: FrameProducer,
        stop: StopSignal,
        flags: CursorFlags,
        counters: Arc<PipelineCounters>,
    ) -> Self {
        Self {
            samples,
            block_size: block_size.max(1),
            cursor: 0,
            block_start: 0,
            next_block: 0,
            tail_policy,
            producer,
            stop,
            flags,
            counters,
            complete: false,
        }
    }

    /// Samples rendered so far
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Fill `out` (interleaved, `channels` channels) with the next samples.
    ///
    /// The mono sample is written to every channel. Once the buffer is exhausted
    /// or stop has been requested, writes silence and returns `Complete`.
    pub fn render(&mut self, out: &mut [f32], channels: usize) -> RenderStatus {
        self.counters.record_callback();

        if self.complete {
            out.fill(0.0);
            return RenderStatus::Complete;
        }

        if self.stop.is_requested() {
            out.fill(0.0);
            self.finish();
            return RenderStatus::Complete;
        }

        let channels = channels.max(1);
        let frames = out.len() / channels;
        let total = self.samples.len();
        let mut written = 0;

        while written < frames && self.cursor < total {
            let block_end = self.block_start + self.block_size;
            let n = (frames - written)
                .min(block_end - self.cursor)
                .min(total - self.cursor);

            let src = &self.samples[self.cursor..self.cursor + n];
            let dst = &mut out[written * channels..(written + n) * channels];
            for (frame, &sample) in dst.chunks_exact_mut(channels).zip(src) {
                frame.fill(sample);
            }

            written += n;
            self.cursor += n;

            if self.cursor == block_end {
                self.emit(Block::new(self.next_block, self.block_start, self.block_size));
            }
        }

        out[written * channels..].fill(0.0);

        if self.cursor >= total {
            self.emit_tail();
            self.flags.exhausted.store(true, Ordering::Release);
            self.finish();
            return RenderStatus::Complete;
        }

        RenderStatus::Continue
    }

    fn emit(&mut self, block: Block) {
        self.counters.record_produced();
        self.producer.push(block);
        self.next_block += 1;
        self.block_start = block.start + block.len;
    }

    fn emit_tail(&mut self) {
        let tail_len = self.cursor - self.block_start;
        if tail_len == 0 {
            return;
        }
        let tail = Block::new(self.next_block, self.block_start, tail_len);
        match self.tail_policy {
            TailPolicy::Drop => self.counters.record_tail_dropped(),
            TailPolicy::ZeroPad => self.emit(tail.with_padding(self.block_size)),
            TailPolicy::Short => self.emit(tail),
        }
    }

    fn finish(&mut self) {
        self.complete = true;
        self.flags.finished.store(true, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::queue::{frame_queue, FrameConsumer};

    fn cursor_for(
        len: usize,
        block_size: usize,
        policy: TailPolicy,
    ) -> (BlockCursor, FrameConsumer, CursorFlags, StopSignal) {
        let samples: Arc<[f32]> = (0..len).map(|i| i as f32).collect::<Vec<_>>().into();
        let counters = PipelineCounters::new();
        let (producer, consumer) = frame_queue(64, Arc::clone(&counters));
        let stop = StopSignal::new();
        let flags = CursorFlags::default();
        let cursor = BlockCursor::new(
            samples,
            block_size,
            policy,
            producer,
            stop.clone(),
            flags.clone(),
            counters,
        );
        (cursor, consumer, flags, stop)
    }

    fn drain(consumer: &mut FrameConsumer) -> Vec<Block> {
        std::iter::from_fn(|| consumer.try_pop()).collect()
    }

    #[test]
    fn test_blocks_independent_of_period() {
        // Period of 3 frames never lines up with 4-sample blocks
        let (mut cursor, mut rx, flags, _) = cursor_for(12, 4, TailPolicy::Drop);
        let mut out = [0.0f32; 3];

        let mut calls = 0;
        while cursor.render(&mut out, 1) == RenderStatus::Continue {
            calls += 1;
        }
        assert_eq!(calls, 3);

        let blocks = drain(&mut rx);
        assert_eq!(blocks.len(), 3);
        for (i, block) in blocks.iter().enumerate() {
            assert_eq!(block.index, i as u64);
            assert_eq!(block.start, i * 4);
            assert_eq!(block.len, 4);
        }
        assert!(flags.is_exhausted());
        assert!(flags.is_finished());
    }

    #[test]
    fn test_mono_duplicated_to_all_channels() {
        let (mut cursor, _rx, _, _) = cursor_for(8, 4, TailPolicy::Drop);
        let mut out = [9.0f32; 6];
        assert_eq!(cursor.render(&mut out, 2), RenderStatus::Continue);
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0, 2.0, 2.0]);
        assert_eq!(cursor.position(), 3);
    }

    #[test]
    fn test_silence_after_end() {
        let (mut cursor, _rx, _, _) = cursor_for(2, 4, TailPolicy::Drop);
        let mut out = [9.0f32; 4];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);
        assert_eq!(out, [0.0, 1.0, 0.0, 0.0]);

        let mut out = [9.0f32; 4];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);
        assert_eq!(out, [0.0; 4]);
    }

    #[test]
    fn test_tail_drop() {
        let (mut cursor, mut rx, _, _) = cursor_for(10, 4, TailPolicy::Drop);
        let mut out = [0.0f32; 64];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);
        assert_eq!(drain(&mut rx).len(), 2);
    }

    #[test]
    fn test_tail_zero_pad() {
        let (mut cursor, mut rx, _, _) = cursor_for(10, 4, TailPolicy::ZeroPad);
        let mut out = [0.0f32; 64];
        cursor.render(&mut out, 1);
        let blocks = drain(&mut rx);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], Block::new(2, 8, 2).with_padding(4));
    }

    #[test]
    fn test_tail_short() {
        let (mut cursor, mut rx, _, _) = cursor_for(10, 4, TailPolicy::Short);
        let mut out = [0.0f32; 64];
        cursor.render(&mut out, 1);
        let blocks = drain(&mut rx);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[2], Block::new(2, 8, 2));
    }

    #[test]
    fn test_stop_before_first_callback() {
        let (mut cursor, mut rx, flags, stop) = cursor_for(16, 4, TailPolicy::ZeroPad);
        stop.request();

        let mut out = [9.0f32; 8];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);
        assert_eq!(out, [0.0; 8]);
        assert!(drain(&mut rx).is_empty());
        assert!(flags.is_finished());
        assert!(!flags.is_exhausted());
    }

    #[test]
    fn test_stop_midway_keeps_completed_blocks() {
        let (mut cursor, mut rx, flags, stop) = cursor_for(16, 4, TailPolicy::ZeroPad);
        let mut out = [0.0f32; 6];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Continue);
        stop.request();
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);

        // Only the block completed before the stop; no tail for partial progress
        let blocks = drain(&mut rx);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].index, 0);
        assert!(!flags.is_exhausted());
    }

    #[test]
    fn test_empty_buffer_completes_immediately() {
        let (mut cursor, mut rx, flags, _) = cursor_for(0, 4, TailPolicy::Short);
        let mut out = [1.0f32; 4];
        assert_eq!(cursor.render(&mut out, 1), RenderStatus::Complete);
        assert!(drain(&mut rx).is_empty());
        assert!(flags.is_exhausted());
    }
}
