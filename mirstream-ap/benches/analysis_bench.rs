//! Analysis throughput benchmark
//!
//! Measures per-block feature extraction and the output callback's render path.
//!
//! **Goal:** one 2048-sample block analyzed well inside its 46ms playback time
//! **Goal:** render callback cost negligible next to the device period

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use mirstream_ap::analysis::zcr::zero_crossing_rate;
use mirstream_ap::analysis::{FeatureExtractor, SpectrumAnalyzer};
use mirstream_ap::playback::{frame_queue, BlockCursor, CursorFlags, PipelineCounters, StopSignal, TailPolicy};
use std::f32::consts::PI;
use std::sync::Arc;

const SAMPLE_RATE: u32 = 44100;
const BLOCK: usize = 2048;

fn sine(len: usize, freq: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / SAMPLE_RATE as f32).sin() * 0.5)
        .collect()
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    let block = sine(BLOCK, 440.0);

    group.bench_function("zero_crossing_rate_2048", |b| {
        b.iter(|| black_box(zero_crossing_rate(black_box(&block))));
    });

    group.bench_function("dominant_frequency_2048", |b| {
        let mut spectrum = SpectrumAnalyzer::new(BLOCK);
        b.iter(|| black_box(spectrum.dominant_frequency(black_box(&block), SAMPLE_RATE)));
    });

    group.bench_function("dominant_frequency_2048_fft_512", |b| {
        let mut spectrum = SpectrumAnalyzer::new(512);
        b.iter(|| black_box(spectrum.dominant_frequency(black_box(&block), SAMPLE_RATE)));
    });

    group.bench_function("analyze_block_2048", |b| {
        let mut extractor = FeatureExtractor::new(SAMPLE_RATE, BLOCK);
        b.iter(|| black_box(extractor.analyze(black_box(&block)).ok()));
    });

    group.finish();
}

fn bench_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("render");
    let samples: Arc<[f32]> = sine(BLOCK * 8, 440.0).into();

    // One device period of 512 stereo frames on a fresh cursor
    group.bench_function("render_512_frames_stereo", |b| {
        b.iter_batched(
            || {
                let counters = PipelineCounters::new();
                let (producer, consumer) = frame_queue(64, Arc::clone(&counters));
                let cursor = BlockCursor::new(
                    Arc::clone(&samples),
                    BLOCK,
                    TailPolicy::Drop,
                    producer,
                    StopSignal::new(),
                    CursorFlags::default(),
                    counters,
                );
                (cursor, consumer, vec![0.0f32; 512 * 2])
            },
            |(mut cursor, _consumer, mut out)| {
                black_box(cursor.render(&mut out, 2));
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_feature_extraction, bench_render);
criterion_main!(benches);
