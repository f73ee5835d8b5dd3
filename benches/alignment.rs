//! Benchmark suite for the per-row hot paths.
//!
//! Run with: `cargo bench`
//!
//! This benchmark measures:
//! - Nearest-timestamp join throughput
//! - Action encoding over an episode
//! - Area resize of one frame

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use gaze_dataset::{
    action::{ActionEncoder, Quaternion},
    alignment::nearest_indices,
    preprocessing::area_resize,
    timestamp::{fixed_zone, normalize_epoch_ms, CanonicalTimestamp},
};
use ndarray::Array3;

/// Telemetry at ~30 Hz and gaze at ~60 Hz with jitter, like a real session.
fn create_streams(telemetry_len: usize) -> (Vec<CanonicalTimestamp>, Vec<CanonicalTimestamp>) {
    let zone = fixed_zone(330).unwrap();
    let base: i64 = 1_714_030_200_000;
    let telemetry = (0..telemetry_len as i64)
        .map(|i| normalize_epoch_ms(base + i * 33 + (i * 7) % 5, &zone).unwrap())
        .collect();
    let gaze = (0..(telemetry_len * 2) as i64)
        .map(|i| normalize_epoch_ms(base + 3 + i * 16 + (i * 11) % 3, &zone).unwrap())
        .collect();
    (telemetry, gaze)
}

fn bench_nearest_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("nearest_join");

    for len in &[1_000usize, 10_000, 100_000] {
        let (telemetry, gaze) = create_streams(*len);
        group.throughput(Throughput::Elements(*len as u64));
        group.bench_with_input(BenchmarkId::new("indices", len), len, |b, _| {
            b.iter(|| nearest_indices(black_box(&telemetry), black_box(&gaze)).unwrap())
        });
    }

    group.finish();
}

fn bench_action_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("action_encoding");
    let rows: Vec<(Quaternion, f64)> = (0..10_000)
        .map(|i| {
            let half = (i as f64 * 0.001).sin() * 0.5;
            (Quaternion::new(half.cos(), 0.01, half.sin(), 0.02), -(i as f64) * 0.01)
        })
        .collect();

    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("episode_10000", |b| {
        b.iter(|| {
            let mut encoder = ActionEncoder::new();
            for (q, z) in &rows {
                black_box(encoder.encode(q, *z));
            }
        })
    });

    group.finish();
}

fn bench_area_resize(c: &mut Criterion) {
    let mut group = c.benchmark_group("area_resize");
    let rgb = Array3::from_shape_fn((360, 640, 3), |(y, x, c)| ((x + y + c) % 256) as f32 / 255.0);
    let depth = Array3::from_shape_fn((360, 640, 1), |(y, x, _)| ((x * y) % 256) as f32 / 255.0);

    group.bench_function("rgb_640x360_to_224", |b| {
        b.iter(|| area_resize(black_box(rgb.view()), 224, 224))
    });
    group.bench_function("depth_640x360_to_224", |b| {
        b.iter(|| area_resize(black_box(depth.view()), 224, 224))
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_nearest_join,
    bench_action_encoding,
    bench_area_resize
);
criterion_main!(benches);
