//! Benchmarks for the per-frame ingestion path

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use packwatch::{classify, validate, Monitor, Reading, Stats, Thresholds, FRAME_SIZE};

fn generate_frames(count: usize) -> Vec<[u8; FRAME_SIZE]> {
    (0..count)
        .map(|i| {
            let t = i as f32;
            Reading::new(t, 3.7 + (t * 0.1).sin() * 0.1, 1.0, 25.0 + (i % 10) as f32).encode()
        })
        .collect()
}

fn bench_decode_validate(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let frames = generate_frames(1000);
    group.throughput(Throughput::Elements(1000));

    group.bench_function("decode_validate_1000_frames", |b| {
        b.iter(|| {
            for frame in &frames {
                let reading = Reading::decode(frame);
                black_box(validate(&reading).is_ok());
            }
        })
    });

    group.finish();
}

fn bench_aggregate_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let readings: Vec<Reading> = generate_frames(1000).iter().map(Reading::decode).collect();
    let thresholds = Thresholds::default();
    group.throughput(Throughput::Elements(1000));

    group.bench_function("stats_classify_1000_readings", |b| {
        b.iter(|| {
            let mut stats = Stats::new();
            for reading in &readings {
                stats.record_valid(reading);
                black_box(classify(reading, &thresholds));
            }
            black_box(stats.mean_voltage)
        })
    });

    group.finish();
}

fn bench_full_ingest(c: &mut Criterion) {
    let mut group = c.benchmark_group("ingest");
    let frames = generate_frames(1000);
    group.throughput(Throughput::Elements(1000));

    group.bench_function("monitor_ingest_1000_frames", |b| {
        b.iter(|| {
            let mut monitor = Monitor::default();
            for frame in &frames {
                let _ = black_box(monitor.ingest(Reading::decode(frame)));
            }
            black_box(monitor.stats().valid_count)
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_decode_validate,
    bench_aggregate_classify,
    bench_full_ingest
);
criterion_main!(benches);
