//! Fusion Throughput Benchmark
//!
//! Fusion runs once per request on the hot path after detectors return.
//!
//! **Goal:** Fusion and classification cost is negligible next to detector latency
//! **Target:** <10µs per three-signal fusion
//!
//! Covers weighted fusion (full and partial signal sets), temporal
//! aggregation over a clip, and liveness fusion.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mediarisk_fusion::fusion::{fuse, temporal, PipelineKind, Signal, WeightTable};
use mediarisk_fusion::liveness::{fuse_liveness, LivenessSubSignals, SecurityLevel};

fn bench_weighted_fusion(c: &mut Criterion) {
    let mut group = c.benchmark_group("weighted_fusion");
    let table = WeightTable::defaults_for(PipelineKind::Image);

    let full = vec![
        Signal::new("remote_api", 62.0),
        Signal::new("transformer", 71.0),
        Signal::new("local_ensemble", 58.0),
    ];
    let partial = vec![
        Signal::unavailable("remote_api"),
        Signal::new("transformer", 80.0),
    ];

    for (name, signals) in [("full", &full), ("partial", &partial)] {
        group.bench_function(BenchmarkId::new("image", name), |b| {
            b.iter(|| black_box(fuse(black_box(signals), &table)))
        });
    }

    group.finish();
}

fn bench_temporal_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("temporal_aggregation");

    for frames in [16usize, 64, 256] {
        let scores: Vec<f64> = (0..frames).map(|i| (i * 37 % 101) as f64).collect();
        group.bench_function(BenchmarkId::new("aggregate", frames), |b| {
            b.iter(|| black_box(temporal::aggregate("local_temporal", black_box(&scores))))
        });
        group.bench_function(BenchmarkId::new("sample_positions", frames), |b| {
            b.iter(|| black_box(temporal::sample_positions(black_box(frames * 30), 16)))
        });
    }

    group.finish();
}

fn bench_liveness(c: &mut Criterion) {
    let subsignals = LivenessSubSignals::new(0.1, 0.9, 0.8, 0.9, 0.9);

    c.bench_function("liveness_fusion", |b| {
        b.iter(|| black_box(fuse_liveness(black_box(&subsignals), SecurityLevel::BankingKyc)))
    });
}

criterion_group!(
    benches,
    bench_weighted_fusion,
    bench_temporal_aggregation,
    bench_liveness
);
criterion_main!(benches);
