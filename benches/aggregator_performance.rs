use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ecodrive::{
    ScoringModel, TelemetryAggregator,
    geometry::{Coordinate, decode, encode},
    telemetry::{Clock, LocationSample, ManualClock, MotionSample, TripRecord},
};
use std::{sync::Arc, time::Duration};

// ~50 m of latitude
const STEP_DEG: f64 = 0.05 / 111.194_926_644_558_73;

fn create_trip(samples: usize) -> Vec<TripRecord> {
    (0..samples)
        .map(|i| {
            let timestamp_ms = (i * 500) as i64;
            if i % 10 == 0 {
                TripRecord::Location(LocationSample::new(
                    48.0 + (i / 10) as f64 * STEP_DEG,
                    11.0,
                    timestamp_ms,
                ))
            } else {
                TripRecord::Motion(MotionSample::from_magnitude(
                    if i % 2 == 0 { 1.8 } else { 0.4 },
                    timestamp_ms,
                ))
            }
        })
        .collect()
}

fn ingest(records: &[TripRecord]) -> TelemetryAggregator {
    let clock = Arc::new(ManualClock::new(0));
    let mut aggregator = TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>);
    for record in records {
        clock.set(record.timestamp_ms());
        match record {
            TripRecord::Location(sample) => aggregator.on_location(*sample),
            TripRecord::Motion(sample) => aggregator.on_motion(*sample),
        }
    }
    aggregator
}

fn bench_ingestion(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregator");

    let single = create_trip(1);
    group.bench_function("ingest_single_sample", |b| {
        b.iter(|| black_box(ingest(&single)));
    });

    let hundred = create_trip(100);
    group.bench_function("ingest_100_samples", |b| {
        b.iter(|| black_box(ingest(&hundred)));
    });

    // an hour of driving at 20 Hz
    let hour = create_trip(72_000);
    group.bench_function("ingest_one_hour_trip", |b| {
        b.iter(|| black_box(ingest(&hour)));
    });

    group.finish();
}

fn bench_scoring(c: &mut Criterion) {
    let mut group = c.benchmark_group("scoring");

    let features = ingest(&create_trip(1_000)).current_features();
    let model = ScoringModel::heuristic();
    group.bench_function("evaluate_snapshot", |b| {
        b.iter(|| black_box(model.evaluate(black_box(features)).unwrap()));
    });

    group.finish();
}

fn bench_geometry(c: &mut Criterion) {
    let mut group = c.benchmark_group("geometry");

    let path: Vec<Coordinate> = (0..500)
        .map(|i| Coordinate::new(48.0 + i as f64 * 0.001, 11.0 + (i % 7) as f64 * 0.001))
        .collect();
    let encoded = encode(&path);

    group.bench_function("encode_500_points", |b| {
        b.iter(|| black_box(encode(black_box(&path))));
    });

    group.bench_function("decode_500_points", |b| {
        b.iter(|| black_box(decode(black_box(&encoded))));
    });

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .measurement_time(Duration::from_secs(10))
        .sample_size(100);
    targets = bench_ingestion, bench_scoring, bench_geometry
}
criterion_main!(benches);
