// Integration tests for replaying recorded trips from JSON Lines files

use std::{
    path::Path,
    sync::{Arc, mpsc},
    thread,
};

use ecodrive::{
    EcoDriveResult, ScoringModel, TelemetryAggregator, TripMonitor,
    telemetry::{
        Clock, LocationSample, ManualClock, MotionSample, RecordedTripProducer, TripRecord,
        collect_trip,
    },
    writer::write_results,
};

const FIXTURE: &str = "tests/fixtures/short_trip.jsonl";

fn replay(
    producer: RecordedTripProducer,
) -> (usize, thread::JoinHandle<Vec<EcoDriveResult>>) {
    let clock = Arc::new(ManualClock::new(0));
    let (tx, rx) = mpsc::channel();
    let monitor = TripMonitor::new(
        TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>),
        ScoringModel::heuristic(),
        tx,
    );
    let collector = thread::spawn(move || rx.into_iter().collect::<Vec<_>>());

    let replayed = collect_trip(producer, &monitor, &clock).unwrap();
    drop(monitor);
    (replayed, collector)
}

#[test]
fn test_replay_fixture() {
    let producer = RecordedTripProducer::from_file(Path::new(FIXTURE)).unwrap();
    assert_eq!(producer.len(), 25);

    let (replayed, collector) = replay(producer);
    let results = collector.join().unwrap();

    assert_eq!(replayed, 25);
    // one result for the trip start, one per sample, one for the stop
    assert_eq!(results.len(), 27);

    let last = results.last().unwrap();
    assert!(last.has_reading());
    assert!((last.features.distance_km - 0.5).abs() < 1e-6);
    assert!((last.features.duration_min - 1.0).abs() < 1e-9);
    assert_eq!(last.features.stop_count, 1);
    assert!((last.features.wait_time_min - 10. / 60.).abs() < 1e-9);
    assert!((0. ..=100.).contains(&last.eco_score));
}

#[test]
fn test_replay_is_deterministic() {
    let first = replay(RecordedTripProducer::from_file(Path::new(FIXTURE)).unwrap())
        .1
        .join()
        .unwrap();
    let second = replay(RecordedTripProducer::from_file(Path::new(FIXTURE)).unwrap())
        .1
        .join()
        .unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_empty_recording_publishes_nothing() {
    let (replayed, collector) = replay(RecordedTripProducer::default());
    assert_eq!(replayed, 0);
    assert!(collector.join().unwrap().is_empty());
}

#[test]
fn test_results_written_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("results.jsonl");

    let records = vec![
        TripRecord::Location(LocationSample::new(45.0, 7.0, 0)),
        TripRecord::Motion(MotionSample::from_magnitude(2.0, 500)),
        TripRecord::Location(LocationSample::new(45.001, 7.0, 10_000)),
    ];
    let clock = Arc::new(ManualClock::new(0));
    let (tx, rx) = mpsc::channel();
    let monitor = TripMonitor::new(
        TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>),
        ScoringModel::heuristic(),
        tx,
    );
    let writer = {
        let output = output.clone();
        thread::spawn(move || write_results(&output, rx))
    };

    collect_trip(RecordedTripProducer::from_records(records), &monitor, &clock).unwrap();
    let expected = monitor.current_result().unwrap();
    drop(monitor);

    let last = writer.join().unwrap().unwrap().unwrap();
    assert_eq!(last, expected);

    let written: Vec<EcoDriveResult> = serde_jsonlines::json_lines(&output)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(written.len(), 5);
    assert_eq!(written.last(), Some(&expected));
    // ~111 m at 40 km/h
    assert!((written[4].features.distance_km - 0.111).abs() < 0.001);
}
