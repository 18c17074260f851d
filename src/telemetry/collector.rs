use std::{
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicBool, Ordering},
        mpsc::Sender,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};

use crate::{EcoDriveError, scoring::ScoringModel};

use super::{
    EcoDriveResult, LocationSample, ManualClock, MotionSample, TelemetryAggregator, TripRecord,
    producer::SensorProducer,
};

/// Default interval between refreshes when no samples arrive.
pub const REFRESH_RATE_MS: u64 = 2000;

/// Drives a live trip: serializes both sample streams into one aggregator,
/// scores each new snapshot and publishes the result.
///
/// The monitor is cheap to clone; clones share the same trip so the location
/// and motion callbacks can each own one. Ingestion, scoring and publishing
/// all happen under the aggregator lock, so results reach the receiver in the
/// order the samples were applied and nothing is published once the trip has
/// stopped.
#[derive(Clone)]
pub struct TripMonitor {
    aggregator: Arc<Mutex<TelemetryAggregator>>,
    scoring: Arc<ScoringModel>,
    // only written while the aggregator lock is held
    tracking: Arc<AtomicBool>,
    result_sender: Sender<EcoDriveResult>,
}

impl TripMonitor {
    pub fn new(
        aggregator: TelemetryAggregator,
        scoring: ScoringModel,
        result_sender: Sender<EcoDriveResult>,
    ) -> Self {
        Self {
            aggregator: Arc::new(Mutex::new(aggregator)),
            scoring: Arc::new(scoring),
            tracking: Arc::new(AtomicBool::new(false)),
            result_sender,
        }
    }

    fn aggregator(&self) -> MutexGuard<'_, TelemetryAggregator> {
        self.aggregator
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking.load(Ordering::SeqCst)
    }

    /// Resets the trip state, starts accepting samples and publishes the initial result.
    pub fn start_trip(&self) -> Result<EcoDriveResult, EcoDriveError> {
        let mut aggregator = self.aggregator();
        aggregator.start_trip();
        self.tracking.store(true, Ordering::SeqCst);
        info!("Trip tracking started");
        self.publish(&aggregator)
    }

    /// Stops accepting samples and publishes the final result.
    pub fn stop_trip(&self) -> Result<EcoDriveResult, EcoDriveError> {
        let mut aggregator = self.aggregator();
        self.tracking.store(false, Ordering::SeqCst);
        aggregator.refresh();
        let result = self.publish(&aggregator)?;
        info!(
            "Trip stopped: {:.3} km, score {:.1}, fuel {:.3} L",
            result.features.distance_km, result.eco_score, result.fuel_liters
        );
        Ok(result)
    }

    pub fn on_location(&self, sample: LocationSample) -> Result<(), EcoDriveError> {
        self.update(|aggregator| aggregator.on_location(sample))
            .map(|_| ())
    }

    pub fn on_motion(&self, sample: MotionSample) -> Result<(), EcoDriveError> {
        self.update(|aggregator| aggregator.on_motion(sample))
            .map(|_| ())
    }

    /// Recomputes and publishes without new samples. Returns `None` once the
    /// trip is no longer tracked.
    pub fn refresh(&self) -> Result<Option<EcoDriveResult>, EcoDriveError> {
        self.update(TelemetryAggregator::refresh)
    }

    /// Latest result without publishing it.
    pub fn current_result(&self) -> Result<EcoDriveResult, EcoDriveError> {
        let features = self.aggregator().current_features();
        self.scoring.evaluate(features)
    }

    /// Most recent location fix, `None` while there is no fix yet.
    pub fn last_location(&self) -> Option<LocationSample> {
        self.aggregator().last_location()
    }

    pub fn scoring(&self) -> &ScoringModel {
        &self.scoring
    }

    /// Publishes a fresh result every `interval` while the trip is tracked.
    ///
    /// The thread exits once tracking stops or the result receiver is dropped.
    pub fn spawn_refresh(&self, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        thread::spawn(move || {
            loop {
                thread::sleep(interval);
                match monitor.refresh() {
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        debug!("Refresh thread exiting, trip no longer tracked");
                        break;
                    }
                    Err(e) => {
                        warn!("Refresh thread exiting: {}", e);
                        break;
                    }
                }
            }
        })
    }

    /// Stops tracking and releases the scoring backend.
    pub fn shutdown(&self) {
        let _aggregator = self.aggregator();
        self.tracking.store(false, Ordering::SeqCst);
        self.scoring.release();
    }

    /// Applies `apply` and publishes the new snapshot, or does nothing when the
    /// trip is not tracked.
    fn update(
        &self,
        apply: impl FnOnce(&mut TelemetryAggregator),
    ) -> Result<Option<EcoDriveResult>, EcoDriveError> {
        let mut aggregator = self.aggregator();
        if !self.is_tracking() {
            return Ok(None);
        }
        apply(&mut aggregator);
        self.publish(&aggregator).map(Some)
    }

    fn publish(&self, aggregator: &TelemetryAggregator) -> Result<EcoDriveResult, EcoDriveError> {
        let result = self.scoring.evaluate(aggregator.current_features())?;
        self.result_sender.send(result)?;
        Ok(result)
    }
}

/// Replays every record of `producer` through `monitor`, driving `clock` from
/// the sample timestamps so durations match the recording.
///
/// Returns the number of samples replayed.
pub fn collect_trip(
    mut producer: impl SensorProducer,
    monitor: &TripMonitor,
    clock: &ManualClock,
) -> Result<usize, EcoDriveError> {
    producer.start()?;

    let mut replayed = 0;
    while let Some(record) = producer.next_record()? {
        clock.set(record.timestamp_ms());
        if replayed == 0 {
            monitor.start_trip()?;
        }
        match record {
            TripRecord::Location(sample) => monitor.on_location(sample)?,
            TripRecord::Motion(sample) => monitor.on_motion(sample)?,
        }
        replayed += 1;
    }

    if replayed > 0 {
        monitor.stop_trip()?;
    }
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        scoring::{FEATURE_COUNT, FeatureScaler, LinearModelBackend, NEUTRAL_SCORE, ScoringModel},
        telemetry::{Clock, RecordedTripProducer},
    };
    use std::sync::mpsc;

    fn monitor() -> (
        Arc<ManualClock>,
        TripMonitor,
        mpsc::Receiver<EcoDriveResult>,
    ) {
        let clock = Arc::new(ManualClock::new(0));
        let (tx, rx) = mpsc::channel();
        let monitor = TripMonitor::new(
            TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>),
            ScoringModel::heuristic(),
            tx,
        );
        (clock, monitor, rx)
    }

    #[test]
    fn test_samples_ignored_until_started() {
        let (_, monitor, rx) = monitor();
        monitor
            .on_location(LocationSample::new(0., 0., 0))
            .unwrap();
        assert!(rx.try_recv().is_err());
        assert!(monitor.last_location().is_none());
    }

    #[test]
    fn test_start_publishes_initial_result() {
        let (_, monitor, rx) = monitor();
        let initial = monitor.start_trip().unwrap();
        assert!(!initial.has_reading());
        assert_eq!(rx.try_recv().unwrap(), initial);
    }

    #[test]
    fn test_every_sample_publishes() {
        let (clock, monitor, rx) = monitor();
        monitor.start_trip().unwrap();
        monitor
            .on_motion(MotionSample::from_magnitude(2., 0))
            .unwrap();
        monitor
            .on_location(LocationSample::new(0., 0., 0))
            .unwrap();
        clock.set(1_000);
        monitor
            .on_location(LocationSample::new(0.0009, 0., 1_000))
            .unwrap();

        let published: Vec<EcoDriveResult> = rx.try_iter().collect();
        assert_eq!(published.len(), 4);
        let last = published.last().unwrap();
        assert!(last.has_reading());
        assert!(last.eco_score > 0. && last.eco_score <= 100.);
        assert!(last.fuel_liters > 0.);
        assert_eq!(monitor.last_location().unwrap().timestamp_ms, 1_000);
    }

    #[test]
    fn test_stop_trip_stops_ingestion() {
        let (_, monitor, rx) = monitor();
        monitor.start_trip().unwrap();
        monitor.stop_trip().unwrap();
        assert!(!monitor.is_tracking());
        let before = rx.try_iter().count();
        monitor
            .on_motion(MotionSample::from_magnitude(2., 0))
            .unwrap();
        assert_eq!(before, 2);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_an_error() {
        let (_, monitor, rx) = monitor();
        drop(rx);
        assert!(matches!(
            monitor.start_trip(),
            Err(EcoDriveError::ResultBroadcastError { .. })
        ));
    }

    #[test]
    fn test_refresh_thread_publishes_and_exits() {
        let (clock, monitor, rx) = monitor();
        monitor.start_trip().unwrap();
        clock.set(60_000);
        let handle = monitor.spawn_refresh(Duration::from_millis(5));

        let refreshed = rx
            .iter()
            .find(|r| r.features.duration_min > 0.)
            .unwrap();
        assert!((refreshed.features.duration_min - 1.).abs() < 1e-9);

        monitor.stop_trip().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_concurrent_streams_are_serialized() {
        let (_, monitor, rx) = monitor();
        monitor.start_trip().unwrap();

        let motion = monitor.clone();
        let motion_thread = thread::spawn(move || {
            for i in 0..500 {
                motion
                    .on_motion(MotionSample::from_magnitude((i % 2) as f64 * 2., i))
                    .unwrap();
            }
        });
        let location = monitor.clone();
        let location_thread = thread::spawn(move || {
            for i in 0..50 {
                location
                    .on_location(LocationSample::new(0., 0., i * 1000))
                    .unwrap();
            }
        });
        motion_thread.join().unwrap();
        location_thread.join().unwrap();

        assert_eq!(rx.try_iter().count(), 1 + 500 + 50);
        let features = monitor.current_result().unwrap().features;
        assert_eq!(features.distance_km, 0.);
        assert!((features.wait_time_min - 49. / 60.).abs() < 1e-9);
    }

    #[test]
    fn test_concurrent_results_never_go_backwards() {
        let (clock, monitor, rx) = monitor();
        monitor.start_trip().unwrap();

        let motion = monitor.clone();
        let motion_thread = thread::spawn(move || {
            for i in 0..5_000 {
                motion
                    .on_motion(MotionSample::from_magnitude((i % 2) as f64 * 2., i))
                    .unwrap();
            }
        });
        let location = monitor.clone();
        let location_clock = clock.clone();
        let location_thread = thread::spawn(move || {
            for i in 0..5_000 {
                location_clock.set(i * 1_000);
                // alternate moving and stationary fixes so both distance and wait time grow
                let latitude = (i / 2) as f64 * 0.0009;
                location
                    .on_location(LocationSample::new(latitude, 0., i * 1_000))
                    .unwrap();
            }
        });
        let refresher = monitor.spawn_refresh(Duration::from_millis(1));
        motion_thread.join().unwrap();
        location_thread.join().unwrap();
        monitor.stop_trip().unwrap();
        refresher.join().unwrap();
        drop(monitor);

        let published: Vec<EcoDriveResult> = rx.iter().collect();
        assert!(published.len() >= 1 + 5_000 + 5_000 + 1);
        for pair in published.windows(2) {
            assert!(pair[1].features.wait_time_min >= pair[0].features.wait_time_min);
            assert!(pair[1].features.distance_km >= pair[0].features.distance_km);
            assert!(pair[1].features.duration_min >= pair[0].features.duration_min);
        }
    }

    #[test]
    fn test_refresh_does_not_publish_after_stop() {
        let (_, monitor, rx) = monitor();
        monitor.start_trip().unwrap();
        let handle = monitor.spawn_refresh(Duration::from_millis(1));
        thread::sleep(Duration::from_millis(20));
        let last = monitor.stop_trip().unwrap();
        handle.join().unwrap();
        drop(monitor);

        assert_eq!(rx.iter().last(), Some(last));
    }

    #[test]
    fn test_shutdown_releases_backend() {
        let (_, monitor, _rx) = monitor();
        monitor.start_trip().unwrap();
        monitor.shutdown();
        assert!(!monitor.is_tracking());
        assert_eq!(monitor.scoring().backend_name(), "heuristic");
        // nothing is published once the trip stopped
        assert!(monitor.refresh().unwrap().is_none());
        // the heuristic backend keeps no resources and keeps scoring
        monitor.current_result().unwrap();
        assert_eq!(monitor.scoring().failure_count(), 0);
    }

    #[test]
    fn test_released_model_falls_back_to_neutral() {
        let clock = Arc::new(ManualClock::new(0));
        let (tx, rx) = mpsc::channel();
        let backend = LinearModelBackend::new(vec![0.; FEATURE_COUNT], 90.).unwrap();
        let monitor = TripMonitor::new(
            TelemetryAggregator::new(clock.clone() as Arc<dyn Clock>),
            ScoringModel::new(FeatureScaler::default(), Box::new(backend)),
            tx,
        );
        monitor.start_trip().unwrap();
        monitor.on_motion(MotionSample::from_magnitude(2., 0)).unwrap();
        monitor.on_location(LocationSample::new(0., 0., 0)).unwrap();
        clock.set(1_000);
        monitor
            .on_location(LocationSample::new(0.0009, 0., 1_000))
            .unwrap();
        assert_eq!(rx.try_iter().last().unwrap().eco_score, 90.);

        monitor.shutdown();
        assert_eq!(monitor.current_result().unwrap().eco_score, NEUTRAL_SCORE);
        assert_eq!(monitor.scoring().failure_count(), 1);
    }

    #[test]
    fn test_collect_trip_replays_recording() {
        let (clock, monitor, rx) = monitor();
        let mut records = Vec::new();
        for i in 0..5 {
            records.push(TripRecord::Motion(MotionSample::from_magnitude(
                (i % 2) as f64 * 2.,
                1_000_000 + i * 1000,
            )));
            records.push(TripRecord::Location(LocationSample::new(
                i as f64 * 0.0009,
                0.,
                1_000_000 + i * 1000 + 10,
            )));
        }

        let replayed =
            collect_trip(RecordedTripProducer::from_records(records), &monitor, &clock).unwrap();
        assert_eq!(replayed, 10);
        assert!(!monitor.is_tracking());

        // start + 10 samples + stop
        let published: Vec<EcoDriveResult> = rx.try_iter().collect();
        assert_eq!(published.len(), 12);
        let last = published.last().unwrap();
        assert!((last.features.distance_km - 0.4).abs() < 0.01);
        assert!((last.features.duration_min - 4010. / 60_000.).abs() < 1e-9);
    }

    #[test]
    fn test_collect_empty_trip() {
        let (clock, monitor, rx) = monitor();
        let replayed =
            collect_trip(RecordedTripProducer::default(), &monitor, &clock).unwrap();
        assert_eq!(replayed, 0);
        assert!(rx.try_recv().is_err());
    }
}
