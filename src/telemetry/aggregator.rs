use std::sync::Arc;

use log::debug;
use simple_moving_average::{SMA, SumTreeSMA};

use crate::geometry::distance_km;

use super::{
    Clock, LocationSample, MotionSample, RoadType, TrafficCondition, TripFeatures,
    motion::{accelerometer_indicates_motion, gps_indicates_motion, is_stop_event},
};

/// Number of recent acceleration magnitudes kept for the acceleration statistics.
pub const ACCEL_WINDOW_SIZE: usize = 100;
/// Average speed below which the trip is classified as urban, km/h.
pub const URBAN_SPEED_LIMIT_KMH: f64 = 50.;
/// More stops than this classifies traffic as moderate.
pub const MODERATE_TRAFFIC_STOP_COUNT: u32 = 5;

/// Fuses location and motion samples of a single trip into `TripFeatures`.
///
/// The aggregator is a plain owned value: callers that feed it from several
/// threads wrap it in a single mutex (see `TripMonitor`). Every ingestion is
/// O(1): speeds are kept as a running sum and acceleration in a fixed window.
pub struct TelemetryAggregator {
    clock: Arc<dyn Clock>,
    trip_start_ms: i64,
    prev_location: Option<LocationSample>,
    total_distance_km: f64,
    speed_sum_kmh: f64,
    speed_samples: usize,
    accel_window: SumTreeSMA<f64, f64, ACCEL_WINDOW_SIZE>,
    last_magnitude: f64,
    is_moving: bool,
    prev_speed_kmh: f64,
    stop_count: u32,
    wait_time_s: f64,
    features: TripFeatures,
}

impl TelemetryAggregator {
    /// Creates an aggregator with a trip already started at the clock's current time.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let trip_start_ms = clock.now_ms();
        Self {
            clock,
            trip_start_ms,
            prev_location: None,
            total_distance_km: 0.,
            speed_sum_kmh: 0.,
            speed_samples: 0,
            accel_window: SumTreeSMA::new(),
            last_magnitude: 0.,
            is_moving: false,
            prev_speed_kmh: 0.,
            stop_count: 0,
            wait_time_s: 0.,
            features: TripFeatures::default(),
        }
    }

    /// Drops all accumulated state and starts a new trip now.
    pub fn start_trip(&mut self) {
        let clock = Arc::clone(&self.clock);
        *self = Self::new(clock);
        debug!("Trip started at {}", self.trip_start_ms);
    }

    pub fn on_location(&mut self, sample: LocationSample) {
        let Some(prev) = self.prev_location.replace(sample) else {
            return;
        };

        let segment_km = distance_km(prev.coordinate(), sample.coordinate());
        let elapsed_s = ((sample.timestamp_ms - prev.timestamp_ms) as f64 / 1000.).max(0.);
        let speed_kmh = if elapsed_s > 0. {
            segment_km / elapsed_s * 3600.
        } else {
            0.
        };

        if self.is_moving && gps_indicates_motion(speed_kmh) {
            self.total_distance_km += segment_km;
            self.push_speed(speed_kmh);
        } else {
            // stationary or GPS drift, zero speeds pull the average down while idling
            self.wait_time_s += elapsed_s;
            self.push_speed(0.);
        }

        if self.is_moving && is_stop_event(self.prev_speed_kmh, speed_kmh) {
            self.stop_count += 1;
            debug!(
                "Stop event #{} ({:.1} -> {:.1} km/h)",
                self.stop_count, self.prev_speed_kmh, speed_kmh
            );
        }

        self.prev_speed_kmh = speed_kmh;
        self.recompute_snapshot();
    }

    pub fn on_motion(&mut self, sample: MotionSample) {
        let magnitude = sample.magnitude.abs();
        self.accel_window.add_sample(magnitude);
        self.is_moving = accelerometer_indicates_motion(self.last_magnitude, magnitude);
        self.last_magnitude = magnitude;
        self.recompute_snapshot();
    }

    /// Recomputes the snapshot without new samples so time based fields stay fresh.
    pub fn refresh(&mut self) {
        self.recompute_snapshot();
    }

    pub fn current_features(&self) -> TripFeatures {
        self.features
    }

    /// Most recent location fix, `None` until the first fix arrives.
    pub fn last_location(&self) -> Option<LocationSample> {
        self.prev_location
    }

    /// Whether the accelerometer currently reports motion.
    pub fn is_moving(&self) -> bool {
        self.is_moving
    }

    fn push_speed(&mut self, speed_kmh: f64) {
        self.speed_sum_kmh += speed_kmh;
        self.speed_samples += 1;
    }

    fn recompute_snapshot(&mut self) {
        let duration_min = ((self.clock.now_ms() - self.trip_start_ms) as f64 / 60_000.).max(0.);

        let avg_speed_kmh = if self.speed_samples > 0 {
            self.speed_sum_kmh / self.speed_samples as f64
        } else {
            0.
        };

        let accel_samples = self.accel_window.get_num_samples();
        let avg_acceleration = if accel_samples > 0 {
            self.accel_window.get_average()
        } else {
            0.
        };
        let acceleration_std_dev = if accel_samples > 1 {
            let variance = self
                .accel_window
                .get_sample_window_iter()
                .map(|sample| (sample - avg_acceleration).powi(2))
                .sum::<f64>()
                / accel_samples as f64;
            variance.sqrt()
        } else {
            0.
        };

        let road_type = if avg_speed_kmh < URBAN_SPEED_LIMIT_KMH {
            RoadType::Urban
        } else {
            RoadType::Rural
        };
        let traffic_condition = if self.stop_count > MODERATE_TRAFFIC_STOP_COUNT {
            TrafficCondition::Moderate
        } else {
            TrafficCondition::Light
        };

        self.features = TripFeatures {
            distance_km: self.total_distance_km,
            duration_min,
            avg_speed_kmh,
            avg_acceleration,
            acceleration_std_dev,
            stop_count: self.stop_count,
            road_type,
            traffic_condition,
            wait_time_min: self.wait_time_s / 60.,
        };
    }
}
