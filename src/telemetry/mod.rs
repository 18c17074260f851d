pub mod aggregator;
pub mod collector;
pub mod motion;
pub mod producer;

use std::{
    sync::atomic::{AtomicI64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

pub use aggregator::TelemetryAggregator;
pub use collector::{TripMonitor, collect_trip};
pub use producer::{RecordedTripProducer, SensorProducer, StreamingTripProducer};
use serde::{Deserialize, Serialize};

use crate::{geometry::Coordinate, scoring::MIN_SCORING_DISTANCE_KM};

/// Standard gravity in m/s^2, removed from the raw accelerometer norm.
pub const GRAVITY_EARTH: f64 = 9.80665;

/// A timestamped position fix from the location provider.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
    /// Milliseconds since epoch
    pub timestamp_ms: i64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            timestamp_ms,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.latitude, self.longitude)
    }
}

/// A timestamped 3-axis accelerometer reading.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Acceleration along the x axis, m/s^2
    pub x: f64,
    /// Acceleration along the y axis, m/s^2
    pub y: f64,
    /// Acceleration along the z axis, m/s^2
    pub z: f64,
    /// Vector norm minus gravity, m/s^2
    pub magnitude: f64,
    /// Milliseconds since epoch
    pub timestamp_ms: i64,
}

impl MotionSample {
    pub fn from_axes(x: f64, y: f64, z: f64, timestamp_ms: i64) -> Self {
        Self {
            x,
            y,
            z,
            magnitude: (x * x + y * y + z * z).sqrt() - GRAVITY_EARTH,
            timestamp_ms,
        }
    }

    /// Builds a sample that only carries a gravity-free magnitude.
    pub fn from_magnitude(magnitude: f64, timestamp_ms: i64) -> Self {
        Self {
            x: 0.,
            y: 0.,
            z: magnitude + GRAVITY_EARTH,
            magnitude,
            timestamp_ms,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoadType {
    #[default]
    Urban,
    Rural,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrafficCondition {
    #[default]
    Light,
    Moderate,
}

/// Snapshot of the driving behavior observed so far in a trip.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TripFeatures {
    /// Distance covered while moving, km
    pub distance_km: f64,
    /// Time since the trip started, minutes
    pub duration_min: f64,
    /// Mean of all speed samples including stationary zeros, km/h
    pub avg_speed_kmh: f64,
    /// Mean gravity-free acceleration over the recent window, m/s^2
    pub avg_acceleration: f64,
    /// Population standard deviation of the same window
    pub acceleration_std_dev: f64,
    pub stop_count: u32,
    pub road_type: RoadType,
    pub traffic_condition: TrafficCondition,
    /// Time spent stationary, minutes
    pub wait_time_min: f64,
}

/// Live scoring output, recomputed from scratch on every update.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EcoDriveResult {
    pub eco_score: f64,
    pub fuel_liters: f64,
    pub co2_kg: f64,
    pub features: TripFeatures,
}

impl EcoDriveResult {
    /// Whether the trip has covered enough distance for `eco_score` to be meaningful.
    pub fn has_reading(&self) -> bool {
        self.features.distance_km >= MIN_SCORING_DISTANCE_KM
    }
}

/// One line of a recorded trip file.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum TripRecord {
    Location(LocationSample),
    Motion(MotionSample),
}

impl TripRecord {
    pub fn timestamp_ms(&self) -> i64 {
        match self {
            TripRecord::Location(sample) => sample.timestamp_ms,
            TripRecord::Motion(sample) => sample.timestamp_ms,
        }
    }
}

/// Source of "now" for trip duration.
pub trait Clock: Send + Sync {
    /// Milliseconds since epoch
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// A clock that only moves when told to. Used for replays and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicI64,
}

impl ManualClock {
    pub fn new(now_ms: i64) -> Self {
        Self {
            now_ms: AtomicI64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
