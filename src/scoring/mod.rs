pub mod backend;

use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicU64, Ordering},
};

pub use backend::{HeuristicBackend, LinearModelBackend, ScoringBackend};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};

use crate::{
    errors::EcoDriveError,
    fuel::{co2_kg, fuel_liters},
    telemetry::{EcoDriveResult, RoadType, TrafficCondition, TripFeatures},
};

/// Length of the feature vector shared with every scoring backend.
pub const FEATURE_COUNT: usize = 10;
/// Score reported when the backend fails during a live trip.
pub const NEUTRAL_SCORE: f64 = 50.;
/// Below this distance the trip has no eco-score yet, km.
pub const MIN_SCORING_DISTANCE_KM: f64 = 0.001;

pub type FeatureVector = [f64; FEATURE_COUNT];

/// Lays out trip features in the order the scoring backends were trained on.
///
/// 0. acceleration standard deviation
/// 1. stop count
/// 2. average acceleration
/// 3. average speed
/// 4. trip duration
/// 5. trip distance
/// 6. road type urban (one-hot)
/// 7. traffic moderate (one-hot)
/// 8. traffic light (one-hot)
/// 9. road type rural (one-hot)
///
/// The order must never change without retraining every deployed model.
pub fn build_feature_vector(features: &TripFeatures) -> FeatureVector {
    let one_hot = |flag: bool| if flag { 1. } else { 0. };
    [
        features.acceleration_std_dev,
        features.stop_count as f64,
        features.avg_acceleration,
        features.avg_speed_kmh,
        features.duration_min,
        features.distance_km,
        one_hot(features.road_type == RoadType::Urban),
        one_hot(features.traffic_condition == TrafficCondition::Moderate),
        one_hot(features.traffic_condition == TrafficCondition::Light),
        one_hot(features.road_type == RoadType::Rural),
    ]
}

/// Standardizes each element as `(x - mean) / scale`.
pub fn normalize(vector: &[f64], means: &[f64], scales: &[f64]) -> Result<Vec<f64>, EcoDriveError> {
    if vector.len() != means.len() || vector.len() != scales.len() {
        return Err(EcoDriveError::FeatureSizeMismatch {
            expected: means.len(),
            actual: vector.len(),
        });
    }

    Ok(vector
        .iter()
        .zip(means.iter().zip(scales))
        .map(|(x, (mean, scale))| (x - mean) / scale)
        .collect())
}

/// Per-deployment standardization parameters.
///
/// Loaded from JSON `{ "mean": [..], "scale": [..] }`, each with exactly
/// `FEATURE_COUNT` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

impl Default for FeatureScaler {
    fn default() -> Self {
        Self {
            mean: vec![1.0, 3.0, 1.5, 40.0, 20.0, 10.0, 0.5, 0.3, 0.7, 0.5],
            scale: vec![0.8, 3.0, 1.0, 20.0, 15.0, 10.0, 0.5, 0.46, 0.46, 0.5],
        }
    }
}

impl FeatureScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, EcoDriveError> {
        for values in [&mean, &scale] {
            if values.len() != FEATURE_COUNT {
                return Err(EcoDriveError::FeatureSizeMismatch {
                    expected: FEATURE_COUNT,
                    actual: values.len(),
                });
            }
        }
        if let Some(index) = scale.iter().position(|s| *s == 0. || !s.is_finite()) {
            return Err(EcoDriveError::InvalidScaler {
                reason: format!("scale[{}] is {}", index, scale[index]),
            });
        }
        if mean.iter().any(|m| !m.is_finite()) {
            return Err(EcoDriveError::InvalidScaler {
                reason: "mean contains a non-finite value".to_string(),
            });
        }
        Ok(Self { mean, scale })
    }

    pub fn from_file(path: &Path) -> Result<Self, EcoDriveError> {
        let content =
            fs::read_to_string(path).map_err(|e| EcoDriveError::ModelIOError { source: e })?;
        let raw: FeatureScaler = serde_json::from_str(&content)
            .map_err(|e| EcoDriveError::ModelParseError { source: e })?;
        info!("Loaded feature scaler from {:?}", path);
        Self::new(raw.mean, raw.scale)
    }

    pub fn transform(&self, vector: &FeatureVector) -> Result<Vec<f64>, EcoDriveError> {
        normalize(vector, &self.mean, &self.scale)
    }
}

/// Turns trip features into a 0-100 eco-score through a pluggable backend.
pub struct ScoringModel {
    scaler: FeatureScaler,
    backend: Box<dyn ScoringBackend>,
    failures: AtomicU64,
}

impl ScoringModel {
    pub fn new(scaler: FeatureScaler, backend: Box<dyn ScoringBackend>) -> Self {
        info!("Scoring model ready, backend: {}", backend.name());
        Self {
            scaler,
            backend,
            failures: AtomicU64::new(0),
        }
    }

    /// Default scaler with the closed-form backend, for deployments without a model.
    pub fn heuristic() -> Self {
        Self::new(FeatureScaler::default(), Box::new(HeuristicBackend))
    }

    /// Scores the features, propagating any failure.
    pub fn try_predict(&self, features: &TripFeatures) -> Result<f64, EcoDriveError> {
        let normalized = self.scaler.transform(&build_feature_vector(features))?;
        let raw = self.backend.score(&normalized)?;
        if !raw.is_finite() {
            return Err(EcoDriveError::ScoringBackendFailure {
                reason: format!("backend {} returned {}", self.backend.name(), raw),
            });
        }
        Ok(raw.clamp(0., 100.))
    }

    /// Scores the features for the live loop: backend failures are logged,
    /// counted and replaced by `NEUTRAL_SCORE`.
    ///
    /// # Errors
    ///
    /// `FeatureSizeMismatch` is a broken model/scaler deployment rather than a
    /// transient failure and is returned to the caller.
    pub fn predict(&self, features: &TripFeatures) -> Result<f64, EcoDriveError> {
        match self.try_predict(features) {
            Ok(score) => Ok(score),
            Err(e @ EcoDriveError::FeatureSizeMismatch { .. }) => {
                error!(
                    "Scoring backend {} rejected the feature vector: {}",
                    self.backend.name(),
                    e
                );
                Err(e)
            }
            Err(e) => {
                let failures = self.failures.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    "Scoring backend {} failed ({} failures so far): {}",
                    self.backend.name(),
                    failures,
                    e
                );
                Ok(NEUTRAL_SCORE)
            }
        }
    }

    /// Number of `predict` calls that fell back to the neutral score.
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Builds the full live result for a feature snapshot.
    ///
    /// Trips shorter than `MIN_SCORING_DISTANCE_KM` get no score (0) and only
    /// the fuel burnt idling; the backend is not consulted for them.
    pub fn evaluate(&self, features: TripFeatures) -> Result<EcoDriveResult, EcoDriveError> {
        if features.distance_km < MIN_SCORING_DISTANCE_KM {
            let fuel = fuel_liters(NEUTRAL_SCORE, 0., features.wait_time_min);
            return Ok(EcoDriveResult {
                eco_score: 0.,
                fuel_liters: fuel,
                co2_kg: co2_kg(fuel),
                features,
            });
        }

        let eco_score = self.predict(&features)?;
        let fuel = fuel_liters(eco_score, features.distance_km, features.wait_time_min);
        debug!(
            "Eco score {:.1} over {:.3} km, fuel {:.3} L",
            eco_score, features.distance_km, fuel
        );
        Ok(EcoDriveResult {
            eco_score,
            fuel_liters: fuel,
            co2_kg: co2_kg(fuel),
            features,
        })
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Releases the backend. Later predictions fall back to the neutral score
    /// if the backend cannot score without its resources.
    pub fn release(&self) {
        info!("Releasing scoring backend {}", self.backend.name());
        self.backend.release();
    }
}
