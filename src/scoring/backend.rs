use std::{fs, path::Path, sync::RwLock};

use log::info;
use serde::Deserialize;

use crate::errors::EcoDriveError;

use super::FEATURE_COUNT;

/// Turns a normalized feature vector into a raw eco-score.
///
/// Backends are loaded once and shared across every scoring call of a trip,
/// so implementations must be usable from any thread. The returned value is
/// clamped by `ScoringModel`; backends do not need to bound it.
pub trait ScoringBackend: Send + Sync {
    /// Scores a vector laid out as described by `build_feature_vector`.
    fn score(&self, normalized: &[f64]) -> Result<f64, EcoDriveError>;

    fn name(&self) -> &str;

    /// Frees whatever the backend loaded. Later calls to `score` may fail.
    fn release(&self) {}
}

#[derive(Debug, Clone, Deserialize)]
struct LinearWeights {
    weights: Vec<f64>,
    bias: f64,
}

/// A learned linear model: `bias + weights · x`.
///
/// The model artifact is a JSON file `{ "weights": [..10 values..], "bias": f }`.
pub struct LinearModelBackend {
    model: RwLock<Option<LinearWeights>>,
}

impl LinearModelBackend {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, EcoDriveError> {
        if weights.len() != FEATURE_COUNT {
            return Err(EcoDriveError::FeatureSizeMismatch {
                expected: FEATURE_COUNT,
                actual: weights.len(),
            });
        }
        Ok(Self {
            model: RwLock::new(Some(LinearWeights { weights, bias })),
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, EcoDriveError> {
        let content =
            fs::read_to_string(path).map_err(|e| EcoDriveError::ModelIOError { source: e })?;
        let model: LinearWeights = serde_json::from_str(&content)
            .map_err(|e| EcoDriveError::ModelParseError { source: e })?;
        info!("Loaded linear scoring model from {:?}", path);
        Self::new(model.weights, model.bias)
    }
}

impl ScoringBackend for LinearModelBackend {
    fn score(&self, normalized: &[f64]) -> Result<f64, EcoDriveError> {
        let guard = self
            .model
            .read()
            .map_err(|_| EcoDriveError::ScoringBackendFailure {
                reason: "model lock poisoned".to_string(),
            })?;
        let model = guard
            .as_ref()
            .ok_or_else(|| EcoDriveError::ScoringBackendFailure {
                reason: "model has been released".to_string(),
            })?;
        if normalized.len() != model.weights.len() {
            return Err(EcoDriveError::FeatureSizeMismatch {
                expected: model.weights.len(),
                actual: normalized.len(),
            });
        }

        Ok(model.bias
            + model
                .weights
                .iter()
                .zip(normalized)
                .map(|(w, x)| w * x)
                .sum::<f64>())
    }

    fn name(&self) -> &str {
        "linear-model"
    }

    fn release(&self) {
        if let Ok(mut model) = self.model.write() {
            *model = None;
        }
    }
}

const HEURISTIC_BASELINE: f64 = 75.;
const HEURISTIC_STD_DEV_PENALTY: f64 = 8.;
const HEURISTIC_STOP_PENALTY: f64 = 3.;
const HEURISTIC_ACCEL_PENALTY: f64 = 4.;
const HEURISTIC_SPEED_PENALTY: f64 = 2.;
const HEURISTIC_MODERATE_TRAFFIC_PENALTY: f64 = 3.;

/// Closed-form fallback used when no model artifact is deployed.
///
/// Works on standardized inputs: erratic acceleration, many stops, hard
/// acceleration and speeds far from the fleet mean all lower the score.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeuristicBackend;

impl ScoringBackend for HeuristicBackend {
    fn score(&self, normalized: &[f64]) -> Result<f64, EcoDriveError> {
        if normalized.len() != FEATURE_COUNT {
            return Err(EcoDriveError::FeatureSizeMismatch {
                expected: FEATURE_COUNT,
                actual: normalized.len(),
            });
        }

        Ok(HEURISTIC_BASELINE
            - HEURISTIC_STD_DEV_PENALTY * normalized[0]
            - HEURISTIC_STOP_PENALTY * normalized[1]
            - HEURISTIC_ACCEL_PENALTY * normalized[2]
            - HEURISTIC_SPEED_PENALTY * normalized[3].abs()
            - HEURISTIC_MODERATE_TRAFFIC_PENALTY * normalized[7])
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_linear_backend_dot_product() {
        let backend = LinearModelBackend::new(vec![1.; FEATURE_COUNT], 10.).unwrap();
        let input = [0.5; FEATURE_COUNT];
        assert!((backend.score(&input).unwrap() - 15.).abs() < 1e-12);
    }

    #[test]
    fn test_linear_backend_rejects_wrong_weight_count() {
        assert!(matches!(
            LinearModelBackend::new(vec![1.; 3], 0.),
            Err(EcoDriveError::FeatureSizeMismatch {
                expected: FEATURE_COUNT,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_linear_backend_release() {
        let backend = LinearModelBackend::new(vec![0.; FEATURE_COUNT], 42.).unwrap();
        assert_eq!(backend.score(&[0.; FEATURE_COUNT]).unwrap(), 42.);
        backend.release();
        assert!(matches!(
            backend.score(&[0.; FEATURE_COUNT]),
            Err(EcoDriveError::ScoringBackendFailure { .. })
        ));
    }

    #[test]
    fn test_linear_backend_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"weights": [-8, -3, -4, 0, 0, 0, 1, -2, 2, -1], "bias": 70.5}}"#
        )
        .unwrap();
        let backend = LinearModelBackend::from_file(file.path()).unwrap();
        assert_eq!(backend.name(), "linear-model");
        assert_eq!(backend.score(&[0.; FEATURE_COUNT]).unwrap(), 70.5);
    }

    #[test]
    fn test_linear_backend_from_bad_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            LinearModelBackend::from_file(file.path()),
            Err(EcoDriveError::ModelParseError { .. })
        ));
        assert!(matches!(
            LinearModelBackend::from_file(Path::new("/nonexistent/model.json")),
            Err(EcoDriveError::ModelIOError { .. })
        ));
    }

    #[test]
    fn test_heuristic_penalizes_erratic_acceleration() {
        let backend = HeuristicBackend;
        let mut smooth = [0.; FEATURE_COUNT];
        smooth[0] = -1.;
        let mut erratic = [0.; FEATURE_COUNT];
        erratic[0] = 2.;
        assert!(backend.score(&smooth).unwrap() > backend.score(&erratic).unwrap());
        assert_eq!(backend.score(&[0.; FEATURE_COUNT]).unwrap(), HEURISTIC_BASELINE);
    }
}
