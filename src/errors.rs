// Error types for ecodrive

use crate::telemetry::EcoDriveResult;
use snafu::Snafu;
use std::{io, sync::mpsc::SendError};

#[derive(Debug, Snafu)]
pub enum EcoDriveError {
    // Route planning errors
    #[snafu(display("Malformed encoded path: value truncated at byte {position}"))]
    GeometryDecode { position: usize },
    #[snafu(display("Routing unavailable: {cause}"))]
    RoutingUnavailable { cause: String },

    // Scoring model errors
    #[snafu(display("Feature size mismatch: expected {expected} values, got {actual}"))]
    FeatureSizeMismatch { expected: usize, actual: usize },
    #[snafu(display("Scoring backend failure: {reason}"))]
    ScoringBackendFailure { reason: String },
    #[snafu(display("Invalid feature scaler: {reason}"))]
    InvalidScaler { reason: String },
    #[snafu(display("Error reading scoring model artifact"))]
    ModelIOError { source: io::Error },
    #[snafu(display("Error parsing scoring model artifact"))]
    ModelParseError { source: serde_json::Error },

    // Live trip errors
    #[snafu(display("Sensor producer error: {description}"))]
    SensorProducerError { description: String },
    #[snafu(display("Error broadcasting eco drive result"))]
    ResultBroadcastError {
        source: Box<SendError<EcoDriveResult>>,
    },

    // Errors for the result writer
    #[snafu(display("Error writing results file"))]
    WriterError { source: io::Error },

    // Config management errors
    #[snafu(display("Could not find application data directory to save config file"))]
    NoConfigDir,
    #[snafu(display("Error accessing config file"))]
    ConfigIOError { source: io::Error },
    #[snafu(display("Error serializing config file"))]
    ConfigSerializeError { source: serde_json::Error },

    // User input validation errors
    #[snafu(display("Invalid user input: {field} - {reason}"))]
    InvalidUserInput { field: String, reason: String },
}

impl From<SendError<EcoDriveResult>> for EcoDriveError {
    fn from(value: SendError<EcoDriveResult>) -> Self {
        EcoDriveError::ResultBroadcastError {
            source: Box::new(value),
        }
    }
}
