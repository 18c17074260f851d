// Library interface for ecodrive
// Shared by the CLI binary, integration tests and benches

pub mod config;
pub mod errors;
pub mod fuel;
pub mod geometry;
pub mod routing;
pub mod scoring;
pub mod telemetry;
pub mod writer;

// Re-export commonly used types
pub use config::AppConfig;
pub use errors::EcoDriveError;
pub use fuel::{EcoBand, co2_kg, eco_tips, fuel_liters};
pub use geometry::Coordinate;
pub use routing::{RouteCandidate, RouteScorer, RoutingProvider};
pub use scoring::ScoringModel;
pub use telemetry::{EcoDriveResult, TelemetryAggregator, TripFeatures, TripMonitor};
