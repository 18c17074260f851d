// Route planning: candidate paths from a routing provider, ranked by predicted fuel use

pub mod osrm;
pub mod scorer;

use std::future::Future;

pub use osrm::OsrmClient;
pub use scorer::{RouteScorer, heuristic_eco_score, rank_candidates, score_route};
use serde::{Deserialize, Serialize};
use uom::si::{
    f64::{Length, Time},
    length::meter,
    time::second,
};

use crate::{errors::EcoDriveError, geometry::Coordinate};

/// A request for alternative paths between two points.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RouteRequest {
    pub origin: Coordinate,
    pub destination: Coordinate,
    /// Upper bound on the number of paths the provider should return
    pub alternatives: u32,
}

/// One path as returned by a routing provider, before scoring.
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderRoute {
    pub distance: Length,
    pub duration: Time,
    /// Path geometry as an encoded polyline
    pub geometry: String,
}

impl ProviderRoute {
    pub fn new(distance_m: f64, duration_s: f64, geometry: impl Into<String>) -> Self {
        Self {
            distance: Length::new::<meter>(distance_m),
            duration: Time::new::<second>(duration_s),
            geometry: geometry.into(),
        }
    }
}

/// A scored route, ready to be shown to the driver.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RouteCandidate {
    /// Position of the path in the provider's response
    pub id: usize,
    pub distance_km: f64,
    pub duration_min: f64,
    pub path: Vec<Coordinate>,
    pub eco_score: f64,
    pub fuel_liters: f64,
    pub co2_kg: f64,
    pub turn_count: usize,
    pub recommended: bool,
}

/// Anything that can answer a `RouteRequest` with candidate paths.
///
/// Providers report transport or service problems as `RoutingUnavailable`.
/// An empty list is a valid answer; the scorer decides what that means.
pub trait RoutingProvider {
    fn routes(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Vec<ProviderRoute>, EcoDriveError>> + Send;
}

/// A provider with a canned answer, for offline use and tests.
#[derive(Clone, Debug)]
pub struct StaticRoutingProvider {
    answer: Result<Vec<ProviderRoute>, String>,
}

impl StaticRoutingProvider {
    pub fn new(routes: Vec<ProviderRoute>) -> Self {
        Self { answer: Ok(routes) }
    }

    pub fn failing(cause: impl Into<String>) -> Self {
        Self {
            answer: Err(cause.into()),
        }
    }
}

impl RoutingProvider for StaticRoutingProvider {
    fn routes(
        &self,
        request: &RouteRequest,
    ) -> impl Future<Output = Result<Vec<ProviderRoute>, EcoDriveError>> + Send {
        let answer = match &self.answer {
            Ok(routes) => Ok(routes
                .iter()
                .take(request.alternatives as usize)
                .cloned()
                .collect()),
            Err(cause) => Err(EcoDriveError::RoutingUnavailable {
                cause: cause.clone(),
            }),
        };
        std::future::ready(answer)
    }
}
