use itertools::Itertools;
use log::{debug, info, warn};
use uom::si::{length::kilometer, time::minute};

use crate::{
    errors::EcoDriveError,
    fuel::{BASE_FUEL_RATE_L_PER_100KM, co2_kg, fuel_liters},
    geometry::{Coordinate, count_turns, polyline},
};

use super::{ProviderRoute, RouteCandidate, RouteRequest, RoutingProvider};

/// Number of alternative paths requested per planning call.
pub const MAX_ALTERNATIVES: u32 = 3;
/// Assumed average speed when the provider reports no duration, km/h.
pub const FALLBACK_SPEED_KMH: f64 = 50.;
/// Speed the time efficiency adjustment is measured against, km/h.
const REFERENCE_SPEED_KMH: f64 = 60.;
/// Eco-score bonus by fuel rank: best route first.
const RANK_BONUS: [f64; 2] = [10., 5.];

/// Plans routes between two points and ranks them by predicted fuel use.
///
/// The scorer holds no state across calls, so concurrent planning requests
/// are independent. Callers that fire several requests discard stale answers
/// themselves.
pub struct RouteScorer<P: RoutingProvider> {
    provider: P,
    alternatives: u32,
}

impl<P: RoutingProvider> RouteScorer<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            alternatives: MAX_ALTERNATIVES,
        }
    }

    pub fn with_alternatives(mut self, alternatives: u32) -> Self {
        self.alternatives = alternatives.max(1);
        self
    }

    /// Fetches candidate paths and returns them cheapest first, the first one
    /// flagged as recommended.
    ///
    /// # Errors
    ///
    /// `RoutingUnavailable` when the provider fails or none of its paths can
    /// be decoded. Paths with a malformed geometry are skipped.
    pub async fn plan_routes(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<Vec<RouteCandidate>, EcoDriveError> {
        let request = RouteRequest {
            origin,
            destination,
            alternatives: self.alternatives,
        };
        let routes = self.provider.routes(&request).await?;

        let candidates: Vec<RouteCandidate> = routes
            .iter()
            .enumerate()
            .filter_map(|(id, route)| match score_route(id, route) {
                Ok(candidate) => Some(candidate),
                Err(e) => {
                    warn!("Skipping route {}: {}", id, e);
                    None
                }
            })
            .collect();

        if candidates.is_empty() {
            return Err(EcoDriveError::RoutingUnavailable {
                cause: format!(
                    "no usable routes from {} to {} ({} returned)",
                    origin,
                    destination,
                    routes.len()
                ),
            });
        }

        let ranked = rank_candidates(candidates);
        info!(
            "Planned {} routes from {} to {}, recommended route {}",
            ranked.len(),
            origin,
            destination,
            ranked[0].id
        );
        Ok(ranked)
    }
}

/// Decodes and scores a single provider path, unranked.
pub fn score_route(id: usize, route: &ProviderRoute) -> Result<RouteCandidate, EcoDriveError> {
    let path = polyline::decode(&route.geometry)?;
    let distance_km = route.distance.get::<kilometer>();
    let duration_min = route.duration.get::<minute>();
    let turn_count = count_turns(&path);

    let eco_score = heuristic_eco_score(distance_km, duration_min, turn_count);
    let fuel = fuel_liters(eco_score, distance_km, 0.);

    Ok(RouteCandidate {
        id,
        distance_km,
        duration_min,
        path,
        eco_score,
        fuel_liters: fuel,
        co2_kg: co2_kg(fuel),
        turn_count,
        recommended: false,
    })
}

/// Fuel rate multiplier for an average speed; 60-80 km/h is the sweet spot.
fn speed_multiplier(avg_speed_kmh: f64) -> f64 {
    if avg_speed_kmh < 30. {
        1.5
    } else if avg_speed_kmh < 50. {
        1.2
    } else if (60. ..=80.).contains(&avg_speed_kmh) {
        0.9
    } else if avg_speed_kmh > 100. {
        1.4
    } else if avg_speed_kmh > 90. {
        1.3
    } else {
        1.0
    }
}

/// Fuel rate multiplier for the turn density of a path.
fn turn_multiplier(turns_per_100km: f64) -> f64 {
    if turns_per_100km > 20. {
        1.3
    } else if turns_per_100km > 15. {
        1.2
    } else if turns_per_100km > 10. {
        1.1
    } else {
        1.0
    }
}

fn base_score(fuel_per_km: f64) -> f64 {
    if fuel_per_km < 0.05 {
        95.
    } else if fuel_per_km < 0.06 {
        85.
    } else if fuel_per_km < 0.07 {
        75.
    } else if fuel_per_km < 0.08 {
        65.
    } else if fuel_per_km < 0.09 {
        55.
    } else if fuel_per_km < 0.10 {
        45.
    } else {
        35.
    }
}

fn time_efficiency(speed_ratio: f64) -> f64 {
    if speed_ratio > 1.3 {
        -5.
    } else if speed_ratio > 1.1 {
        2.
    } else if speed_ratio > 0.9 {
        0.
    } else if speed_ratio > 0.7 {
        -3.
    } else {
        -8.
    }
}

/// Closed-form eco-score of a path from its length, duration and turn count.
pub fn heuristic_eco_score(distance_km: f64, duration_min: f64, turn_count: usize) -> f64 {
    let avg_speed_kmh = if duration_min > 0. {
        distance_km / (duration_min / 60.)
    } else {
        FALLBACK_SPEED_KMH
    };
    let turns_per_100km = if distance_km > 0. {
        turn_count as f64 / distance_km * 100.
    } else {
        0.
    };

    let fuel_rate =
        BASE_FUEL_RATE_L_PER_100KM * speed_multiplier(avg_speed_kmh) * turn_multiplier(turns_per_100km);
    let estimated_fuel = fuel_rate * distance_km / 100.;
    // a path without length has no per-km consumption and lands in the worst band
    let fuel_per_km = if distance_km > 0. {
        estimated_fuel / distance_km
    } else {
        f64::INFINITY
    };

    let time_adjustment = if duration_min > 0. {
        time_efficiency(avg_speed_kmh / REFERENCE_SPEED_KMH)
    } else {
        0.
    };
    let score = (base_score(fuel_per_km) + time_adjustment).clamp(0., 100.);

    debug!(
        "Route score: {} (fuel: {:.3} L, fuel/km: {:.4}, dist: {:.2} km, speed: {:.1} km/h, turns: {})",
        score, estimated_fuel, fuel_per_km, distance_km, avg_speed_kmh, turn_count
    );
    score
}

/// Orders candidates by absolute fuel, cheapest first, and applies the rank bonus.
///
/// The bonus only touches the eco-score; fuel and CO2 keep their estimates.
pub fn rank_candidates(candidates: Vec<RouteCandidate>) -> Vec<RouteCandidate> {
    candidates
        .into_iter()
        .sorted_by(|a, b| a.fuel_liters.total_cmp(&b.fuel_liters))
        .enumerate()
        .map(|(rank, candidate)| {
            let bonus = RANK_BONUS.get(rank).copied().unwrap_or(0.);
            RouteCandidate {
                eco_score: (candidate.eco_score + bonus).clamp(0., 100.),
                recommended: rank == 0,
                ..candidate
            }
        })
        .collect()
}
