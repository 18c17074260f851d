//! Fuel and CO2 estimation shared by route planning and live trip scoring.

/// Base fuel consumption in L/100km for an eco-score of 100.
pub const BASE_FUEL_RATE_L_PER_100KM: f64 = 6.0;
/// Fuel burnt while the engine idles, in L/hour.
pub const IDLE_FUEL_RATE_L_PER_HOUR: f64 = 0.8;
/// kg of CO2 emitted per liter of fuel burnt.
pub const CO2_KG_PER_LITER: f64 = 2.31;

/// Estimates fuel used over `distance_km`, plus fuel burnt idling for `wait_time_min`.
///
/// A score of 100 consumes at the base rate, a score of 0 doubles it. Scores
/// outside `[0, 100]` are clamped and negative inputs count as zero, so the
/// result is never negative.
pub fn fuel_liters(eco_score: f64, distance_km: f64, wait_time_min: f64) -> f64 {
    let eco_score = eco_score.clamp(0., 100.);
    let multiplier = 1. + (100. - eco_score) / 100.;
    let driving_fuel = BASE_FUEL_RATE_L_PER_100KM * distance_km.max(0.) / 100. * multiplier;
    let idling_fuel = wait_time_min.max(0.) / 60. * IDLE_FUEL_RATE_L_PER_HOUR;

    driving_fuel + idling_fuel
}

pub fn co2_kg(fuel_liters: f64) -> f64 {
    fuel_liters * CO2_KG_PER_LITER
}

/// Coarse classification of an eco-score used to pick driving advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EcoBand {
    Excellent,
    Good,
    Poor,
}

impl EcoBand {
    pub fn from_score(score: f64) -> Self {
        if score >= 80. {
            EcoBand::Excellent
        } else if score >= 60. {
            EcoBand::Good
        } else {
            EcoBand::Poor
        }
    }
}

impl std::fmt::Display for EcoBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EcoBand::Excellent => write!(f, "Excellent"),
            EcoBand::Good => write!(f, "Good"),
            EcoBand::Poor => write!(f, "Needs improvement"),
        }
    }
}

/// Driving advice for the given eco-score.
pub fn eco_tips(score: f64) -> &'static [&'static str] {
    match EcoBand::from_score(score) {
        EcoBand::Excellent => &[
            "Excellent driving! Keep it up.",
            "Your smooth acceleration saves fuel.",
            "You're making a positive environmental impact.",
        ],
        EcoBand::Good => &[
            "Good driving, but there's room for improvement.",
            "Try to avoid sudden accelerations.",
            "Maintain steady speed when possible.",
            "Anticipate traffic to reduce braking.",
        ],
        EcoBand::Poor => &[
            "Your driving could be more eco-friendly.",
            "Avoid harsh acceleration and braking.",
            "Try to maintain a steady speed.",
            "Reduce aggressive driving to save fuel.",
            "Plan ahead to minimize stops.",
        ],
    }
}
