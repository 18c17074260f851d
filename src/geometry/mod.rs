// Coordinate geometry used by route planning and trip tracking

pub mod bearing;
pub mod polyline;

pub use bearing::{bearing, count_turns};
pub use polyline::{decode, encode};

use serde::{Deserialize, Serialize};

/// Mean Earth radius in km, spherical approximation.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A point on the Earth's surface in decimal degrees.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5},{:.5}", self.latitude, self.longitude)
    }
}

impl std::str::FromStr for Coordinate {
    type Err = String;

    /// Parses `"lat,lng"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected 'lat,lng', got '{}'", s))?;
        let latitude: f64 = lat
            .trim()
            .parse()
            .map_err(|e| format!("invalid latitude '{}': {}", lat, e))?;
        let longitude: f64 = lng
            .trim()
            .parse()
            .map_err(|e| format!("invalid longitude '{}': {}", lng, e))?;
        if !(-90. ..=90.).contains(&latitude) || !(-180. ..=180.).contains(&longitude) {
            return Err(format!("coordinate out of range: {}", s));
        }
        Ok(Self::new(latitude, longitude))
    }
}

/// Great-circle (haversine) distance between two points, in km.
pub fn distance_km(from: Coordinate, to: Coordinate) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_for_same_point() {
        let p = Coordinate::new(48.1, 11.5);
        assert_eq!(distance_km(p, p), 0.);
    }

    #[test]
    fn test_distance_one_degree_latitude() {
        let d = distance_km(Coordinate::new(0., 0.), Coordinate::new(1., 0.));
        assert!((d - 111.195).abs() < 0.01, "got {}", d);
    }

    #[test]
    fn test_parse_coordinate() {
        let c: Coordinate = "52.5200, 13.4050".parse().unwrap();
        assert_eq!(c, Coordinate::new(52.52, 13.405));
        assert!("52.52".parse::<Coordinate>().is_err());
        assert!("abc,13".parse::<Coordinate>().is_err());
        assert!("95,13".parse::<Coordinate>().is_err());
    }
}
