use super::Coordinate;

/// Heading changes strictly inside this band count as a turn.
const MIN_TURN_DEG: f64 = 30.;
const MAX_TURN_DEG: f64 = 330.;

/// Initial great-circle bearing from `from` to `to`, in degrees within `[0, 360)`.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let y = d_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lon.cos();

    let degrees = y.atan2(x).to_degrees().rem_euclid(360.);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if degrees >= 360. { 0. } else { degrees }
}

/// Counts the significant heading changes along a path.
///
/// Each interior point compares the bearing it was reached with against the
/// bearing it is left with. Paths with fewer than three points have no turns.
pub fn count_turns(path: &[Coordinate]) -> usize {
    path.windows(3)
        .filter(|w| {
            let change = (bearing(w[1], w[2]) - bearing(w[0], w[1]))
                .abs()
                .rem_euclid(360.);
            change > MIN_TURN_DEG && change < MAX_TURN_DEG
        })
        .count()
}
