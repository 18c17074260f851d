// Sensor fusion predicates deciding whether the vehicle is actually moving.
// The accelerometer and GPS checks are kept separate; the aggregator combines them.

/// Change in acceleration magnitude between two samples that signals motion, m/s^2.
pub const MOVEMENT_THRESHOLD: f64 = 0.5;
/// Magnitude above which a single reading signals motion on its own, m/s^2.
pub const SUSTAINED_MOTION_MAGNITUDE: f64 = 9.8 + MOVEMENT_THRESHOLD;
/// GPS speed above which the vehicle is considered moving, km/h.
pub const GPS_SPEED_THRESHOLD_KMH: f64 = 1.0;
/// Speed the vehicle must have exceeded for a drop to near zero to count as a stop, km/h.
pub const STOP_SPEED_THRESHOLD_KMH: f64 = 5.0;

/// Accelerometer side: a sudden jolt or a sustained high reading.
pub fn accelerometer_indicates_motion(last_magnitude: f64, magnitude: f64) -> bool {
    (magnitude - last_magnitude).abs() > MOVEMENT_THRESHOLD
        || magnitude > SUSTAINED_MOTION_MAGNITUDE
}

/// GPS side: the speed between two fixes is above the drift floor.
pub fn gps_indicates_motion(speed_kmh: f64) -> bool {
    speed_kmh > GPS_SPEED_THRESHOLD_KMH
}

/// A stop is a transition from clearly moving to standing still, not a single low reading.
pub fn is_stop_event(prev_speed_kmh: f64, speed_kmh: f64) -> bool {
    prev_speed_kmh > STOP_SPEED_THRESHOLD_KMH && !gps_indicates_motion(speed_kmh)
}
