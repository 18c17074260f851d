//! Encoded polyline codec with 5 digit precision.
//!
//! Every coordinate is stored as the zig-zag encoded delta from the previous
//! point, split into 5 bit chunks, each chunk offset by 63 into printable ASCII.
//! A chunk with the 0x20 bit set is followed by another chunk of the same value.

use crate::errors::EcoDriveError;

use super::Coordinate;

const PRECISION: f64 = 1e5;
const CHUNK_BITS: u32 = 5;
const CHUNK_MASK: i64 = 0x1f;
const CONTINUATION_BIT: i64 = 0x20;
const ASCII_OFFSET: u8 = 63;
// an i64 fits in 13 chunks
const MAX_SHIFT: u32 = 60;

/// Decodes an encoded polyline into its ordered points.
///
/// # Errors
///
/// Returns `GeometryDecode` when the string ends in the middle of a value,
/// contains a byte outside the encoding alphabet, or the accumulated deltas
/// leave the valid latitude/longitude range.
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, EcoDriveError> {
    let bytes = encoded.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lng: i64 = 0;

    while index < bytes.len() {
        let start = index;
        lat = lat
            .checked_add(decode_value(bytes, &mut index)?)
            .ok_or(EcoDriveError::GeometryDecode { position: start })?;
        lng = lng
            .checked_add(decode_value(bytes, &mut index)?)
            .ok_or(EcoDriveError::GeometryDecode { position: start })?;

        let point = Coordinate::new(lat as f64 / PRECISION, lng as f64 / PRECISION);
        let in_range = (-90. ..=90.).contains(&point.latitude)
            && (-180. ..=180.).contains(&point.longitude);
        if !in_range {
            return Err(EcoDriveError::GeometryDecode { position: start });
        }
        points.push(point);
    }

    Ok(points)
}

fn decode_value(bytes: &[u8], index: &mut usize) -> Result<i64, EcoDriveError> {
    let mut result: i64 = 0;
    let mut shift: u32 = 0;

    loop {
        let byte = *bytes
            .get(*index)
            .ok_or(EcoDriveError::GeometryDecode { position: *index })?;
        if byte < ASCII_OFFSET || shift > MAX_SHIFT {
            return Err(EcoDriveError::GeometryDecode { position: *index });
        }
        let chunk = (byte - ASCII_OFFSET) as i64;
        *index += 1;

        result |= (chunk & CHUNK_MASK) << shift;
        shift += CHUNK_BITS;
        if chunk & CONTINUATION_BIT == 0 {
            break;
        }
    }

    if result & 1 != 0 {
        Ok(!(result >> 1))
    } else {
        Ok(result >> 1)
    }
}

/// Encodes points into a polyline, rounding each coordinate to 5 decimal places.
pub fn encode(points: &[Coordinate]) -> String {
    let mut encoded = String::with_capacity(points.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lng: i64 = 0;

    for point in points {
        let lat = (point.latitude * PRECISION).round() as i64;
        let lng = (point.longitude * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut encoded);
        encode_value(lng - prev_lng, &mut encoded);
        prev_lat = lat;
        prev_lng = lng;
    }

    encoded
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 { !(delta << 1) } else { delta << 1 };
    while value >= CONTINUATION_BIT {
        out.push(((CONTINUATION_BIT | (value & CHUNK_MASK)) as u8 + ASCII_OFFSET) as char);
        value >>= CHUNK_BITS;
    }
    out.push((value as u8 + ASCII_OFFSET) as char);
}
