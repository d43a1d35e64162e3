//! Geographic primitives: points, great-circle distance, geohash cache keys.

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6371.0;
const GEOHASH_ALPHABET: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// Builds a point only when both coordinates are finite and in range.
    /// Anything else means "no geo context" for callers.
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        let valid = lat.is_finite()
            && lng.is_finite()
            && (-90.0..=90.0).contains(&lat)
            && (-180.0..=180.0).contains(&lng);
        valid.then_some(Self { lat, lng })
    }

    /// Same as [`GeoPoint::new`] for optional query parameters.
    pub fn from_optional(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Self::new(lat, lng),
            _ => None,
        }
    }

    pub fn geohash(&self, precision: usize) -> String {
        encode_geohash(self.lat, self.lng, precision)
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Encodes a coordinate as a base32 geohash of `precision` characters.
pub fn encode_geohash(lat: f64, lng: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lng_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bit = 0u8;
    let mut idx = 0usize;

    while hash.len() < precision {
        let (range, value) = if even_bit {
            (&mut lng_range, lng)
        } else {
            (&mut lat_range, lat)
        };
        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            idx = idx * 2 + 1;
            range.0 = mid;
        } else {
            idx *= 2;
            range.1 = mid;
        }
        even_bit = !even_bit;

        bit += 1;
        if bit == 5 {
            hash.push(GEOHASH_ALPHABET[idx] as char);
            bit = 0;
            idx = 0;
        }
    }

    hash
}

/// Rounds a distance to two decimals for display.
pub fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_finite_and_out_of_range() {
        assert!(GeoPoint::new(f64::NAN, 27.5).is_none());
        assert!(GeoPoint::new(53.9, f64::INFINITY).is_none());
        assert!(GeoPoint::new(91.0, 0.0).is_none());
        assert!(GeoPoint::new(0.0, -181.0).is_none());
        assert!(GeoPoint::new(53.9, 27.5).is_some());
    }

    #[test]
    fn test_from_optional_requires_both() {
        assert!(GeoPoint::from_optional(Some(53.9), None).is_none());
        assert!(GeoPoint::from_optional(Some(53.9), Some(27.5)).is_some());
    }

    #[test]
    fn test_haversine_known_distance() {
        // Minsk → Brest is roughly 326 km
        let minsk = GeoPoint { lat: 53.9045, lng: 27.5615 };
        let brest = GeoPoint { lat: 52.0976, lng: 23.7341 };
        let d = haversine_km(&minsk, &brest);
        assert!((d - 326.0).abs() < 5.0, "Distance was {d}");
    }

    #[test]
    fn test_haversine_zero_for_same_point() {
        let p = GeoPoint { lat: 10.0, lng: 10.0 };
        assert_eq!(haversine_km(&p, &p), 0.0);
    }

    #[test]
    fn test_geohash_reference_value() {
        assert_eq!(encode_geohash(57.64911, 10.40744, 11), "u4pruydqqvj");
        assert_eq!(encode_geohash(57.64911, 10.40744, 5), "u4pru");
    }

    #[test]
    fn test_nearby_points_share_prefix() {
        let a = GeoPoint { lat: 53.9000, lng: 27.5000 };
        let b = GeoPoint { lat: 53.9003, lng: 27.5004 };
        assert_eq!(a.geohash(5), b.geohash(5));
    }

    #[test]
    fn test_round_km() {
        assert_eq!(round_km(1.23456), 1.23);
    }
}
