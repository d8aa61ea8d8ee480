//! Geo math
//!
//! Haversine distance and the declared country bounding box used for
//! coordinate validation and candidate-set cache keys.

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Axis-aligned lat/lng bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.min_lat && lat <= self.max_lat && lng >= self.min_lng && lng <= self.max_lng
    }
}

/// Declared deployment bounds (India, including island territories).
pub const INDIA_BOUNDS: BoundingBox = BoundingBox {
    min_lat: 6.0,
    max_lat: 37.5,
    min_lng: 68.0,
    max_lng: 97.5,
};

/// Great-circle distance between two points in meters.
pub fn haversine_m(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();
    EARTH_RADIUS_M * c
}

/// Round coordinates to two decimals (~1.1 km cells) for cache keys.
pub fn coarse_coords(lat: f64, lng: f64) -> (f64, f64) {
    ((lat * 100.0).round() / 100.0, (lng * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_zero() {
        assert!(haversine_m(19.076, 72.8777, 19.076, 72.8777) < 1.0);
    }

    #[test]
    fn test_haversine_mumbai_to_pune() {
        // ~120 km straight line
        let d = haversine_m(19.076, 72.8777, 18.5204, 73.8567);
        assert!(d > 100_000.0 && d < 140_000.0, "distance was {d}");
    }

    #[test]
    fn test_india_bounds() {
        assert!(INDIA_BOUNDS.contains(19.076, 72.8777)); // Mumbai
        assert!(INDIA_BOUNDS.contains(12.9716, 77.5946)); // Bangalore
        assert!(!INDIA_BOUNDS.contains(51.5074, -0.1278)); // London
    }

    #[test]
    fn test_coarse_coords() {
        let (lat, lng) = coarse_coords(19.076032, 72.877718);
        assert_eq!(lat, 19.08);
        assert_eq!(lng, 72.88);
    }
}
