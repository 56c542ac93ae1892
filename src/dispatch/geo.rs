// Great-circle distance for courier eligibility

use crate::models::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points in kilometers
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance_for_same_point() {
        let p = GeoPoint::new(19.4326, -99.1332);
        assert!(haversine_km(p, p) < 1e-9);
    }

    #[test]
    fn test_one_degree_longitude_at_equator() {
        let a = GeoPoint::new(0.0, 0.0);
        let b = GeoPoint::new(0.0, 1.0);
        let d = haversine_km(a, b);
        // One degree of longitude at the equator is about 111.19 km
        assert!((d - 111.19).abs() < 0.5, "got {}", d);
    }

    #[test]
    fn test_symmetry() {
        let a = GeoPoint::new(19.4326, -99.1332);
        let b = GeoPoint::new(19.3574, -99.1630);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }

    #[test]
    fn test_nearby_points_within_platform_radius() {
        // Roughly 4.5 km apart within Mexico City
        let zocalo = GeoPoint::new(19.4326, -99.1332);
        let condesa = GeoPoint::new(19.4115, -99.1710);
        let d = haversine_km(zocalo, condesa);
        assert!(d > 2.0 && d < 10.0, "got {}", d);
    }
}
