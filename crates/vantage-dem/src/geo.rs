//! Spherical-earth geometry helpers shared by the pipeline and its consumers.

use crate::{Result, TerrainError};

/// Mean radius of the Earth in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Meters per degree of latitude (and of longitude at the equator).
pub const METERS_PER_DEGREE: f64 = 111_320.0;

/// Lowest elevation treated as physically plausible (meters).
pub const MIN_PLAUSIBLE_ELEVATION_M: f64 = -500.0;

/// Highest elevation treated as physically plausible (meters).
pub const MAX_PLAUSIBLE_ELEVATION_M: f64 = 9000.0;

/// Reject coordinates outside [-90, 90] x [-180, 180] (NaN included).
pub fn validate_coordinate(lat: f64, lon: f64) -> Result<()> {
    if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
        Ok(())
    } else {
        Err(TerrainError::InvalidCoordinate { lat, lon })
    }
}

/// True when an elevation lies inside the plausible range.
pub fn is_plausible_elevation(elevation: f64) -> bool {
    elevation.is_finite()
        && (MIN_PLAUSIBLE_ELEVATION_M..=MAX_PLAUSIBLE_ELEVATION_M).contains(&elevation)
}

/// Calculate the distance between two points using the haversine formula.
///
/// Returns the distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();

    EARTH_RADIUS_M * c
}

/// Haversine distance in kilometers.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    haversine_distance(lat1, lon1, lat2, lon2) / 1000.0
}

/// Point reached by travelling `distance_m` along a great circle from
/// (`lat`, `lon`) on initial bearing `bearing_deg` (clockwise from north).
///
/// Latitude is clamped to [-90, 90] and longitude wrapped to [-180, 180].
pub fn destination_point(lat: f64, lon: f64, bearing_deg: f64, distance_m: f64) -> (f64, f64) {
    let delta = distance_m / EARTH_RADIUS_M;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let sin_phi2 = phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos();
    let phi2 = sin_phi2.clamp(-1.0, 1.0).asin();
    let y = theta.sin() * delta.sin() * phi1.cos();
    let x = delta.cos() - phi1.sin() * phi2.sin();
    let lambda2 = lambda1 + y.atan2(x);

    (phi2.to_degrees().clamp(-90.0, 90.0), wrap_longitude(lambda2.to_degrees()))
}

/// Wrap a longitude into [-180, 180].
pub fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        return lon;
    }
    let wrapped = (lon + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && lon > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// Meters spanned by one degree of longitude at a latitude.
pub fn meters_per_degree_lon(lat: f64) -> f64 {
    METERS_PER_DEGREE * lat.to_radians().cos().max(1e-6)
}

/// Convert a north/east offset in kilometers to a degree offset at `lat`.
pub fn km_to_degrees(lat: f64, north_km: f64, east_km: f64) -> (f64, f64) {
    (
        north_km * 1000.0 / METERS_PER_DEGREE,
        east_km * 1000.0 / meters_per_degree_lon(lat),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_haversine_distance() {
        // Seattle to Portland is approximately 233 km
        let dist = haversine_distance(47.6062, -122.3321, 45.5152, -122.6784);
        assert!((dist - 233_000.0).abs() < 5_000.0);
    }

    #[test]
    fn test_destination_roundtrip() {
        let (lat, lon) = destination_point(40.0, -75.0, 90.0, 10_000.0);
        assert_relative_eq!(haversine_distance(40.0, -75.0, lat, lon), 10_000.0, epsilon = 1.0);
        assert!(lon > -75.0);

        let (lat, _) = destination_point(40.0, -75.0, 0.0, 111_195.0);
        assert_relative_eq!(lat, 41.0, epsilon = 0.01);
    }

    #[test]
    fn test_validate_coordinate() {
        assert!(validate_coordinate(90.0, 180.0).is_ok());
        assert!(validate_coordinate(-90.0, -180.0).is_ok());
        assert!(validate_coordinate(90.1, 0.0).is_err());
        assert!(validate_coordinate(0.0, -180.5).is_err());
        assert!(validate_coordinate(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_wrap_longitude() {
        assert_eq!(wrap_longitude(10.0), 10.0);
        assert_relative_eq!(wrap_longitude(190.0), -170.0);
        assert_relative_eq!(wrap_longitude(-190.0), 170.0);
    }
}
