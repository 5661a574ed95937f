//! Spherical web-mercator (EPSG:3857) forward and inverse projection.
//!
//! Centroid computation must happen in a projected frame, so the grid crate
//! carries its own projection math rather than binding a C library. The
//! formulas are the standard spherical ones used by web mapping tile
//! schemes; reference values in the tests were computed independently from
//! the same EPSG definition.
//!
//! Valid input domain is longitude in [-180, 180] and latitude strictly
//! between the poles; the projection diverges at |latitude| = 90.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

/// WGS84 semi-major axis, the sphere radius used by EPSG:3857.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Projects a WGS84 coordinate to web-mercator meters.
#[must_use]
pub fn to_web_mercator(longitude: f64, latitude: f64) -> (f64, f64) {
    let x = EARTH_RADIUS_M * longitude.to_radians();
    let y = EARTH_RADIUS_M * (FRAC_PI_4 + latitude.to_radians() / 2.0).tan().ln();
    (x, y)
}

/// Inverse-projects web-mercator meters back to WGS84 degrees.
#[must_use]
pub fn from_web_mercator(x: f64, y: f64) -> (f64, f64) {
    let longitude = (x / EARTH_RADIUS_M).to_degrees();
    let latitude = (2.0 * (y / EARTH_RADIUS_M).exp().atan() - FRAC_PI_2).to_degrees();
    (longitude, latitude)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn projects_known_coordinates() {
        // San Francisco, checked against the EPSG:3857 definition.
        let (x, y) = to_web_mercator(-122.4194, 37.7749);
        assert_relative_eq!(x, -13_627_665.2712, epsilon = 1e-3);
        assert_relative_eq!(y, 4_547_675.3543, epsilon = 1e-3);

        let (x, y) = to_web_mercator(10.0, 45.0);
        assert_relative_eq!(x, 1_113_194.9079, epsilon = 1e-3);
        assert_relative_eq!(y, 5_621_521.4862, epsilon = 1e-3);
    }

    #[test]
    fn origin_maps_to_origin() {
        let (x, y) = to_web_mercator(0.0, 0.0);
        assert_relative_eq!(x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn antimeridian_hits_world_edge() {
        let (x, _) = to_web_mercator(-180.0, 0.0);
        assert_relative_eq!(x, -20_037_508.3428, epsilon = 1e-3);
    }

    #[test]
    fn round_trips_through_inverse() {
        for &(lon, lat) in &[
            (-122.4194, 37.7749),
            (10.0, 45.0),
            (-66.5, 49.25),
            (0.0, 0.0),
            (179.9, -83.0),
        ] {
            let (x, y) = to_web_mercator(lon, lat);
            let (lon2, lat2) = from_web_mercator(x, y);
            assert_relative_eq!(lon, lon2, epsilon = 1e-9);
            assert_relative_eq!(lat, lat2, epsilon = 1e-9);
        }
    }
}
