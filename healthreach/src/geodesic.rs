//! Geodesic distance helpers.
//!
//! Every distance in the crate is measured on the WGS84 ellipsoid, never on
//! a planar projection.

use geo::{Distance, Geodesic};

use crate::model::Coordinate;

/// Geodesic distance between two coordinates in meters.
pub fn distance_m(a: Coordinate, b: Coordinate) -> f64 {
    Geodesic.distance(a.to_point(), b.to_point())
}

/// Round meters to two decimal places.
pub fn round_m(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}
