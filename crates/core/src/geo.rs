//! Coordinate validation and great-circle distance.

use crate::error::CoreError;

/// Mean Earth radius used by the haversine formula, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A validated latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Build coordinates from optional request fields.
    ///
    /// Both values are required, must be finite, and must lie in
    /// `[-90, 90]` / `[-180, 180]` respectively.
    pub fn parse(latitude: Option<f64>, longitude: Option<f64>) -> Result<Self, CoreError> {
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            return Err(CoreError::Validation(
                "latitude and longitude are required".to_string(),
            ));
        };
        if !latitude.is_finite() || !longitude.is_finite() {
            return Err(CoreError::Validation(
                "latitude and longitude must be finite numbers".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(CoreError::Validation(format!(
                "latitude must be between -90 and 90, got {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::Validation(format!(
                "longitude must be between -180 and 180, got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Validate an optional reported accuracy radius (metres).
pub fn validate_accuracy(accuracy: Option<f64>) -> Result<(), CoreError> {
    match accuracy {
        Some(a) if !a.is_finite() || a < 0.0 => Err(CoreError::Validation(
            "accuracy must be a non-negative number".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Great-circle distance between two points in kilometres.
pub fn haversine_km(a: Coordinates, b: Coordinates) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Rounding can push h just past 1 for near-antipodal points.
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_KM * c
}

/// Sum of distances between adjacent points, in the order given.
pub fn path_distance_km(points: &[Coordinates]) -> f64 {
    points
        .windows(2)
        .map(|pair| haversine_km(pair[0], pair[1]))
        .sum()
}
