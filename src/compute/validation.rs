//! Validation for incoming positions.

use crate::error::{Result, TrackError};
use trackstore_types::position::Position;

/// Validates a position has a finite latitude in [-90, 90] and longitude in [-180, 180].
///
/// # Examples
///
/// ```
/// use trackstore::compute::validation::validate_position;
/// use trackstore::Position;
///
/// assert!(validate_position(&Position::new(60.1, 24.9)).is_ok());
/// assert!(validate_position(&Position::new(95.0, 24.9)).is_err());
/// assert!(validate_position(&Position::new(60.1, f64::NAN)).is_err());
/// ```
pub fn validate_position(position: &Position) -> Result<()> {
    let Position {
        latitude,
        longitude,
    } = *position;

    if !latitude.is_finite() {
        return Err(TrackError::InvalidInput(format!(
            "Latitude must be finite, got: {}",
            latitude
        )));
    }

    if !longitude.is_finite() {
        return Err(TrackError::InvalidInput(format!(
            "Longitude must be finite, got: {}",
            longitude
        )));
    }

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(TrackError::InvalidInput(format!(
            "Latitude out of range [-90.0, 90.0]: {}",
            latitude
        )));
    }

    if !(-180.0..=180.0).contains(&longitude) {
        return Err(TrackError::InvalidInput(format!(
            "Longitude out of range [-180.0, 180.0]: {}",
            longitude
        )));
    }

    Ok(())
}

/// Keeps only the valid positions of a sequence, preserving order.
///
/// Returns the retained positions and the number dropped.
pub fn retain_valid(points: Vec<Position>) -> (Vec<Position>, usize) {
    let total = points.len();
    let kept: Vec<Position> = points
        .into_iter()
        .filter(|p| validate_position(p).is_ok())
        .collect();
    let dropped = total - kept.len();
    (kept, dropped)
}
