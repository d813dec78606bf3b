//! Great-circle distance on a spherical Earth.

use crate::position::Position;

/// Mean Earth radius in meters used by [`haversine_distance`].
pub const EARTH_MEAN_RADIUS_M: f64 = 6_371_000.0;

/// Haversine distance between two positions in meters.
///
/// Inputs are degrees and are converted to radians as given, without normalization. The
/// intermediate term is clamped to `[0, 1]` so rounding near antipodal points cannot produce a
/// NaN.
///
/// # Examples
///
/// ```
/// use trackstore_types::distance::haversine_distance;
/// use trackstore_types::position::Position;
///
/// let p = Position::new(51.5, -0.12);
/// assert_eq!(haversine_distance(&p, &p), 0.0);
///
/// // One degree of latitude is roughly 111 km
/// let d = haversine_distance(&Position::new(0.0, 0.0), &Position::new(1.0, 0.0));
/// assert!((d - 111_195.0).abs() < 1.0);
/// ```
pub fn haversine_distance(from: &Position, to: &Position) -> f64 {
    let lat1 = from.latitude.to_radians();
    let lat2 = to.latitude.to_radians();
    let dlat = lat2 - lat1;
    let dlon = to.longitude.to_radians() - from.longitude.to_radians();

    let half_dlat = (dlat / 2.0).sin();
    let half_dlon = (dlon / 2.0).sin();
    let a = (half_dlat * half_dlat + lat1.cos() * lat2.cos() * half_dlon * half_dlon).clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    c * EARTH_MEAN_RADIUS_M
}
