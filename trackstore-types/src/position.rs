use serde::{Deserialize, Serialize};

/// A geographic position in degrees.
///
/// Field order follows the way position updates arrive (`latitude`, then `longitude`). The
/// GeoJSON coordinate order is a separate type, [`LngLat`], and the two only meet through the
/// explicit `From` conversions below.
///
/// # Examples
///
/// ```
/// use trackstore_types::position::Position;
///
/// let p = Position::new(60.15, 24.95);
/// assert_eq!(p.latitude, 60.15);
/// assert_eq!(p.longitude, 24.95);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Create a position from latitude and longitude in degrees.
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite numbers.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }

    /// Great-circle distance to another position in meters.
    ///
    /// See [`crate::distance::haversine_distance`].
    #[inline]
    pub fn distance_to(&self, other: &Position) -> f64 {
        crate::distance::haversine_distance(self, other)
    }

    /// The `[lng, lat]` form of this position.
    #[inline]
    pub fn to_lng_lat(self) -> LngLat {
        LngLat::from(self)
    }
}

impl From<Position> for geo::Point<f64> {
    fn from(position: Position) -> Self {
        geo::Point::new(position.longitude, position.latitude)
    }
}

impl From<geo::Point<f64>> for Position {
    fn from(point: geo::Point<f64>) -> Self {
        Self::new(point.y(), point.x())
    }
}

/// A `[longitude, latitude]` pair, the coordinate order of GeoJSON.
///
/// Serializes as a two-element array.
///
/// ```
/// use trackstore_types::position::{LngLat, Position};
///
/// let lng_lat = LngLat::from(Position::new(60.0, 25.0));
/// assert_eq!(lng_lat.lng(), 25.0);
/// assert_eq!(lng_lat.lat(), 60.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LngLat(pub f64, pub f64);

impl LngLat {
    #[inline]
    pub fn lng(&self) -> f64 {
        self.0
    }

    #[inline]
    pub fn lat(&self) -> f64 {
        self.1
    }
}

impl From<Position> for LngLat {
    fn from(position: Position) -> Self {
        Self(position.longitude, position.latitude)
    }
}

impl From<LngLat> for Position {
    fn from(lng_lat: LngLat) -> Self {
        Self::new(lng_lat.1, lng_lat.0)
    }
}

impl From<LngLat> for Vec<f64> {
    fn from(lng_lat: LngLat) -> Self {
        vec![lng_lat.0, lng_lat.1]
    }
}
