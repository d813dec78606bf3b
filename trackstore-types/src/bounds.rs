use crate::position::Position;
use serde::{Deserialize, Serialize};

/// Error returned when a bounding box cannot be constructed.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundsError {
    /// A corner coordinate is NaN or infinite
    NonFinite,
    /// The south-west latitude lies north of the north-east latitude
    InvertedLatitude { south: f64, north: f64 },
}

impl std::fmt::Display for BoundsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFinite => write!(f, "bounding box corners must be finite"),
            Self::InvertedLatitude { south, north } => write!(
                f,
                "south-west latitude {} is north of north-east latitude {}",
                south, north
            ),
        }
    }
}

impl std::error::Error for BoundsError {}

/// A geographic bounding box given by its south-west and north-east corners.
///
/// A box whose south-west longitude is greater than its north-east longitude spans the
/// antimeridian: it runs east from `sw.longitude` across ±180° to `ne.longitude`.
///
/// # Examples
///
/// ```
/// use trackstore_types::bounds::GeoBounds;
/// use trackstore_types::position::Position;
///
/// let bbox = GeoBounds::from_lon_lat(-10.0, -10.0, 175.0, 10.0).unwrap();
/// assert!(bbox.contains(&Position::new(-9.0, 174.0)));
/// assert!(!bbox.contains(&Position::new(-9.0, 176.0)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    sw: Position,
    ne: Position,
}

impl GeoBounds {
    /// Create a bounding box from its corners.
    ///
    /// Fails if any coordinate is not finite or if `sw.latitude > ne.latitude`. Longitudes are
    /// not ordered: `sw.longitude > ne.longitude` is a box across the antimeridian.
    pub fn new(sw: Position, ne: Position) -> Result<Self, BoundsError> {
        if !sw.is_finite() || !ne.is_finite() {
            return Err(BoundsError::NonFinite);
        }
        if sw.latitude > ne.latitude {
            return Err(BoundsError::InvertedLatitude {
                south: sw.latitude,
                north: ne.latitude,
            });
        }
        Ok(Self { sw, ne })
    }

    /// Create a bounding box from `min_lon, min_lat, max_lon, max_lat`, the order used by
    /// `bbox` query parameters.
    pub fn from_lon_lat(
        min_lon: f64,
        min_lat: f64,
        max_lon: f64,
        max_lat: f64,
    ) -> Result<Self, BoundsError> {
        Self::new(
            Position::new(min_lat, min_lon),
            Position::new(max_lat, max_lon),
        )
    }

    pub fn sw(&self) -> Position {
        self.sw
    }

    pub fn ne(&self) -> Position {
        self.ne
    }

    /// Whether the box crosses the ±180° meridian.
    #[inline]
    pub fn spans_antimeridian(&self) -> bool {
        self.sw.longitude > self.ne.longitude
    }

    /// Check whether a position lies inside the box, edges included.
    ///
    /// For a box across the antimeridian the east edge is shifted by +360° and positions west
    /// of the box's west edge are shifted by +360° before comparing, so points on either side
    /// of ±180° compare on one continuous scale.
    pub fn contains(&self, position: &Position) -> bool {
        if !position.is_finite() {
            return false;
        }

        let (east, longitude) = if self.spans_antimeridian() {
            let longitude = if position.longitude < self.sw.longitude {
                position.longitude + 360.0
            } else {
                position.longitude
            };
            (self.ne.longitude + 360.0, longitude)
        } else {
            (self.ne.longitude, position.longitude)
        };

        position.latitude >= self.sw.latitude
            && position.latitude <= self.ne.latitude
            && longitude >= self.sw.longitude
            && longitude <= east
    }
}
