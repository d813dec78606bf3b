//! Track predicates built from query parameters.

use crate::compute::query::QueryParams;
use crate::error::{Result, TrackError};
use trackstore_types::bounds::GeoBounds;
use trackstore_types::position::Position;

/// A predicate over whole tracks.
///
/// Filters look only at the last point of a track; the path that led there is irrelevant. An
/// empty track never passes a filter, while `All` passes everything unconditionally.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackMatcher {
    All,
    Bounds(GeoBounds),
    /// Last point within `radius` meters (inclusive) of `center`
    Radius { center: Position, radius: f64 },
}

impl TrackMatcher {
    /// Build the matcher for `params`.
    ///
    /// A bounding box wins over a radius. A radius filter requires a finite reference position
    /// and fails with `MissingReferencePosition` otherwise, rather than silently matching
    /// everything.
    pub fn new(params: &QueryParams, reference: Option<Position>) -> Result<Self> {
        if let Some(bbox) = params.bbox {
            return Ok(Self::Bounds(bbox));
        }

        match params.radius {
            Some(radius) => {
                let center = reference
                    .filter(Position::is_finite)
                    .ok_or(TrackError::MissingReferencePosition)?;
                Ok(Self::Radius { center, radius })
            }
            None => Ok(Self::All),
        }
    }

    /// Test a track by its last point.
    pub fn matches(&self, track: &[Position]) -> bool {
        match (self, track.last()) {
            (Self::All, _) => true,
            (_, None) => false,
            (_, Some(last)) => self.matches_position(last),
        }
    }

    /// Test a single position.
    pub fn matches_position(&self, position: &Position) -> bool {
        match self {
            Self::All => true,
            Self::Bounds(bbox) => bbox.contains(position),
            Self::Radius { center, radius } => center.distance_to(position) <= *radius,
        }
    }
}
