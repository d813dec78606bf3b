//! Track query parameters and their permissive parsing from query-string values.

use crate::error::Result;
use trackstore_types::bounds::GeoBounds;

/// Filters for a multi-track query.
///
/// A bounding box takes precedence over a radius; with neither, every track matches.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueryParams {
    pub bbox: Option<GeoBounds>,
    /// Radius in meters around the reference position
    pub radius: Option<f64>,
}

impl QueryParams {
    /// Parameters that match every track.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn within(bbox: GeoBounds) -> Self {
        Self {
            bbox: Some(bbox),
            radius: None,
        }
    }

    pub fn within_radius(meters: f64) -> Self {
        Self {
            bbox: None,
            radius: Some(meters),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bbox.is_none() && self.radius.is_none()
    }

    /// Whether serving these parameters needs the reference (self) position.
    pub fn needs_reference(&self) -> bool {
        self.bbox.is_none() && self.radius.is_some()
    }

    /// Parse raw `bbox` and `radius` query values.
    ///
    /// Parsing is forgiving: a bbox that is not exactly four numbers, or a radius that is not a
    /// positive number, is treated as absent rather than an error. An absent radius falls back
    /// to `default_radius`; an explicit one always wins. Four numbers describing an inverted box
    /// are still rejected with `InvalidBounds`.
    ///
    /// # Examples
    ///
    /// ```
    /// use trackstore::compute::QueryParams;
    ///
    /// let params = QueryParams::parse(Some("20,59,30,61"), None, None).unwrap();
    /// assert!(params.bbox.is_some());
    ///
    /// let params = QueryParams::parse(None, Some("lots"), Some(50_000.0)).unwrap();
    /// assert_eq!(params.radius, Some(50_000.0));
    ///
    /// assert!(QueryParams::parse(Some("0,10,5,-10"), None, None).is_err());
    /// ```
    pub fn parse(
        bbox: Option<&str>,
        radius: Option<&str>,
        default_radius: Option<f64>,
    ) -> Result<Self> {
        let bbox = match bbox {
            Some(raw) => parse_bbox(raw)?,
            None => None,
        };

        let radius = radius.and_then(parse_radius).or(default_radius);

        Ok(Self { bbox, radius })
    }
}

/// Parse `minLon,minLat,maxLon,maxLat`.
///
/// Returns `Ok(None)` unless the value holds exactly four finite numbers.
pub fn parse_bbox(raw: &str) -> Result<Option<GeoBounds>> {
    let values: Option<Vec<f64>> = raw
        .split(',')
        .map(|token| token.trim().parse::<f64>().ok().filter(|v| v.is_finite()))
        .collect();

    match values.as_deref() {
        Some(&[min_lon, min_lat, max_lon, max_lat]) => Ok(Some(GeoBounds::from_lon_lat(
            min_lon, min_lat, max_lon, max_lat,
        )?)),
        _ => {
            log::debug!("ignoring malformed bbox parameter {:?}", raw);
            Ok(None)
        }
    }
}

/// Parse a radius in meters; anything but a positive finite number is `None`.
pub fn parse_radius(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|r| r.is_finite() && *r > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackError;
    use trackstore_types::position::Position;

    #[test]
    fn test_bbox_order_is_lon_lat() {
        let bbox = parse_bbox("-10, -20, 30, 40").unwrap().unwrap();
        assert_eq!(bbox.sw(), Position::new(-20.0, -10.0));
        assert_eq!(bbox.ne(), Position::new(40.0, 30.0));
    }

    #[test]
    fn test_bbox_with_zero_coordinates() {
        let bbox = parse_bbox("0,0,10,10").unwrap().unwrap();
        assert_eq!(bbox.sw(), Position::new(0.0, 0.0));
    }

    #[test]
    fn test_malformed_bbox_is_absent() {
        for raw in ["", "1,2,3", "1,2,3,4,5", "a,b,c,d", "1,x,2,3,4", "1,2,NaN,4", "1,2,inf,4"] {
            assert!(parse_bbox(raw).unwrap().is_none(), "{raw}");
        }
    }

    #[test]
    fn test_inverted_bbox_is_an_error() {
        let err = parse_bbox("0,10,5,-10").unwrap_err();
        assert!(matches!(err, TrackError::InvalidBounds(_)));
    }

    #[test]
    fn test_dateline_bbox_parses() {
        let bbox = parse_bbox("175,-10,-175,10").unwrap().unwrap();
        assert!(bbox.spans_antimeridian());
    }

    #[test]
    fn test_radius_parsing() {
        assert_eq!(parse_radius("1500"), Some(1500.0));
        assert_eq!(parse_radius(" 2.5e3 "), Some(2500.0));
        assert_eq!(parse_radius("0"), None);
        assert_eq!(parse_radius("-5"), None);
        assert_eq!(parse_radius("far"), None);
        assert_eq!(parse_radius("NaN"), None);
    }

    #[test]
    fn test_explicit_radius_overrides_default() {
        let params = QueryParams::parse(None, Some("100000"), Some(50_000.0)).unwrap();
        assert_eq!(params.radius, Some(100_000.0));

        let params = QueryParams::parse(None, Some("10"), Some(50_000.0)).unwrap();
        assert_eq!(params.radius, Some(10.0));
    }

    #[test]
    fn test_default_radius_applies_when_absent() {
        let params = QueryParams::parse(None, None, Some(50_000.0)).unwrap();
        assert_eq!(params, QueryParams::within_radius(50_000.0));
        assert!(params.needs_reference());

        let params = QueryParams::parse(None, None, None).unwrap();
        assert!(params.is_empty());
    }

    #[test]
    fn test_bbox_suppresses_reference_lookup() {
        let params = QueryParams::parse(Some("0,0,1,1"), Some("100"), None).unwrap();
        assert!(params.bbox.is_some());
        assert!(!params.needs_reference());
    }
}
