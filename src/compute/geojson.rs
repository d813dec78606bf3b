//! GeoJSON shaping of tracks.
//!
//! Tracks leave the engine as `MultiLineString` geometries holding a single line in
//! `[lng, lat]` order, and historical tracks arrive in the same shape.

use crate::error::{Result, TrackError};
use crate::tracks::TrackCollection;
use geojson::{Geometry, JsonObject, JsonValue, Value};
use trackstore_types::position::{LngLat, Position};

/// Convert a track into a `MultiLineString` with one line.
///
/// # Examples
///
/// ```
/// use trackstore::compute::geojson::track_to_geometry;
/// use trackstore::Position;
///
/// let geometry = track_to_geometry(&[Position::new(60.0, 25.0), Position::new(60.1, 25.1)]);
/// let json = geometry.to_string();
/// assert!(json.contains("MultiLineString"));
/// assert!(json.contains("[25.0,60.0]"));
/// ```
pub fn track_to_geometry(track: &[Position]) -> Geometry {
    let line: Vec<Vec<f64>> = track
        .iter()
        .map(|p| Vec::<f64>::from(LngLat::from(*p)))
        .collect();
    Geometry::new(Value::MultiLineString(vec![line]))
}

/// Convert a collection into a JSON object keyed by context.
pub fn tracks_to_json(tracks: &TrackCollection) -> JsonValue {
    let object: JsonObject = tracks
        .iter()
        .map(|(context, track)| {
            let geometry = JsonObject::from(&track_to_geometry(track));
            (context.clone(), JsonValue::Object(geometry))
        })
        .collect();
    JsonValue::Object(object)
}

/// Extract a track from a GeoJSON geometry.
///
/// A `LineString` is taken as is; for a `MultiLineString` the first line is used. An empty
/// geometry yields `None`.
pub fn track_from_geometry(geometry: &Geometry) -> Result<Option<Vec<Position>>> {
    let coordinates = match &geometry.value {
        Value::LineString(line) => line,
        Value::MultiLineString(lines) => match lines.first() {
            Some(line) => line,
            None => return Ok(None),
        },
        other => {
            return Err(TrackError::InvalidInput(format!(
                "expected a LineString or MultiLineString track, got {}",
                geometry_kind(other)
            )));
        }
    };

    if coordinates.is_empty() {
        return Ok(None);
    }

    coordinates
        .iter()
        .map(|coords| match coords.as_slice() {
            [lng, lat, ..] => Ok(Position::from(LngLat(*lng, *lat))),
            _ => Err(TrackError::InvalidInput(
                "track coordinates need at least 2 values".to_string(),
            )),
        })
        .collect::<Result<Vec<_>>>()
        .map(Some)
}

fn geometry_kind(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Parse a GeoJSON geometry string into a track.
pub fn track_from_geojson(geojson: &str) -> Result<Option<Vec<Position>>> {
    let geometry: Geometry = serde_json::from_str(geojson)
        .map_err(|e| TrackError::InvalidInput(format!("Failed to parse GeoJSON track: {}", e)))?;
    track_from_geometry(&geometry)
}
