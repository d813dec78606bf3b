//! Query processing: parameter parsing, track matching, validation, and GeoJSON shaping.

#[cfg(feature = "geojson")]
pub mod geojson;
pub mod matcher;
pub mod query;
pub mod validation;

pub use matcher::TrackMatcher;
pub use query::QueryParams;
