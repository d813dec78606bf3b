//! # trackstore-types
//!
//! Geographic value types shared by the trackstore engine.
//!
//! - **Position types**: `Position` (latitude/longitude) and `LngLat`, the `[lng, lat]` tuple
//!   form used at the GeoJSON boundary
//! - **Bounding boxes**: `GeoBounds`, including boxes spanning the antimeridian
//! - **Distance**: haversine great-circle distance in meters
//!
//! All types are serializable with Serde and convert explicitly to and from the `geo` crate's
//! primitives.
//!
//! ## Examples
//!
//! ```rust
//! use trackstore_types::bounds::GeoBounds;
//! use trackstore_types::position::Position;
//!
//! let helsinki = Position::new(60.1699, 24.9384);
//! let tallinn = Position::new(59.4370, 24.7536);
//! assert!(helsinki.distance_to(&tallinn) > 80_000.0);
//!
//! // A box around the Bering Strait, crossing the date line
//! let strait = GeoBounds::new(Position::new(60.0, 170.0), Position::new(70.0, -160.0)).unwrap();
//! assert!(strait.spans_antimeridian());
//! assert!(strait.contains(&Position::new(65.0, -168.0)));
//! ```

pub mod bounds;
pub mod distance;
pub mod position;

pub use bounds::{BoundsError, GeoBounds};
pub use distance::{EARTH_MEAN_RADIUS_M, haversine_distance};
pub use position::{LngLat, Position};
