//! In-memory track accumulation for moving entities.
//!
//! Each context (`vessels.<id>`, `aircraft.<id>`, ...) gets a bounded, time-throttled history of
//! positions. Tracks can be queried one at a time or filtered by bounding box or by distance from
//! a reference position, and contexts that stop reporting are pruned.
//!
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use trackstore::{GeoBounds, Position, QueryParams, TrackRegistry, TracksConfig};
//!
//! let registry = TrackRegistry::new(TracksConfig::default())?;
//! let t0 = SystemTime::now();
//! registry.record_position_at("vessels.a", Position::new(60.10, 24.90), t0);
//! registry.record_position_at("vessels.a", Position::new(60.11, 24.91), t0 + Duration::from_secs(61));
//!
//! assert_eq!(registry.track("vessels.a")?.len(), 2);
//!
//! let bbox = GeoBounds::from_lon_lat(24.0, 59.0, 26.0, 61.0)?;
//! let tracks = registry.filtered_tracks(&QueryParams::within(bbox), None)?;
//! assert!(tracks.contains_key("vessels.a"));
//! # Ok::<(), trackstore::TrackError>(())
//! ```

pub mod compute;
pub mod config;
pub mod error;
pub mod service;
pub mod source;
pub mod tracks;

pub use compute::{QueryParams, TrackMatcher};
pub use config::TracksConfig;
pub use error::{Result, TrackError};
pub use service::{Subscription, TrackService};
pub use source::{NoSelfPosition, PositionUpdate, SelfPositionSource, TrackFetcher};
pub use tracks::{
    AccumulatorSettings, RegistryStats, TrackAccumulator, TrackCollection, TrackRegistry,
};

pub use trackstore_types::{
    BoundsError, EARTH_MEAN_RADIUS_M, GeoBounds, LngLat, Position, haversine_distance,
};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod prelude {
    pub use crate::{
        GeoBounds, Position, PositionUpdate, QueryParams, Result, TrackError, TrackRegistry,
        TrackService, TracksConfig,
    };

    #[cfg(feature = "geojson")]
    pub use crate::compute::geojson::{track_to_geometry, tracks_to_json};
}
