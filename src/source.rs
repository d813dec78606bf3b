//! Collaborator interfaces supplied by the host: position updates, the self position, and
//! historical track fetches.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use trackstore_types::position::Position;

use crate::error::Result;

/// A position update for one context, as pushed by the host's stream.
///
/// ```
/// use trackstore::PositionUpdate;
///
/// let json = r#"{"context":"vessels.self","value":{"latitude":60.1,"longitude":24.9},"timestamp":1700000000000}"#;
/// let update: PositionUpdate = serde_json::from_str(json).unwrap();
/// assert_eq!(update.value.latitude, 60.1);
/// assert!(update.observed_at().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionUpdate {
    pub context: String,
    pub value: Position,
    /// Observation time in milliseconds since the Unix epoch, as reported by the sender.
    /// Live ingestion ignores it; replays pass it to `TrackRegistry::record_position_at`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

impl PositionUpdate {
    pub fn new(context: impl Into<String>, value: Position) -> Self {
        Self {
            context: context.into(),
            value,
            timestamp: None,
        }
    }

    pub fn with_timestamp(mut self, at: SystemTime) -> Self {
        self.timestamp = at
            .duration_since(UNIX_EPOCH)
            .ok()
            .and_then(|d| u64::try_from(d.as_millis()).ok());
        self
    }

    /// The observation time carried by the update, if any.
    pub fn observed_at(&self) -> Option<SystemTime> {
        self.timestamp
            .and_then(|ms| UNIX_EPOCH.checked_add(Duration::from_millis(ms)))
    }
}

/// Lookup of the reference ("self") position used by radius queries.
pub trait SelfPositionSource: Send + Sync {
    /// The current reference position, `None` while unknown.
    fn self_position(&self) -> Option<Position>;
}

impl<F> SelfPositionSource for F
where
    F: Fn() -> Option<Position> + Send + Sync,
{
    fn self_position(&self) -> Option<Position> {
        self()
    }
}

/// A source without a self position; radius queries fail against it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSelfPosition;

impl SelfPositionSource for NoSelfPosition {
    fn self_position(&self) -> Option<Position> {
        None
    }
}

/// Provider of historical tracks, asked once for each newly seen context.
///
/// The returned future must not borrow from `self` or `context`; it is driven on a spawned task
/// and its result is applied only if the context is still tracked when it resolves.
pub trait TrackFetcher: Send + Sync {
    /// Fetch the historical track of `context`, oldest point first. `Ok(None)` when the provider
    /// has nothing for it.
    fn fetch(&self, context: &str) -> BoxFuture<'static, Result<Option<Vec<Position>>>>;
}
