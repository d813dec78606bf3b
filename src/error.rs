//! Error types for the track engine.

use trackstore_types::bounds::BoundsError;

/// Errors surfaced by track queries, configuration and service wiring.
#[derive(Debug, thiserror::Error)]
pub enum TrackError {
    /// No accumulator exists for the requested context
    #[error("no track available for {0}")]
    NotFound(String),

    /// A bounding box was malformed or inverted
    #[error("invalid bounding box: {0}")]
    InvalidBounds(#[from] BoundsError),

    /// A radius filter was requested but the self position is unknown
    #[error("radius filter requested but no reference position is available")]
    MissingReferencePosition,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Historical track fetch failed
    #[error("track fetch failed: {0}")]
    Fetch(String),

    #[error("track service has been stopped")]
    ServiceStopped,

    /// Background work was requested outside of a tokio runtime
    #[error("no async runtime available: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, TrackError>;
