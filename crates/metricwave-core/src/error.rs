//! Error types for the analytics engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Boxed error type used at the store-adapter boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type for analytics operations.
pub type Result<T> = std::result::Result<T, AnalyticsError>;

/// Error types for analytics engine operations.
///
/// Data-quality problems are never reported through this type; the
/// preprocessor communicates them as value state so callers can render
/// partial results. Only precondition violations and upstream failures
/// surface here.
#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Insufficient data: need at least {needed} points, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Series length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    #[error("Insufficient matched pairs: need at least {needed}, got {got}")]
    InsufficientMatches { needed: usize, got: usize },

    #[error("Failed to fetch series '{series_id}' for [{start}, {end}]: {source}")]
    UpstreamFetch {
        series_id: String,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        #[source]
        source: BoxError,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}
