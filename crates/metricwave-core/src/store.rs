//! Store adapter boundary.
//!
//! The engine reads raw samples through this single contract. Query
//! execution, caching of upstream calls, retries and rate limiting all live
//! behind it and are invisible to the analytics math.

use crate::error::BoxError;
use crate::series::{Interval, TimeSeriesPoint};
use chrono::{DateTime, Utc};

/// Supplies raw samples for a series id and time window, pre-aggregated by
/// `interval` buckets.
///
/// Implementations return an empty vector (never an error) when the window
/// holds no data. Any error returned here is wrapped by the engine with the
/// series id and window and is never retried.
pub trait TimeSeriesStore {
    fn get_time_series(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> std::result::Result<Vec<TimeSeriesPoint>, BoxError>;
}

/// In-memory store used by tests and benchmarks: serves a fixed point set
/// filtered to the requested window.
#[derive(Debug, Default, Clone)]
pub struct StaticStore {
    points: Vec<TimeSeriesPoint>,
}

impl StaticStore {
    pub fn new(points: Vec<TimeSeriesPoint>) -> Self {
        Self { points }
    }
}

impl TimeSeriesStore for StaticStore {
    fn get_time_series(
        &self,
        _series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        _interval: Interval,
    ) -> std::result::Result<Vec<TimeSeriesPoint>, BoxError> {
        Ok(self
            .points
            .iter()
            .filter(|p| p.timestamp >= start && p.timestamp <= end)
            .copied()
            .collect())
    }
}
