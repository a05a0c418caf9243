//! Core series types: points, intervals, decomposition output.

use chrono::{DateTime, TimeZone, Utc};
use std::str::FromStr;
use tracing::warn;

/// A single (timestamp, value) sample of one metric.
///
/// Ordering is by timestamp. The engine never deduplicates identical
/// timestamps; that is the caller's responsibility.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }

    /// Build a point from epoch milliseconds. Out-of-range inputs clamp to
    /// the epoch, which cannot occur for any timestamp a real store returns.
    pub fn from_millis(millis: i64, value: f64) -> Self {
        let timestamp = Utc
            .timestamp_millis_opt(millis)
            .single()
            .unwrap_or_else(|| Utc.timestamp_millis_opt(0).single().expect("epoch is valid"));
        Self { timestamp, value }
    }

    pub fn millis(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Aggregation bucket width for fetched series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interval {
    Hour,
    #[default]
    Day,
    Week,
    Month,
}

impl Interval {
    /// Parse an interval tag, coercing anything unrecognized to `Day`.
    ///
    /// Unknown tags are not an error anywhere in the engine; the dashboard
    /// keeps rendering on a daily grid and the coercion is logged.
    pub fn from_tag(tag: &str) -> Self {
        match Self::from_str(tag) {
            Ok(interval) => interval,
            Err(_) => {
                warn!(tag, "unrecognized interval tag, defaulting to '1 day'");
                Interval::Day
            }
        }
    }

    /// Bucket width in milliseconds. Months use a fixed 30-day width, which
    /// matches how the upstream API buckets monthly aggregates.
    pub fn as_millis(&self) -> i64 {
        match self {
            Interval::Hour => 3_600_000,
            Interval::Day => 86_400_000,
            Interval::Week => 7 * 86_400_000,
            Interval::Month => 30 * 86_400_000,
        }
    }

    /// Default seasonal period for decomposition and seasonal forecasting:
    /// hourly data repeats daily, daily repeats weekly, weekly repeats
    /// monthly, monthly repeats yearly.
    pub fn default_seasonal_period(&self) -> usize {
        match self {
            Interval::Hour => 24,
            Interval::Day => 7,
            Interval::Week => 4,
            Interval::Month => 12,
        }
    }

    /// Canonical tag as the upstream API spells it.
    pub fn name(&self) -> &'static str {
        match self {
            Interval::Hour => "1 hour",
            Interval::Day => "1 day",
            Interval::Week => "1 week",
            Interval::Month => "1 month",
        }
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1 hour" | "hour" | "hourly" | "1h" => Ok(Interval::Hour),
            "1 day" | "day" | "daily" | "1d" => Ok(Interval::Day),
            "1 week" | "week" | "weekly" | "1w" => Ok(Interval::Week),
            "1 month" | "month" | "monthly" | "1m" => Ok(Interval::Month),
            other => Err(format!("unknown interval tag: {}", other)),
        }
    }
}

/// Additive decomposition of a series into trend, seasonal and residual
/// components. All four sequences are parallel and equal-length, and
/// `original[i] = trend[i] + seasonal[i] + residual[i]` holds pointwise.
#[derive(Debug, Clone, Default)]
pub struct TimeSeriesResult {
    pub trend: Vec<TimeSeriesPoint>,
    pub seasonal: Vec<TimeSeriesPoint>,
    pub residual: Vec<TimeSeriesPoint>,
    pub original: Vec<TimeSeriesPoint>,
}

impl TimeSeriesResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.original.is_empty()
    }

    pub fn len(&self) -> usize {
        self.original.len()
    }
}
