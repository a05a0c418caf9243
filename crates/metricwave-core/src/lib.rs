//! Core analytics library for metricwave dashboards.
//!
//! This crate provides the Rust implementation of time series
//! preprocessing, decomposition, anomaly detection, correlation,
//! forecasting and downsampling over a pluggable store adapter.

pub mod anomaly;
pub mod cache;
pub mod correlation;
pub mod decompose;
pub mod downsample;
pub mod engine;
pub mod error;
pub mod forecast;
pub mod metrics;
pub mod preprocess;
pub mod series;
pub mod stats;
pub mod store;

// Re-exports for convenience
pub use anomaly::detect_anomalies;
pub use cache::{CacheStats, ComputationCache, DEFAULT_CAPACITY, DEFAULT_TTL};
pub use correlation::calculate_correlation;
pub use decompose::{decompose_series, extract_seasonality, extract_trend};
pub use downsample::{downsample, DownsampleMethod, DownsampleOptions};
pub use engine::{AnalyticsEngine, EngineCacheStats, DEFAULT_TREND_WINDOW};
pub use error::{AnalyticsError, BoxError, Result};
pub use forecast::{
    ConfidenceBand, ForecastMetadata, ForecastMethod, ForecastOptions, ForecastResult, ModelParams,
};
pub use metrics::{calculate_forecast_errors, mae, mape, r2, rmse, ForecastValidationMetrics};
pub use preprocess::{
    preprocess, IssueKind, PreprocessOptions, PreprocessedTimeSeries, SeriesMetadata,
    SeriesValidation, ValidationIssue,
};
pub use series::{Interval, TimeSeriesPoint, TimeSeriesResult};
pub use store::{StaticStore, TimeSeriesStore};
