//! Public entry points: decomposition and forecasting over a store adapter.
//!
//! The engine owns the store plus two memoization caches. Everything after
//! the single fetch per call is synchronous in-memory math.

use crate::cache::{CacheStats, ComputationCache};
use crate::decompose::decompose_series;
use crate::error::{AnalyticsError, Result};
use crate::forecast::{self, ForecastMethod, ForecastOptions, ForecastResult};
use crate::preprocess::{preprocess, PreprocessOptions, PreprocessedTimeSeries};
use crate::series::{Interval, TimeSeriesResult};
use crate::store::TimeSeriesStore;
use chrono::{DateTime, Utc};
use tracing::debug;

pub const DEFAULT_TREND_WINDOW: usize = 7;

/// Hit/miss counters for both of the engine's caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineCacheStats {
    pub decompositions: CacheStats,
    pub forecasts: CacheStats,
}

pub struct AnalyticsEngine<S> {
    store: S,
    decompositions: ComputationCache<String, TimeSeriesResult>,
    forecasts: ComputationCache<String, ForecastResult>,
}

impl<S: TimeSeriesStore> AnalyticsEngine<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            decompositions: ComputationCache::default(),
            forecasts: ComputationCache::default(),
        }
    }

    /// Split a series into trend, seasonal and residual components.
    ///
    /// `window_size` is the trend moving-average width; `seasonal_period`
    /// defaults to the interval's natural season (7 for daily, 24 for
    /// hourly, ...). A window with no usable data yields a result with all
    /// four components empty, never an error.
    pub fn decompose(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
        window_size: usize,
        seasonal_period: Option<usize>,
    ) -> Result<TimeSeriesResult> {
        validate_window(series_id, start, end)?;
        let period = seasonal_period.unwrap_or_else(|| interval.default_seasonal_period());

        let key = format!(
            "decompose|{series_id}|{}|{}|{}|{window_size}|{period}",
            start.timestamp_millis(),
            end.timestamp_millis(),
            interval.name(),
        );
        self.decompositions.try_get_or_compute(key, None, || {
            let prepared = self.fetch_prepared(series_id, start, end, interval)?;
            // Decomposition degrades instead of failing: a window with no
            // usable data yields four empty components.
            if !prepared.validation.is_valid || prepared.data.len() < 2 {
                debug!(
                    series_id,
                    points = prepared.data.len(),
                    "window has no usable data; returning empty decomposition"
                );
                return Ok(TimeSeriesResult::empty());
            }
            debug!(
                series_id,
                points = prepared.data.len(),
                period,
                "decomposing series"
            );
            Ok(decompose_series(&prepared.data, window_size, period))
        })
    }

    /// Forecast `horizon` future slots for a series.
    pub fn generate_forecast(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        horizon: usize,
        method: ForecastMethod,
        interval: Interval,
        options: &ForecastOptions,
    ) -> Result<ForecastResult> {
        validate_window(series_id, start, end)?;
        if horizon < 1 {
            return Err(AnalyticsError::InvalidArgument(
                "forecast horizon must be at least 1".into(),
            ));
        }

        let resolved = ForecastOptions {
            seasonal_period: Some(
                options
                    .seasonal_period
                    .unwrap_or_else(|| interval.default_seasonal_period()),
            ),
            ..options.clone()
        };

        let key = format!(
            "forecast|{series_id}|{}|{}|{}|{horizon}|{}|{}|{}|{}|{}",
            start.timestamp_millis(),
            end.timestamp_millis(),
            interval.name(),
            method.name(),
            resolved.confidence_level,
            resolved.window_size,
            resolved.seasonal_period.unwrap_or(0),
            resolved.validate_with_history,
        );
        self.forecasts.try_get_or_compute(key, None, || {
            let prepared = self.fetch_prepared(series_id, start, end, interval)?;
            if !prepared.validation.is_valid || prepared.data.len() < 2 {
                return Err(AnalyticsError::InsufficientData {
                    needed: 2,
                    got: prepared.data.len(),
                });
            }
            debug!(
                series_id,
                points = prepared.data.len(),
                horizon,
                method = method.name(),
                "generating forecast"
            );
            forecast::generate(
                &prepared.data,
                horizon,
                interval.as_millis(),
                method,
                &resolved,
            )
        })
    }

    pub fn cache_stats(&self) -> EngineCacheStats {
        EngineCacheStats {
            decompositions: self.decompositions.stats(),
            forecasts: self.forecasts.stats(),
        }
    }

    /// Drop expired cache entries in both caches.
    pub fn prune_caches(&self) {
        self.decompositions.prune_expired();
        self.forecasts.prune_expired();
    }

    fn fetch_prepared(
        &self,
        series_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        interval: Interval,
    ) -> Result<PreprocessedTimeSeries> {
        let raw = self
            .store
            .get_time_series(series_id, start, end, interval)
            .map_err(|source| AnalyticsError::UpstreamFetch {
                series_id: series_id.to_string(),
                start,
                end,
                source,
            })?;

        Ok(preprocess(
            &raw,
            &PreprocessOptions {
                fill_missing_values: true,
                normalize_timestamps: true,
                expected_interval: interval,
                ..PreprocessOptions::default()
            },
        ))
    }
}

fn validate_window(series_id: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    if series_id.trim().is_empty() {
        return Err(AnalyticsError::InvalidArgument(
            "series id must not be empty".into(),
        ));
    }
    if start > end {
        return Err(AnalyticsError::InvalidArgument(format!(
            "start {start} is after end {end}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::TimeSeriesPoint;
    use crate::store::StaticStore;
    use approx::assert_relative_eq;
    use std::cell::Cell;

    const DAY: i64 = 86_400_000;

    fn daily(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TimeSeriesPoint::from_millis(i as i64 * DAY, v))
            .collect()
    }

    fn window(days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        (
            TimeSeriesPoint::from_millis(0, 0.0).timestamp,
            TimeSeriesPoint::from_millis(days * DAY, 0.0).timestamp,
        )
    }

    /// Counts upstream calls so cache behavior is observable.
    struct CountingStore {
        inner: StaticStore,
        calls: Cell<usize>,
    }

    impl TimeSeriesStore for CountingStore {
        fn get_time_series(
            &self,
            series_id: &str,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
            interval: Interval,
        ) -> std::result::Result<Vec<TimeSeriesPoint>, crate::error::BoxError> {
            self.calls.set(self.calls.get() + 1);
            self.inner.get_time_series(series_id, start, end, interval)
        }
    }

    struct FailingStore;

    impl TimeSeriesStore for FailingStore {
        fn get_time_series(
            &self,
            _series_id: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _interval: Interval,
        ) -> std::result::Result<Vec<TimeSeriesPoint>, crate::error::BoxError> {
            Err("connection refused".into())
        }
    }

    #[test]
    fn test_decompose_conserves_original() {
        let values: Vec<f64> = (0..28)
            .map(|i| 50.0 + 0.3 * i as f64 + [4.0, 1.0, -2.0, 0.0, -3.0, 2.0, -2.0][i % 7])
            .collect();
        let engine = AnalyticsEngine::new(StaticStore::new(daily(&values)));
        let (start, end) = window(30);

        let result = engine
            .decompose("sessions", start, end, Interval::Day, 7, None)
            .unwrap();
        assert_eq!(result.len(), 28);
        for i in 0..result.len() {
            let sum = result.trend[i].value + result.seasonal[i].value + result.residual[i].value;
            assert_relative_eq!(result.original[i].value, sum, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_decompose_rejects_empty_series_id() {
        let engine = AnalyticsEngine::new(StaticStore::default());
        let (start, end) = window(10);
        let err = engine
            .decompose("  ", start, end, Interval::Day, 7, None)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
    }

    #[test]
    fn test_decompose_rejects_inverted_window() {
        let engine = AnalyticsEngine::new(StaticStore::default());
        let (start, end) = window(10);
        let err = engine
            .decompose("sessions", end, start, Interval::Day, 7, None)
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
    }

    #[test]
    fn test_forecast_rejects_zero_horizon() {
        let engine = AnalyticsEngine::new(StaticStore::default());
        let (start, end) = window(10);
        let err = engine
            .generate_forecast(
                "sessions",
                start,
                end,
                0,
                ForecastMethod::Naive,
                Interval::Day,
                &ForecastOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InvalidArgument(_)));
    }

    #[test]
    fn test_decompose_empty_window_returns_empty_result() {
        // Decomposition degrades to empty components rather than erroring
        // when the window holds no data.
        let engine = AnalyticsEngine::new(StaticStore::default());
        let (start, end) = window(10);
        let result = engine
            .decompose("sessions", start, end, Interval::Day, 7, None)
            .unwrap();
        assert!(result.is_empty());
        assert!(result.trend.is_empty());
        assert!(result.seasonal.is_empty());
        assert!(result.residual.is_empty());
    }

    #[test]
    fn test_forecast_empty_window_is_insufficient_data() {
        let engine = AnalyticsEngine::new(StaticStore::default());
        let (start, end) = window(10);
        let err = engine
            .generate_forecast(
                "sessions",
                start,
                end,
                3,
                ForecastMethod::Naive,
                Interval::Day,
                &ForecastOptions::default(),
            )
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::InsufficientData { .. }));
    }

    #[test]
    fn test_fetch_failure_is_wrapped_with_context() {
        let engine = AnalyticsEngine::new(FailingStore);
        let (start, end) = window(10);
        let err = engine
            .decompose("sessions", start, end, Interval::Day, 7, None)
            .unwrap_err();
        match err {
            AnalyticsError::UpstreamFetch { series_id, .. } => {
                assert_eq!(series_id, "sessions");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_naive_forecast_of_constant_series() {
        let engine = AnalyticsEngine::new(StaticStore::new(daily(&[100.0; 14])));
        let (start, end) = window(20);
        let result = engine
            .generate_forecast(
                "sessions",
                start,
                end,
                3,
                ForecastMethod::Naive,
                Interval::Day,
                &ForecastOptions::default(),
            )
            .unwrap();
        assert_eq!(result.forecast.len(), 3);
        for i in 0..3 {
            assert_relative_eq!(result.forecast[i].value, 100.0);
            assert_relative_eq!(result.confidence.upper[i].value, 100.0);
            assert_relative_eq!(result.confidence.lower[i].value, 100.0);
        }
    }

    #[test]
    fn test_repeated_calls_hit_the_cache() {
        let store = CountingStore {
            inner: StaticStore::new(daily(&[10.0; 20])),
            calls: Cell::new(0),
        };
        let engine = AnalyticsEngine::new(store);
        let (start, end) = window(25);

        for _ in 0..3 {
            engine
                .decompose("sessions", start, end, Interval::Day, 7, None)
                .unwrap();
        }
        assert_eq!(engine.store.calls.get(), 1);

        let stats = engine.cache_stats();
        assert_eq!(stats.decompositions.hits, 2);
        assert_eq!(stats.decompositions.misses, 1);
    }

    #[test]
    fn test_different_params_are_cached_separately() {
        let store = CountingStore {
            inner: StaticStore::new(daily(&[10.0; 30])),
            calls: Cell::new(0),
        };
        let engine = AnalyticsEngine::new(store);
        let (start, end) = window(35);

        engine
            .decompose("sessions", start, end, Interval::Day, 7, None)
            .unwrap();
        engine
            .decompose("sessions", start, end, Interval::Day, 14, None)
            .unwrap();
        assert_eq!(engine.store.calls.get(), 2);
    }
}
