//! Classical additive decomposition: moving-average trend, phase-averaged
//! seasonality, residual noise.
//!
//! The method is deliberately transparent: dashboard consumers need an
//! explainable trend/seasonal/noise split, not peak predictive accuracy.

use crate::series::{TimeSeriesPoint, TimeSeriesResult};
use tracing::warn;

/// Centered moving-average trend.
///
/// Windows are clamped at the series boundaries: edge positions average over
/// however many points are available rather than padding with zeros. A
/// series shorter than the window gets its own copy back as the trend.
pub fn extract_trend(points: &[TimeSeriesPoint], window_size: usize) -> Vec<TimeSeriesPoint> {
    let n = points.len();
    let window = window_size.max(1);
    if n < window {
        return points.to_vec();
    }

    let half = window / 2;
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let sum: f64 = points[lo..hi].iter().map(|q| q.value).sum();
            TimeSeriesPoint::new(p.timestamp, sum / (hi - lo) as f64)
        })
        .collect()
}

/// Average the detrended residuals at each phase of `period` and tile the
/// de-meaned pattern across the series.
///
/// Needs at least two full periods of data; shorter series get an all-zero
/// seasonal component.
pub fn extract_seasonality(residual: &[f64], period: usize) -> Vec<f64> {
    let n = residual.len();
    let period = period.max(1);
    if n < period * 2 {
        warn!(
            series_len = n,
            period, "series too short for seasonal extraction; returning zero component"
        );
        return vec![0.0; n];
    }

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, &v) in residual.iter().enumerate() {
        sums[i % period] += v;
        counts[i % period] += 1;
    }

    let mut pattern: Vec<f64> = sums
        .iter()
        .zip(counts.iter())
        .map(|(&s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();

    // De-mean so one period of the pattern sums to zero; the level belongs
    // to the trend component.
    let pattern_mean = pattern.iter().sum::<f64>() / period as f64;
    for v in pattern.iter_mut() {
        *v -= pattern_mean;
    }

    (0..n).map(|i| pattern[i % period]).collect()
}

/// Decompose a cleaned series into trend + seasonal + residual.
pub fn decompose_series(
    points: &[TimeSeriesPoint],
    window_size: usize,
    seasonal_period: usize,
) -> TimeSeriesResult {
    if points.is_empty() {
        return TimeSeriesResult::empty();
    }

    let trend = extract_trend(points, window_size);

    let detrended: Vec<f64> = points
        .iter()
        .zip(trend.iter())
        .map(|(p, t)| p.value - t.value)
        .collect();

    let seasonal_values = extract_seasonality(&detrended, seasonal_period);

    let seasonal: Vec<TimeSeriesPoint> = points
        .iter()
        .zip(seasonal_values.iter())
        .map(|(p, &s)| TimeSeriesPoint::new(p.timestamp, s))
        .collect();

    // Residual absorbs whatever trend and seasonality did not explain, so
    // the additive identity holds exactly.
    let residual: Vec<TimeSeriesPoint> = points
        .iter()
        .zip(trend.iter())
        .zip(seasonal.iter())
        .map(|((p, t), s)| TimeSeriesPoint::new(p.timestamp, p.value - t.value - s.value))
        .collect();

    TimeSeriesResult {
        trend,
        seasonal,
        residual,
        original: points.to_vec(),
    }
}
