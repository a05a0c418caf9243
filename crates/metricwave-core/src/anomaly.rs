//! Z-score anomaly detection.

use crate::series::TimeSeriesPoint;
use crate::stats;

/// Flag points whose z-score exceeds `threshold`.
///
/// Global mode (no `lookback_window`) scores every point against the moments
/// of the whole series. Windowed mode recomputes mean and standard deviation
/// over the trailing `lookback_window` points preceding each candidate and
/// skips windows with zero variance.
///
/// Degenerate input (fewer than 3 points, or no spread) yields no anomalies;
/// this function never fails.
pub fn detect_anomalies(
    points: &[TimeSeriesPoint],
    threshold: f64,
    lookback_window: Option<usize>,
) -> Vec<TimeSeriesPoint> {
    if points.len() < 3 {
        return vec![];
    }

    match lookback_window {
        None => detect_global(points, threshold),
        Some(window) => detect_windowed(points, threshold, window),
    }
}

fn detect_global(points: &[TimeSeriesPoint], threshold: f64) -> Vec<TimeSeriesPoint> {
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let mean = stats::mean(&values);
    let std_dev = stats::population_std_dev(&values);
    if !std_dev.is_finite() || std_dev.abs() < f64::EPSILON {
        return vec![];
    }

    points
        .iter()
        .filter(|p| ((p.value - mean) / std_dev).abs() > threshold)
        .copied()
        .collect()
}

fn detect_windowed(
    points: &[TimeSeriesPoint],
    threshold: f64,
    window: usize,
) -> Vec<TimeSeriesPoint> {
    let window = window.max(3);
    let mut anomalies = Vec::new();

    for i in window..points.len() {
        let trailing: Vec<f64> = points[i - window..i].iter().map(|p| p.value).collect();
        let mean = stats::mean(&trailing);
        let std_dev = stats::population_std_dev(&trailing);
        if !std_dev.is_finite() || std_dev.abs() < f64::EPSILON {
            continue;
        }
        if ((points[i].value - mean) / std_dev).abs() > threshold {
            anomalies.push(points[i]);
        }
    }

    anomalies
}
