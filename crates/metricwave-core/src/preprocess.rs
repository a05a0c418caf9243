//! Validation, cleaning and regularization of raw samples.
//!
//! The preprocessor never returns an error: every data-quality problem is
//! reported through `SeriesValidation` so the presentation layer can decide
//! between rejecting and rendering partial results. Callers must check
//! `validation.is_valid` before using `data`.

use crate::series::{Interval, TimeSeriesPoint};
use crate::stats;
use tracing::warn;

/// Tag for a single data-quality finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssueKind {
    EmptyInput,
    MissingValue,
    OutliersDetected,
    OutliersNotRemoved,
    NoValidPoints,
    TimestampsNormalized,
    NormalizationFailed,
    InsufficientData,
}

/// One validation finding, fatal (error) or advisory (warning).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub message: String,
    pub details: Option<String>,
}

impl ValidationIssue {
    fn new(kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    fn with_details(kind: IssueKind, message: impl Into<String>, details: String) -> Self {
        Self {
            kind,
            message: message.into(),
            details: Some(details),
        }
    }
}

/// Validation outcome. `is_valid` holds only when at least two points
/// survived cleaning.
#[derive(Debug, Clone, Default)]
pub struct SeriesValidation {
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

/// Successive-gap statistics over the cleaned series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalStats {
    pub mean_ms: f64,
    pub min_ms: i64,
    pub max_ms: i64,
    /// Gaps are considered regular when their spread stays under 10% of the
    /// mean gap.
    pub is_regular: bool,
}

/// Shape metadata describing what cleaning did to the series.
#[derive(Debug, Clone, Default)]
pub struct SeriesMetadata {
    pub original_length: usize,
    pub processed_length: usize,
    pub has_missing_values: bool,
    pub has_outliers: bool,
    /// None when fewer than two points survived.
    pub time_interval: Option<IntervalStats>,
}

/// A cleaned, timestamp-sorted series plus everything learned about it.
///
/// Once `fill_missing_values` has run the data contains no NaN values and
/// `metadata.processed_length == data.len()`.
#[derive(Debug, Clone, Default)]
pub struct PreprocessedTimeSeries {
    pub data: Vec<TimeSeriesPoint>,
    pub validation: SeriesValidation,
    pub metadata: SeriesMetadata,
}

/// Preprocessing options. Defaults match what the dashboard uses for ad-hoc
/// chart rendering; the decomposer and forecaster turn normalization on.
#[derive(Debug, Clone, Copy)]
pub struct PreprocessOptions {
    pub fill_missing_values: bool,
    pub remove_outliers: bool,
    /// Z-score above which a point counts as an outlier.
    pub outlier_threshold: f64,
    pub normalize_timestamps: bool,
    /// Grid step used when normalizing irregular series.
    pub expected_interval: Interval,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            fill_missing_values: true,
            remove_outliers: false,
            outlier_threshold: 3.0,
            normalize_timestamps: false,
            expected_interval: Interval::Day,
        }
    }
}

/// Validate, clean, fill and regularize raw samples.
pub fn preprocess(raw: &[TimeSeriesPoint], options: &PreprocessOptions) -> PreprocessedTimeSeries {
    let mut validation = SeriesValidation::default();
    let mut metadata = SeriesMetadata {
        original_length: raw.len(),
        ..Default::default()
    };

    if raw.is_empty() {
        validation
            .errors
            .push(ValidationIssue::new(IssueKind::EmptyInput, "input series is empty"));
        return PreprocessedTimeSeries {
            data: vec![],
            validation,
            metadata,
        };
    }

    let mut data = raw.to_vec();
    data.sort_by_key(|p| p.timestamp);

    // Non-finite values are either kept as placeholders (filled in below) or
    // dropped outright.
    let missing = data.iter().filter(|p| !p.value.is_finite()).count();
    if missing > 0 {
        metadata.has_missing_values = true;
        if options.fill_missing_values {
            validation.warnings.push(ValidationIssue::with_details(
                IssueKind::MissingValue,
                "series contains missing values; they will be mean-filled",
                format!("{} of {}", missing, data.len()),
            ));
        } else {
            validation.warnings.push(ValidationIssue::with_details(
                IssueKind::MissingValue,
                "dropped points with missing values",
                format!("{} of {}", missing, data.len()),
            ));
            data.retain(|p| p.value.is_finite());
        }
    }

    if data.is_empty() {
        validation.errors.push(ValidationIssue::new(
            IssueKind::NoValidPoints,
            "no valid points remain after cleaning",
        ));
        metadata.processed_length = 0;
        return PreprocessedTimeSeries {
            data,
            validation,
            metadata,
        };
    }

    detect_outliers(&mut data, options, &mut validation, &mut metadata);

    metadata.time_interval = interval_stats(&data);

    let irregular = metadata
        .time_interval
        .map(|s| !s.is_regular)
        .unwrap_or(false);
    if irregular && options.normalize_timestamps {
        match normalize_onto_grid(&data, options) {
            Some(normalized) => {
                validation.warnings.push(ValidationIssue::with_details(
                    IssueKind::TimestampsNormalized,
                    "irregular timestamps resampled onto a uniform grid",
                    format!("{} -> {} points", data.len(), normalized.len()),
                ));
                data = normalized;
                metadata.time_interval = interval_stats(&data);
            }
            None => {
                warn!(
                    points = data.len(),
                    "normalization produced fewer than 2 points; keeping original data"
                );
                validation.warnings.push(ValidationIssue::new(
                    IssueKind::NormalizationFailed,
                    "normalization produced fewer than 2 points; keeping original data",
                ));
            }
        }
    }

    if metadata.has_missing_values && options.fill_missing_values {
        let finite: Vec<f64> = data
            .iter()
            .map(|p| p.value)
            .filter(|v| v.is_finite())
            .collect();
        if finite.is_empty() {
            validation.errors.push(ValidationIssue::new(
                IssueKind::NoValidPoints,
                "every value is missing; nothing to fill from",
            ));
            metadata.processed_length = data.len();
            return PreprocessedTimeSeries {
                data,
                validation,
                metadata,
            };
        }
        let fill = stats::mean(&finite);
        for p in data.iter_mut() {
            if !p.value.is_finite() {
                p.value = fill;
            }
        }
    }

    metadata.processed_length = data.len();
    validation.is_valid = data.len() >= 2;
    if !validation.is_valid && validation.errors.is_empty() {
        validation.errors.push(ValidationIssue::with_details(
            IssueKind::InsufficientData,
            "fewer than 2 points survived cleaning",
            format!("{}", data.len()),
        ));
    }

    PreprocessedTimeSeries {
        data,
        validation,
        metadata,
    }
}

/// Z-score outlier pass over the finite values. Needs at least 3 points and
/// non-zero spread; removal is skipped when it would leave fewer than 3.
fn detect_outliers(
    data: &mut Vec<TimeSeriesPoint>,
    options: &PreprocessOptions,
    validation: &mut SeriesValidation,
    metadata: &mut SeriesMetadata,
) {
    let finite: Vec<f64> = data
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();
    if finite.len() < 3 {
        return;
    }

    let mean = stats::mean(&finite);
    let std_dev = stats::population_std_dev(&finite);
    if std_dev.abs() < f64::EPSILON {
        return;
    }

    let is_outlier = |v: f64| v.is_finite() && ((v - mean) / std_dev).abs() > options.outlier_threshold;
    let flagged = data.iter().filter(|p| is_outlier(p.value)).count();
    if flagged == 0 {
        return;
    }

    metadata.has_outliers = true;
    validation.warnings.push(ValidationIssue::with_details(
        IssueKind::OutliersDetected,
        "values beyond the z-score threshold detected",
        format!("{} points, threshold {}", flagged, options.outlier_threshold),
    ));

    if options.remove_outliers {
        if data.len() - flagged >= 3 {
            data.retain(|p| !is_outlier(p.value));
        } else {
            validation.warnings.push(ValidationIssue::new(
                IssueKind::OutliersNotRemoved,
                "removing outliers would leave fewer than 3 points; keeping all",
            ));
        }
    }
}

fn interval_stats(data: &[TimeSeriesPoint]) -> Option<IntervalStats> {
    if data.len() < 2 {
        return None;
    }
    let gaps = stats::successive_gaps_ms(data);
    let min_ms = *gaps.iter().min().expect("gaps nonempty for len >= 2");
    let max_ms = *gaps.iter().max().expect("gaps nonempty for len >= 2");
    let mean_ms = gaps.iter().map(|&g| g as f64).sum::<f64>() / gaps.len() as f64;
    let is_regular = mean_ms > 0.0 && (max_ms - min_ms) as f64 / mean_ms < 0.10;
    Some(IntervalStats {
        mean_ms,
        min_ms,
        max_ms,
        is_regular,
    })
}

/// Resample onto a uniform grid at the expected interval. Each grid slot maps
/// to the nearest original point within half an interval; otherwise the
/// previous normalized value is carried forward (when filling is enabled) or
/// the slot is left out. Returns None when fewer than 2 grid points resolve.
fn normalize_onto_grid(
    data: &[TimeSeriesPoint],
    options: &PreprocessOptions,
) -> Option<Vec<TimeSeriesPoint>> {
    let step = options.expected_interval.as_millis();
    let first = data.first()?.millis();
    let last = data.last()?.millis();
    let half = step / 2;

    let mut normalized: Vec<TimeSeriesPoint> = Vec::new();
    let mut grid_ts = first;
    while grid_ts <= last {
        match nearest_within(data, grid_ts, half) {
            Some(value) => normalized.push(TimeSeriesPoint::from_millis(grid_ts, value)),
            None => {
                if options.fill_missing_values {
                    if let Some(prev) = normalized.last() {
                        let carried = prev.value;
                        normalized.push(TimeSeriesPoint::from_millis(grid_ts, carried));
                    }
                }
            }
        }
        grid_ts += step;
    }

    if normalized.len() >= 2 {
        Some(normalized)
    } else {
        None
    }
}

/// Value of the original point nearest to `target_ms`, if within `tolerance`.
fn nearest_within(data: &[TimeSeriesPoint], target_ms: i64, tolerance: i64) -> Option<f64> {
    let idx = data.partition_point(|p| p.millis() < target_ms);
    let mut best: Option<(i64, f64)> = None;
    for candidate in [idx.checked_sub(1), Some(idx)].into_iter().flatten() {
        if let Some(p) = data.get(candidate) {
            let dist = (p.millis() - target_ms).abs();
            if dist <= tolerance && best.map(|(d, _)| dist < d).unwrap_or(true) {
                best = Some((dist, p.value));
            }
        }
    }
    best.map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn daily(values: &[f64]) -> Vec<TimeSeriesPoint> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| TimeSeriesPoint::from_millis(i as i64 * 86_400_000, v))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        let result = preprocess(&[], &PreprocessOptions::default());
        assert!(!result.validation.is_valid);
        assert_eq!(result.validation.errors[0].kind, IssueKind::EmptyInput);
        assert!(result.data.is_empty());
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let mut points = daily(&[1.0, 2.0, 3.0]);
        points.reverse();
        let result = preprocess(&points, &PreprocessOptions::default());
        assert!(result.validation.is_valid);
        let ts: Vec<i64> = result.data.iter().map(|p| p.millis()).collect();
        let mut sorted = ts.clone();
        sorted.sort();
        assert_eq!(ts, sorted);
    }

    #[test]
    fn test_missing_value_filled_with_mean() {
        // Scenario: [10, NaN, 30] fills the middle slot with mean(10, 30).
        let mut points = daily(&[10.0, 0.0, 30.0]);
        points[1].value = f64::NAN;
        let result = preprocess(&points, &PreprocessOptions::default());

        assert!(result.validation.is_valid);
        assert!(result.metadata.has_missing_values);
        assert_relative_eq!(result.data[1].value, 20.0, epsilon = 1e-10);
        assert!(result.data.iter().all(|p| p.value.is_finite()));
    }

    #[test]
    fn test_missing_values_dropped_without_fill() {
        let mut points = daily(&[10.0, 0.0, 30.0]);
        points[1].value = f64::INFINITY;
        let options = PreprocessOptions {
            fill_missing_values: false,
            ..Default::default()
        };
        let result = preprocess(&points, &options);
        assert_eq!(result.data.len(), 2);
        assert!(result.metadata.has_missing_values);
        assert_eq!(result.metadata.processed_length, result.data.len());
    }

    #[test]
    fn test_all_missing_is_no_valid_points() {
        let mut points = daily(&[0.0, 0.0]);
        points[0].value = f64::NAN;
        points[1].value = f64::NAN;
        let result = preprocess(&points, &PreprocessOptions::default());
        assert!(!result.validation.is_valid);
        assert!(result
            .validation
            .errors
            .iter()
            .any(|e| e.kind == IssueKind::NoValidPoints));
    }

    #[test]
    fn test_outliers_flagged_but_kept_by_default() {
        let points = daily(&[10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0, 100.0]);
        let result = preprocess(&points, &PreprocessOptions::default());
        assert!(result.metadata.has_outliers);
        assert_eq!(result.data.len(), 11);
        assert!(result
            .validation
            .warnings
            .iter()
            .any(|w| w.kind == IssueKind::OutliersDetected));
    }

    #[test]
    fn test_outliers_removed_when_requested() {
        let points = daily(&[10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0, 11.0, 9.0, 10.0, 100.0]);
        let options = PreprocessOptions {
            remove_outliers: true,
            ..Default::default()
        };
        let result = preprocess(&points, &options);
        assert_eq!(result.data.len(), 10);
        assert!(result.data.iter().all(|p| p.value < 50.0));
    }

    #[test]
    fn test_outlier_removal_skipped_when_too_few_remain() {
        // Removing the outlier would leave only 2 points.
        let points = daily(&[1.0, 1.0, 1000.0]);
        let options = PreprocessOptions {
            remove_outliers: true,
            outlier_threshold: 1.0,
            ..Default::default()
        };
        let result = preprocess(&points, &options);
        assert_eq!(result.data.len(), 3);
        assert!(result
            .validation
            .warnings
            .iter()
            .any(|w| w.kind == IssueKind::OutliersNotRemoved));
    }

    #[test]
    fn test_regular_interval_detection() {
        let result = preprocess(&daily(&[1.0, 2.0, 3.0, 4.0]), &PreprocessOptions::default());
        let stats = result.metadata.time_interval.unwrap();
        assert!(stats.is_regular);
        assert_relative_eq!(stats.mean_ms, 86_400_000.0, epsilon = 1e-6);
    }

    #[test]
    fn test_irregular_series_normalized_onto_grid() {
        // Days 0, 1, 4, 5: the 3-day hole makes the series irregular.
        let points: Vec<TimeSeriesPoint> = [(0_i64, 10.0), (1, 20.0), (4, 50.0), (5, 60.0)]
            .iter()
            .map(|&(d, v)| TimeSeriesPoint::from_millis(d * 86_400_000, v))
            .collect();
        let options = PreprocessOptions {
            normalize_timestamps: true,
            expected_interval: Interval::Day,
            ..Default::default()
        };
        let result = preprocess(&points, &options);

        assert!(result.validation.is_valid);
        assert_eq!(result.data.len(), 6);
        assert!(result.metadata.time_interval.unwrap().is_regular);
        assert!(result
            .validation
            .warnings
            .iter()
            .any(|w| w.kind == IssueKind::TimestampsNormalized));
        // Days 2 and 3 had no source point; values carried forward from day 1.
        assert_relative_eq!(result.data[2].value, 20.0, epsilon = 1e-10);
        assert_relative_eq!(result.data[3].value, 20.0, epsilon = 1e-10);
    }

    #[test]
    fn test_normalization_leaves_gaps_without_fill() {
        let points: Vec<TimeSeriesPoint> = [(0_i64, 10.0), (1, 20.0), (4, 50.0), (5, 60.0)]
            .iter()
            .map(|&(d, v)| TimeSeriesPoint::from_millis(d * 86_400_000, v))
            .collect();
        let options = PreprocessOptions {
            fill_missing_values: false,
            normalize_timestamps: true,
            expected_interval: Interval::Day,
            ..Default::default()
        };
        let result = preprocess(&points, &options);
        // Grid slots 2 and 3 are dropped instead of carried forward.
        assert_eq!(result.data.len(), 4);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let result = preprocess(&daily(&[42.0]), &PreprocessOptions::default());
        assert!(!result.validation.is_valid);
        assert!(result
            .validation
            .errors
            .iter()
            .any(|e| e.kind == IssueKind::InsufficientData));
    }

    #[test]
    fn test_preprocess_is_idempotent() {
        let mut points = daily(&[5.0, 0.0, 7.0, 9.0, 11.0]);
        points[1].value = f64::NAN;
        let options = PreprocessOptions::default();

        let once = preprocess(&points, &options);
        let twice = preprocess(&once.data, &options);

        assert_eq!(once.data.len(), twice.data.len());
        for (a, b) in once.data.iter().zip(twice.data.iter()) {
            assert_eq!(a.timestamp, b.timestamp);
            assert_relative_eq!(a.value, b.value, epsilon = 1e-12);
        }
    }
}
