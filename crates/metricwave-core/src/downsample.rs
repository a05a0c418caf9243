//! Chart-oriented downsampling.
//!
//! All methods keep the exact first and last source points so the rendered
//! window never loses its endpoints.

use crate::error::AnalyticsError;
use crate::series::TimeSeriesPoint;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownsampleMethod {
    /// Largest-Triangle-Three-Buckets; best at preserving spike shape.
    #[default]
    Lttb,
    /// Min and max per bucket; preserves peaks and valleys.
    MinMax,
    /// One mean point per bucket; smooths noise.
    Average,
    /// Keeps points that moved significantly since the last kept point.
    FirstLastSignificant,
}

impl DownsampleMethod {
    pub fn name(&self) -> &'static str {
        match self {
            DownsampleMethod::Lttb => "lttb",
            DownsampleMethod::MinMax => "min-max",
            DownsampleMethod::Average => "average",
            DownsampleMethod::FirstLastSignificant => "first-last-significant",
        }
    }
}

impl FromStr for DownsampleMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lttb" => Ok(DownsampleMethod::Lttb),
            "min-max" | "min_max" | "minmax" => Ok(DownsampleMethod::MinMax),
            "average" | "avg" | "mean" => Ok(DownsampleMethod::Average),
            "first-last-significant" | "first_last_significant" => {
                Ok(DownsampleMethod::FirstLastSignificant)
            }
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown downsample method '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DownsampleOptions {
    pub target_points: usize,
    pub method: DownsampleMethod,
    /// Fraction of the series range below which a move is insignificant.
    pub significance_threshold: f64,
}

impl Default for DownsampleOptions {
    fn default() -> Self {
        Self {
            target_points: 100,
            method: DownsampleMethod::Lttb,
            significance_threshold: 0.1,
        }
    }
}

/// Reduce a series to roughly `target_points` points. A series already at or
/// under the target is returned unchanged.
pub fn downsample(points: &[TimeSeriesPoint], options: &DownsampleOptions) -> Vec<TimeSeriesPoint> {
    let target = options.target_points.max(2);
    if points.len() <= target {
        return points.to_vec();
    }
    match options.method {
        DownsampleMethod::Lttb => lttb(points, target),
        DownsampleMethod::MinMax => min_max(points, target),
        DownsampleMethod::Average => average(points, target),
        DownsampleMethod::FirstLastSignificant => {
            first_last_significant(points, target, options.significance_threshold)
        }
    }
}

/// Largest-Triangle-Three-Buckets. For each interior bucket, keeps the point
/// whose triangle with the previously kept point and the next bucket's
/// centroid has the largest area.
fn lttb(points: &[TimeSeriesPoint], target: usize) -> Vec<TimeSeriesPoint> {
    let n = points.len();
    if target <= 2 {
        return vec![points[0], points[n - 1]];
    }

    let mut out = Vec::with_capacity(target);
    out.push(points[0]);

    let every = (n - 2) as f64 / (target - 2) as f64;
    let mut a = 0usize;

    for i in 0..target - 2 {
        let range_start = (i as f64 * every).floor() as usize + 1;
        let range_end = (((i + 1) as f64 * every).floor() as usize + 1).min(n - 1);

        // Centroid of the following bucket anchors the triangle's far side.
        let next_start = range_end;
        let next_end = (((i + 2) as f64 * every).floor() as usize + 1).min(n - 1);
        let (cx, cy) = if next_start < next_end {
            let bucket = &points[next_start..next_end];
            let cx = bucket.iter().map(|p| p.millis() as f64).sum::<f64>() / bucket.len() as f64;
            let cy = bucket.iter().map(|p| p.value).sum::<f64>() / bucket.len() as f64;
            (cx, cy)
        } else {
            (points[n - 1].millis() as f64, points[n - 1].value)
        };

        let ax = points[a].millis() as f64;
        let ay = points[a].value;

        let mut best_idx = range_start;
        let mut best_area = -1.0f64;
        for (j, p) in points[range_start..range_end].iter().enumerate() {
            let px = p.millis() as f64;
            let py = p.value;
            let area = ((ax - cx) * (py - ay) - (ax - px) * (cy - ay)).abs();
            if area > best_area {
                best_area = area;
                best_idx = range_start + j;
            }
        }

        out.push(points[best_idx]);
        a = best_idx;
    }

    out.push(points[n - 1]);
    out
}

/// Min and max of each interior bucket, chronologically ordered within the
/// pair, bracketed by the exact endpoints.
fn min_max(points: &[TimeSeriesPoint], target: usize) -> Vec<TimeSeriesPoint> {
    let n = points.len();
    let interior = &points[1..n - 1];
    let buckets = ((target.saturating_sub(2)) / 2).max(1);

    let mut out = Vec::with_capacity(buckets * 2 + 2);
    out.push(points[0]);
    for bucket in chunks(interior, buckets) {
        let mut min_idx = 0usize;
        let mut max_idx = 0usize;
        for (j, p) in bucket.iter().enumerate() {
            if p.value < bucket[min_idx].value {
                min_idx = j;
            }
            if p.value > bucket[max_idx].value {
                max_idx = j;
            }
        }
        if min_idx == max_idx {
            out.push(bucket[min_idx]);
        } else if min_idx < max_idx {
            out.push(bucket[min_idx]);
            out.push(bucket[max_idx]);
        } else {
            out.push(bucket[max_idx]);
            out.push(bucket[min_idx]);
        }
    }
    out.push(points[n - 1]);
    out
}

/// One centroid point per interior bucket. The endpoints stay exact, so only
/// interior points are averaged.
fn average(points: &[TimeSeriesPoint], target: usize) -> Vec<TimeSeriesPoint> {
    let n = points.len();
    let interior = &points[1..n - 1];
    let buckets = target.saturating_sub(2).max(1);

    let mut out = Vec::with_capacity(target);
    out.push(points[0]);
    for bucket in chunks(interior, buckets) {
        let ts = bucket.iter().map(|p| p.millis()).sum::<i64>() / bucket.len() as i64;
        let value = bucket.iter().map(|p| p.value).sum::<f64>() / bucket.len() as f64;
        out.push(TimeSeriesPoint::from_millis(ts, value));
    }
    out.push(points[n - 1]);
    out
}

/// Keeps interior points whose value moved at least
/// `threshold * (max - min)` away from the previously kept value, evenly
/// subsampling if more qualify than the budget allows.
fn first_last_significant(
    points: &[TimeSeriesPoint],
    target: usize,
    threshold: f64,
) -> Vec<TimeSeriesPoint> {
    let n = points.len();
    let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
    let max = points
        .iter()
        .map(|p| p.value)
        .fold(f64::NEG_INFINITY, f64::max);
    let cutoff = threshold * (max - min);

    let mut kept: Vec<TimeSeriesPoint> = Vec::new();
    let mut last_significant = points[0].value;
    for p in &points[1..n - 1] {
        if (p.value - last_significant).abs() >= cutoff {
            kept.push(*p);
            last_significant = p.value;
        }
    }

    let budget = target.saturating_sub(2);
    if kept.len() > budget && budget > 0 {
        kept = (0..budget)
            .map(|i| kept[i * kept.len() / budget])
            .collect();
    } else if budget == 0 {
        kept.clear();
    }

    let mut out = Vec::with_capacity(kept.len() + 2);
    out.push(points[0]);
    out.extend(kept);
    out.push(points[n - 1]);
    out
}

/// Split a slice into `count` near-equal contiguous runs, skipping empties.
fn chunks<'a>(
    slice: &'a [TimeSeriesPoint],
    count: usize,
) -> impl Iterator<Item = &'a [TimeSeriesPoint]> {
    let len = slice.len();
    (0..count).filter_map(move |i| {
        let start = i * len / count;
        let end = (i + 1) * len / count;
        if start < end {
            Some(&slice[start..end])
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(n: usize) -> Vec<TimeSeriesPoint> {
        (0..n)
            .map(|i| {
                let v = (i as f64 * 0.1).sin() * 50.0 + 100.0;
                TimeSeriesPoint::from_millis(i as i64 * 60_000, v)
            })
            .collect()
    }

    #[test]
    fn test_noop_when_under_target() {
        let points = series(50);
        let options = DownsampleOptions::default();
        let out = downsample(&points, &options);
        assert_eq!(out.len(), 50);
        assert_eq!(out, points);
    }

    #[test]
    fn test_lttb_exact_length_and_endpoints() {
        let points = series(1000);
        let options = DownsampleOptions {
            target_points: 50,
            ..DownsampleOptions::default()
        };
        let out = downsample(&points, &options);
        assert_eq!(out.len(), 50);
        assert_eq!(out[0], points[0]);
        assert_eq!(out[49], points[999]);
    }

    #[test]
    fn test_lttb_output_is_chronological() {
        let points = series(500);
        let options = DownsampleOptions {
            target_points: 40,
            ..DownsampleOptions::default()
        };
        let out = downsample(&points, &options);
        for w in out.windows(2) {
            assert!(w[0].timestamp < w[1].timestamp);
        }
    }

    #[test]
    fn test_lttb_keeps_spike() {
        let mut points = series(300);
        points[150].value = 10_000.0;
        let options = DownsampleOptions {
            target_points: 30,
            ..DownsampleOptions::default()
        };
        let out = downsample(&points, &options);
        assert!(out.iter().any(|p| p.value == 10_000.0));
    }

    #[test]
    fn test_min_max_preserves_extremes() {
        let mut points = series(400);
        points[200].value = -500.0;
        points[201].value = 700.0;
        let options = DownsampleOptions {
            target_points: 40,
            method: DownsampleMethod::MinMax,
            ..DownsampleOptions::default()
        };
        let out = downsample(&points, &options);
        assert!(out.iter().any(|p| p.value == -500.0));
        assert!(out.iter().any(|p| p.value == 700.0));
        assert_eq!(out[0], points[0]);
        assert_eq!(*out.last().unwrap(), points[399]);
        for w in out.windows(2) {
            assert!(w[0].timestamp <= w[1].timestamp);
        }
    }

    #[test]
    fn test_average_smooths_and_keeps_endpoints() {
        let points: Vec<TimeSeriesPoint> = (0..200)
            .map(|i| TimeSeriesPoint::from_millis(i as i64 * 1000, if i % 2 == 0 { 0.0 } else { 10.0 }))
            .collect();
        let options = DownsampleOptions {
            target_points: 12,
            method: DownsampleMethod::Average,
            ..DownsampleOptions::default()
        };
        let out = downsample(&points, &options);
        assert_eq!(out.len(), 12);
        assert_eq!(out[0], points[0]);
        assert_eq!(out[11], points[199]);
        // Interior buckets average the alternating 0/10 signal.
        for p in &out[1..11] {
            assert!((p.value - 5.0).abs() < 0.6, "value {}", p.value);
        }
    }

    #[test]
    fn test_first_last_significant_drops_flat_runs() {
        let mut values = vec![10.0; 200];
        values[80] = 100.0;
        values[140] = -50.0;
        let points: Vec<TimeSeriesPoint> = values
            .iter()
            .enumerate()
            .map(|(i, &v)| TimeSeriesPoint::from_millis(i as i64 * 1000, v))
            .collect();
        let options = DownsampleOptions {
            target_points: 20,
            method: DownsampleMethod::FirstLastSignificant,
            significance_threshold: 0.1,
        };
        let out = downsample(&points, &options);
        assert!(out.len() <= 20);
        assert!(out.iter().any(|p| p.value == 100.0));
        assert!(out.iter().any(|p| p.value == -50.0));
        assert_eq!(out[0], points[0]);
        assert_eq!(*out.last().unwrap(), points[199]);
    }

    #[test]
    fn test_method_from_str() {
        assert_eq!(
            "min-max".parse::<DownsampleMethod>().unwrap(),
            DownsampleMethod::MinMax
        );
        assert_eq!(
            "first_last_significant".parse::<DownsampleMethod>().unwrap(),
            DownsampleMethod::FirstLastSignificant
        );
        assert!("decimate".parse::<DownsampleMethod>().is_err());
    }
}
