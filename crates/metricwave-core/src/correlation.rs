//! Pearson correlation between two metric series.

use crate::error::{AnalyticsError, Result};
use crate::series::TimeSeriesPoint;
use crate::stats;

const ALIGN_TOLERANCE_MS: i64 = 86_400_000; // 1 day

/// Pearson correlation coefficient between two series.
///
/// In the default positional mode both series must have equal length; with
/// `align_timestamps` points are paired by identical timestamp first, then
/// by the nearest timestamp within one day, and at least two pairs must
/// resolve.
///
/// Two constant series correlate perfectly (1.0); a constant series against
/// a varying one yields 0.0. Both conventions avoid a zero-variance division
/// while keeping a defined semantic for flat campaign metrics.
pub fn calculate_correlation(
    series_a: &[TimeSeriesPoint],
    series_b: &[TimeSeriesPoint],
    align_timestamps: bool,
) -> Result<f64> {
    let (a, b) = if align_timestamps {
        align_pairs(series_a, series_b)?
    } else {
        if series_a.len() != series_b.len() {
            return Err(AnalyticsError::LengthMismatch {
                left: series_a.len(),
                right: series_b.len(),
            });
        }
        if series_a.len() < 2 {
            return Err(AnalyticsError::InsufficientData {
                needed: 2,
                got: series_a.len(),
            });
        }
        (
            series_a.iter().map(|p| p.value).collect(),
            series_b.iter().map(|p| p.value).collect(),
        )
    };

    Ok(pearson(&a, &b))
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let mean_a = stats::mean(a);
    let mean_b = stats::mean(b);

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (&x, &y) in a.iter().zip(b.iter()) {
        cov += (x - mean_a) * (y - mean_b);
        var_a += (x - mean_a) * (x - mean_a);
        var_b += (y - mean_b) * (y - mean_b);
    }

    let a_constant = var_a.abs() < f64::EPSILON;
    let b_constant = var_b.abs() < f64::EPSILON;
    if a_constant && b_constant {
        return 1.0;
    }
    if a_constant || b_constant {
        return 0.0;
    }

    (cov / (var_a.sqrt() * var_b.sqrt())).clamp(-1.0, 1.0)
}

/// Pair points across series: exact timestamp matches first, then nearest
/// within the one-day tolerance.
fn align_pairs(
    series_a: &[TimeSeriesPoint],
    series_b: &[TimeSeriesPoint],
) -> Result<(Vec<f64>, Vec<f64>)> {
    let mut b_sorted = series_b.to_vec();
    b_sorted.sort_by_key(|p| p.timestamp);

    let mut a_vals = Vec::new();
    let mut b_vals = Vec::new();

    for p in series_a {
        let target = p.millis();
        let idx = b_sorted.partition_point(|q| q.millis() < target);

        // Exact match wins; otherwise the closer of the two neighbors, if it
        // falls within tolerance.
        let mut best: Option<(i64, f64)> = None;
        for candidate in [idx.checked_sub(1), Some(idx)].into_iter().flatten() {
            if let Some(q) = b_sorted.get(candidate) {
                let dist = (q.millis() - target).abs();
                if dist <= ALIGN_TOLERANCE_MS && best.map(|(d, _)| dist < d).unwrap_or(true) {
                    best = Some((dist, q.value));
                }
            }
        }
        if let Some((_, value)) = best {
            a_vals.push(p.value);
            b_vals.push(value);
        }
    }

    if a_vals.len() < 2 {
        return Err(AnalyticsError::InsufficientMatches {
            needed: 2,
            got: a_vals.len(),
        });
    }
    Ok((a_vals, b_vals))
}
