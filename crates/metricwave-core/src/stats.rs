//! Shared numeric utilities: moments, gap analysis, univariate regression.

use crate::error::{AnalyticsError, Result};
use crate::series::TimeSeriesPoint;
use statrs::statistics::Statistics;

/// Arithmetic mean; NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().mean()
}

/// Population standard deviation; NaN for an empty slice.
pub fn population_std_dev(values: &[f64]) -> f64 {
    values.iter().population_std_dev()
}

/// Millisecond gaps between successive points. The input is assumed sorted;
/// an input shorter than two points yields no gaps.
pub fn successive_gaps_ms(points: &[TimeSeriesPoint]) -> Vec<i64> {
    points
        .windows(2)
        .map(|w| w[1].millis() - w[0].millis())
        .collect()
}

/// Ordinary least squares fit of `y` against `x`.
#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination; 1.0 when `y` is constant.
    pub r_squared: f64,
    /// Residual standard error, `sqrt(SSE / (n - 2))`; 0 when df <= 0.
    pub std_err: f64,
    pub x_mean: f64,
    /// Sum of squared deviations of `x` around its mean.
    pub sxx: f64,
    pub n: usize,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fit a least-squares line through `(x, y)` pairs.
///
/// Needs at least two points and non-degenerate `x` spread.
pub fn fit_linear(x: &[f64], y: &[f64]) -> Result<LinearFit> {
    if x.len() != y.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: x.len(),
            right: y.len(),
        });
    }
    let n = x.len();
    if n < 2 {
        return Err(AnalyticsError::InsufficientData { needed: 2, got: n });
    }

    let x_mean = mean(x);
    let y_mean = mean(y);

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for (&xi, &yi) in x.iter().zip(y.iter()) {
        sxx += (xi - x_mean) * (xi - x_mean);
        sxy += (xi - x_mean) * (yi - y_mean);
        syy += (yi - y_mean) * (yi - y_mean);
    }

    if sxx.abs() < f64::EPSILON {
        return Err(AnalyticsError::InvalidArgument(
            "regression requires at least two distinct x values".to_string(),
        ));
    }

    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let sse: f64 = x
        .iter()
        .zip(y.iter())
        .map(|(&xi, &yi)| {
            let fitted = intercept + slope * xi;
            (yi - fitted) * (yi - fitted)
        })
        .sum();

    let r_squared = if syy.abs() < f64::EPSILON {
        1.0
    } else {
        1.0 - sse / syy
    };

    let std_err = if n > 2 {
        (sse / (n - 2) as f64).sqrt()
    } else {
        0.0
    };

    Ok(LinearFit {
        slope,
        intercept,
        r_squared,
        std_err,
        x_mean,
        sxx,
        n,
    })
}
