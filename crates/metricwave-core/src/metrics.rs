//! Forecast accuracy metrics.
//!
//! MAPE is reported as a fraction (0.10 = 10% error) because the forecaster
//! scores candidate models with `1 - MAPE`.

use crate::error::{AnalyticsError, Result};
use crate::series::TimeSeriesPoint;

/// Accuracy metrics computed against a holdout suffix of the history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastValidationMetrics {
    pub mape: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

/// Mean Absolute Percentage Error as a fraction.
///
/// Points where the actual value is exactly zero are skipped; a series of
/// all zeros yields NaN.
pub fn mape(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let mut sum = 0.0;
    let mut count = 0usize;
    for (&a, &f) in actual.iter().zip(forecast.iter()) {
        if a != 0.0 {
            sum += ((a - f) / a).abs();
            count += 1;
        }
    }
    if count == 0 {
        return Ok(f64::NAN);
    }
    Ok(sum / count as f64)
}

/// Mean Absolute Error.
pub fn mae(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root Mean Squared Error.
pub fn rmse(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;
    let sum: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    Ok((sum / actual.len() as f64).sqrt())
}

/// R-squared, `1 - SSE/SST`. Defined as 1.0 when the actual values are
/// constant (a forecast cannot explain variance that does not exist).
pub fn r2(actual: &[f64], forecast: &[f64]) -> Result<f64> {
    validate_inputs(actual, forecast)?;

    let mean: f64 = actual.iter().sum::<f64>() / actual.len() as f64;
    let ss_res: f64 = actual
        .iter()
        .zip(forecast.iter())
        .map(|(a, f)| (a - f).powi(2))
        .sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean).powi(2)).sum();

    if ss_tot.abs() < f64::EPSILON {
        return Ok(1.0);
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Compute all holdout metrics for a forecast against observed points.
///
/// Both sequences are sorted by timestamp and truncated to the shorter
/// length before comparison, so a forecast that overshoots the available
/// actuals is scored only on the overlap.
pub fn calculate_forecast_errors(
    forecast: &[TimeSeriesPoint],
    actual: &[TimeSeriesPoint],
) -> Result<ForecastValidationMetrics> {
    let mut forecast = forecast.to_vec();
    let mut actual = actual.to_vec();
    forecast.sort_by_key(|p| p.timestamp);
    actual.sort_by_key(|p| p.timestamp);

    let n = forecast.len().min(actual.len());
    if n == 0 {
        return Err(AnalyticsError::InsufficientData { needed: 1, got: 0 });
    }

    let f: Vec<f64> = forecast[..n].iter().map(|p| p.value).collect();
    let a: Vec<f64> = actual[..n].iter().map(|p| p.value).collect();

    Ok(ForecastValidationMetrics {
        mape: mape(&a, &f)?,
        rmse: rmse(&a, &f)?,
        mae: mae(&a, &f)?,
        r2: r2(&a, &f)?,
    })
}

fn validate_inputs(actual: &[f64], forecast: &[f64]) -> Result<()> {
    if actual.len() != forecast.len() {
        return Err(AnalyticsError::LengthMismatch {
            left: actual.len(),
            right: forecast.len(),
        });
    }
    if actual.is_empty() {
        return Err(AnalyticsError::InsufficientData { needed: 1, got: 0 });
    }
    Ok(())
}
