//! Point forecasts with confidence bands.
//!
//! Four interchangeable models plus holdout-based automatic selection. Each
//! model is a pure function over a slice of history, so auto-selection can
//! score candidates on an explicit train/test split without shared state.

use crate::error::{AnalyticsError, Result};
use crate::metrics::{self, ForecastValidationMetrics};
use crate::series::TimeSeriesPoint;
use crate::stats;
use std::str::FromStr;
use tracing::{debug, warn};

const DAY_MS: f64 = 86_400_000.0;

/// Forecasting model selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastMethod {
    Naive,
    SeasonalNaive,
    MovingAverage,
    LinearRegression,
    Auto,
}

impl ForecastMethod {
    pub fn name(&self) -> &'static str {
        match self {
            ForecastMethod::Naive => "naive",
            ForecastMethod::SeasonalNaive => "seasonal_naive",
            ForecastMethod::MovingAverage => "moving_average",
            ForecastMethod::LinearRegression => "linear_regression",
            ForecastMethod::Auto => "auto",
        }
    }
}

impl FromStr for ForecastMethod {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "naive" => Ok(ForecastMethod::Naive),
            "seasonal_naive" | "seasonal-naive" | "seasonal naive" | "snaive" => {
                Ok(ForecastMethod::SeasonalNaive)
            }
            "moving_average" | "moving-average" | "moving average" | "ma" => {
                Ok(ForecastMethod::MovingAverage)
            }
            "linear_regression" | "linear-regression" | "linear regression" | "linear"
            | "regression" => Ok(ForecastMethod::LinearRegression),
            "auto" => Ok(ForecastMethod::Auto),
            other => Err(AnalyticsError::InvalidArgument(format!(
                "unknown forecast method '{other}'"
            ))),
        }
    }
}

/// Tuning knobs shared by all models.
#[derive(Debug, Clone)]
pub struct ForecastOptions {
    /// Confidence level for the band, e.g. 0.95.
    pub confidence_level: f64,
    /// Trailing window for the moving-average model (floor 2).
    pub window_size: usize,
    /// Season length in points; `None` lets the caller's interval decide.
    pub seasonal_period: Option<usize>,
    /// Re-score the forecast against a held-out history suffix.
    pub validate_with_history: bool,
}

impl Default for ForecastOptions {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            window_size: 7,
            seasonal_period: None,
            validate_with_history: false,
        }
    }
}

/// Per-step interval around the point forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfidenceBand {
    pub upper: Vec<TimeSeriesPoint>,
    pub lower: Vec<TimeSeriesPoint>,
}

/// Fitted parameters of the model that produced a forecast.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParams {
    Naive { last_value: f64 },
    SeasonalNaive { seasonal_period: usize },
    MovingAverage { window_size: usize, window_mean: f64 },
    LinearRegression { slope: f64, intercept: f64, std_err: f64 },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForecastMetadata {
    pub validation: Option<ForecastValidationMetrics>,
    pub model_params: Option<ModelParams>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    pub forecast: Vec<TimeSeriesPoint>,
    pub confidence: ConfidenceBand,
    /// Score in [0, 1]; in-sample unless `validate_with_history` overwrote it.
    pub accuracy: f64,
    pub method: ForecastMethod,
    pub metadata: ForecastMetadata,
}

/// Two-sided normal quantile for the common confidence levels.
pub fn z_value(confidence_level: f64) -> f64 {
    const TABLE: &[(f64, f64)] = &[
        (0.99, 2.576),
        (0.98, 2.326),
        (0.95, 1.96),
        (0.90, 1.645),
        (0.80, 1.282),
    ];
    for &(level, z) in TABLE {
        if (confidence_level - level).abs() < 1e-9 {
            return z;
        }
    }
    1.96
}

/// Coarse t-quantile: the z-value above 30 degrees of freedom, inflated by
/// `sqrt(1 + 10/df)` below. Good enough for band widths; not a lookup table.
pub fn t_value(confidence_level: f64, df: usize) -> f64 {
    let z = z_value(confidence_level);
    if df > 30 {
        z
    } else {
        z * (1.0 + 10.0 / df.max(1) as f64).sqrt()
    }
}

/// Generate a forecast over evenly spaced future slots.
///
/// `step_ms` is the spacing between history points and is reused for the
/// forecast grid. When `validate_with_history` is set and enough history
/// exists, the last `horizon` points are held out, the forecast is
/// regenerated from the remainder, and `accuracy` becomes `1 - min(1, MAPE)`
/// against the holdout.
pub fn generate(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    method: ForecastMethod,
    options: &ForecastOptions,
) -> Result<ForecastResult> {
    let mut result = dispatch(points, horizon, step_ms, method, options)?;

    if options.validate_with_history {
        if points.len() >= horizon + 2 {
            let train = &points[..points.len() - horizon];
            let actual = &points[points.len() - horizon..];
            let refit = dispatch(train, horizon, step_ms, method, options)?;
            let metrics = metrics::calculate_forecast_errors(&refit.forecast, actual)?;
            result.accuracy = if metrics.mape.is_finite() {
                1.0 - metrics.mape.min(1.0)
            } else {
                0.0
            };
            result.metadata.validation = Some(metrics);
        } else {
            result.metadata.warnings.push(format!(
                "history too short to hold out {horizon} points for validation"
            ));
        }
    }

    Ok(result)
}

fn dispatch(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    method: ForecastMethod,
    options: &ForecastOptions,
) -> Result<ForecastResult> {
    let period = options.seasonal_period.unwrap_or(7);
    match method {
        ForecastMethod::Naive => {
            naive_forecast(points, horizon, step_ms, options.confidence_level)
        }
        ForecastMethod::SeasonalNaive => {
            seasonal_naive_forecast(points, horizon, step_ms, period, options.confidence_level)
        }
        ForecastMethod::MovingAverage => moving_average_forecast(
            points,
            horizon,
            step_ms,
            options.window_size,
            options.confidence_level,
        ),
        ForecastMethod::LinearRegression => {
            if points.len() < 5 {
                return Err(AnalyticsError::InsufficientData {
                    needed: 5,
                    got: points.len(),
                });
            }
            linear_regression_forecast(points, horizon, step_ms, options.confidence_level)
        }
        ForecastMethod::Auto => auto_forecast(points, horizon, step_ms, options),
    }
}

/// Last observed value repeated; constant band from the history stddev,
/// lower bound floored at zero.
pub fn naive_forecast(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    confidence_level: f64,
) -> Result<ForecastResult> {
    require_history(points, 2)?;

    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let last = *values.last().unwrap_or(&0.0);
    let sigma = stats::population_std_dev(&values);
    let half = z_value(confidence_level) * sigma;

    let last_ms = points[points.len() - 1].millis();
    let mut forecast = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    for i in 0..horizon {
        let ts = last_ms + step_ms * (i as i64 + 1);
        forecast.push(TimeSeriesPoint::from_millis(ts, last));
        upper.push(TimeSeriesPoint::from_millis(ts, last + half));
        lower.push(TimeSeriesPoint::from_millis(ts, (last - half).max(0.0)));
    }

    // One-step-ahead in-sample accuracy: each value predicted by its
    // predecessor.
    let accuracy = in_sample_accuracy(&values[1..], &values[..values.len() - 1]);

    Ok(ForecastResult {
        forecast,
        confidence: ConfidenceBand { upper, lower },
        accuracy,
        method: ForecastMethod::Naive,
        metadata: ForecastMetadata {
            model_params: Some(ModelParams::Naive { last_value: last }),
            ..ForecastMetadata::default()
        },
    })
}

/// Repeat the value from exactly one season behind each future slot.
///
/// Falls back to the naive model when history is shorter than one full
/// period plus a point; the fallback is recorded as a warning and the
/// result's `method` reports the model actually used.
pub fn seasonal_naive_forecast(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    seasonal_period: usize,
    confidence_level: f64,
) -> Result<ForecastResult> {
    require_history(points, 2)?;
    let period = seasonal_period.max(1);

    if points.len() < period + 1 {
        let mut result = naive_forecast(points, horizon, step_ms, confidence_level)?;
        result.metadata.warnings.push(format!(
            "history of {} points is shorter than seasonal period {period}; using naive",
            points.len()
        ));
        return Ok(result);
    }

    let n = points.len();
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();

    // Stddev of period-over-period differences drives the band width.
    let diffs: Vec<f64> = (period..n).map(|j| values[j] - values[j - period]).collect();
    let sigma = stats::population_std_dev(&diffs);
    let z = z_value(confidence_level);

    let last_ms = points[n - 1].millis();
    let mut forecast = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    for i in 0..horizon {
        let ts = last_ms + step_ms * (i as i64 + 1);
        let value = values[n - period + (i % period)];
        let half = z * sigma * ((i + 1) as f64).sqrt();
        forecast.push(TimeSeriesPoint::from_millis(ts, value));
        upper.push(TimeSeriesPoint::from_millis(ts, value + half));
        lower.push(TimeSeriesPoint::from_millis(ts, value - half));
    }

    let accuracy = in_sample_accuracy(&values[period..], &values[..n - period]);

    Ok(ForecastResult {
        forecast,
        confidence: ConfidenceBand { upper, lower },
        accuracy,
        method: ForecastMethod::SeasonalNaive,
        metadata: ForecastMetadata {
            model_params: Some(ModelParams::SeasonalNaive {
                seasonal_period: period,
            }),
            ..ForecastMetadata::default()
        },
    })
}

/// Flat average of the trailing window, repeated across the horizon.
pub fn moving_average_forecast(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    window_size: usize,
    confidence_level: f64,
) -> Result<ForecastResult> {
    require_history(points, 2)?;

    let n = points.len();
    let window = window_size.max(2).min(n);
    let values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let window_mean = stats::mean(&values[n - window..]);

    // Residual stddev from rolling one-step-ahead errors. Too little history
    // for even one full window leaves no errors; fall back to the overall
    // spread.
    let errors: Vec<f64> = (window..n)
        .map(|j| values[j] - stats::mean(&values[j - window..j]))
        .collect();
    let sigma = if errors.is_empty() {
        stats::population_std_dev(&values)
    } else {
        stats::population_std_dev(&errors)
    };
    let z = z_value(confidence_level);

    let last_ms = points[n - 1].millis();
    let mut forecast = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    for i in 0..horizon {
        let ts = last_ms + step_ms * (i as i64 + 1);
        let half = z * sigma * (1.0 + (i + 1) as f64 / window as f64).sqrt();
        forecast.push(TimeSeriesPoint::from_millis(ts, window_mean));
        upper.push(TimeSeriesPoint::from_millis(ts, window_mean + half));
        lower.push(TimeSeriesPoint::from_millis(ts, window_mean - half));
    }

    let accuracy = if errors.is_empty() {
        0.0
    } else {
        let predicted: Vec<f64> = (window..n)
            .map(|j| stats::mean(&values[j - window..j]))
            .collect();
        in_sample_accuracy(&values[window..], &predicted)
    };

    Ok(ForecastResult {
        forecast,
        confidence: ConfidenceBand { upper, lower },
        accuracy,
        method: ForecastMethod::MovingAverage,
        metadata: ForecastMetadata {
            model_params: Some(ModelParams::MovingAverage {
                window_size: window,
                window_mean,
            }),
            ..ForecastMetadata::default()
        },
    })
}

/// OLS of value against elapsed days, extrapolated per future slot. The band
/// uses the classic prediction interval `stderr * sqrt(1 + 1/n + (x-x̄)²/Sxx)`
/// scaled by the coarse t-quantile.
pub fn linear_regression_forecast(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    confidence_level: f64,
) -> Result<ForecastResult> {
    require_history(points, 2)?;

    let t0 = points[0].millis();
    let xs: Vec<f64> = points
        .iter()
        .map(|p| (p.millis() - t0) as f64 / DAY_MS)
        .collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();
    let fit = stats::fit_linear(&xs, &ys)?;

    let df = points.len().saturating_sub(2);
    let t = t_value(confidence_level, df);

    let last_ms = points[points.len() - 1].millis();
    let mut forecast = Vec::with_capacity(horizon);
    let mut upper = Vec::with_capacity(horizon);
    let mut lower = Vec::with_capacity(horizon);
    for i in 0..horizon {
        let ts = last_ms + step_ms * (i as i64 + 1);
        let x = (ts - t0) as f64 / DAY_MS;
        let value = fit.predict(x);
        let half = t
            * fit.std_err
            * (1.0 + 1.0 / fit.n as f64 + (x - fit.x_mean).powi(2) / fit.sxx).sqrt();
        forecast.push(TimeSeriesPoint::from_millis(ts, value));
        upper.push(TimeSeriesPoint::from_millis(ts, value + half));
        lower.push(TimeSeriesPoint::from_millis(ts, value - half));
    }

    Ok(ForecastResult {
        forecast,
        confidence: ConfidenceBand { upper, lower },
        accuracy: fit.r_squared.clamp(0.0, 1.0),
        method: ForecastMethod::LinearRegression,
        metadata: ForecastMetadata {
            model_params: Some(ModelParams::LinearRegression {
                slope: fit.slope,
                intercept: fit.intercept,
                std_err: fit.std_err,
            }),
            ..ForecastMetadata::default()
        },
    })
}

/// Score every eligible model on a holdout suffix and refit the winner on
/// the full history. Ties and scoring failures fall back to naive, the first
/// model in the enumeration order.
pub fn auto_forecast(
    points: &[TimeSeriesPoint],
    horizon: usize,
    step_ms: i64,
    options: &ForecastOptions,
) -> Result<ForecastResult> {
    require_history(points, 2)?;
    let n = points.len();
    let period = options.seasonal_period.unwrap_or(7).max(1);

    if n < 10 {
        let mut result = naive_forecast(points, horizon, step_ms, options.confidence_level)?;
        result
            .metadata
            .warnings
            .push(format!("{n} points is too few for model comparison; using naive"));
        return Ok(result);
    }

    let holdout = 5.min(n / 5);
    let train = &points[..n - holdout];
    let actual: Vec<f64> = points[n - holdout..].iter().map(|p| p.value).collect();
    let cmp_window = 7.min(train.len() / 3).max(2);

    let mut candidates: Vec<(ForecastMethod, Result<ForecastResult>)> = vec![(
        ForecastMethod::Naive,
        naive_forecast(train, holdout, step_ms, options.confidence_level),
    )];
    if train.len() >= period * 2 {
        candidates.push((
            ForecastMethod::SeasonalNaive,
            seasonal_naive_forecast(train, holdout, step_ms, period, options.confidence_level),
        ));
    }
    candidates.push((
        ForecastMethod::MovingAverage,
        moving_average_forecast(train, holdout, step_ms, cmp_window, options.confidence_level),
    ));
    if train.len() >= 5 {
        candidates.push((
            ForecastMethod::LinearRegression,
            linear_regression_forecast(train, holdout, step_ms, options.confidence_level),
        ));
    }

    let mut best = ForecastMethod::Naive;
    let mut best_score = f64::NEG_INFINITY;
    for (method, outcome) in &candidates {
        let Ok(candidate) = outcome else { continue };
        let predicted: Vec<f64> = candidate.forecast.iter().map(|p| p.value).collect();
        let Ok(mape) = metrics::mape(&actual, &predicted) else {
            continue;
        };
        if !mape.is_finite() {
            continue;
        }
        let score = 1.0 - mape;
        debug!(method = method.name(), score, "scored forecast candidate");
        // Strict comparison keeps the earlier method on ties.
        if score > best_score {
            best_score = score;
            best = *method;
        }
    }
    if best_score == f64::NEG_INFINITY {
        warn!("no forecast candidate could be scored; using naive");
    }
    debug!(method = best.name(), "selected forecast model");

    let refit_options = ForecastOptions {
        window_size: cmp_window,
        validate_with_history: false,
        ..options.clone()
    };
    dispatch(points, horizon, step_ms, best, &refit_options)
}

fn require_history(points: &[TimeSeriesPoint], needed: usize) -> Result<()> {
    if points.len() < needed {
        return Err(AnalyticsError::InsufficientData {
            needed,
            got: points.len(),
        });
    }
    Ok(())
}

fn in_sample_accuracy(actual: &[f64], predicted: &[f64]) -> f64 {
    match metrics::mape(actual, predicted) {
        Ok(m) if m.is_finite() => (1.0 - m.min(1.0)).max(0.0),
        _ => 0.0,
    }
}
