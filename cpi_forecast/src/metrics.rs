//! Metrics for evaluating forecasts and summarising them

use crate::error::{ForecastError, Result};
use statrs::statistics::Statistics;

/// Mean absolute error between forecast and actual values.
///
/// A non-finite forecast value makes the result non-finite, which callers
/// treat as a failed strategy rather than a very good one.
pub fn mean_absolute_error(forecast: &[f64], actual: &[f64]) -> Result<f64> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::InvalidParameter(format!(
            "Forecast length ({}) and actual length ({}) must match and be non-zero",
            forecast.len(),
            actual.len()
        )));
    }

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual)
        .map(|(f, a)| (f - a).abs())
        .collect();

    if errors.iter().any(|e| !e.is_finite()) {
        return Ok(f64::INFINITY);
    }

    Ok(errors.mean())
}

/// Round to `decimals` places, half away from zero
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Percentage change from `from` to `to`
pub fn percent_change(from: f64, to: f64) -> Result<f64> {
    if from == 0.0 {
        return Err(ForecastError::InvalidParameter(
            "Cannot compute percentage change from zero".to_string(),
        ));
    }
    let change = (to - from) / from * 100.0;
    if !change.is_finite() {
        return Err(ForecastError::InvalidParameter(format!(
            "Percentage change from {} to {} is not finite",
            from, to
        )));
    }
    Ok(change)
}
