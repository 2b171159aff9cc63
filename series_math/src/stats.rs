//! Descriptive statistics over plain `f64` slices

use crate::{MathError, Result};
use statrs::statistics::Statistics;

/// Arithmetic mean of the values
pub fn mean(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty series".to_string(),
        ));
    }

    Ok(data.iter().mean())
}

/// Population variance (divides by `n`)
pub fn population_variance(data: &[f64]) -> Result<f64> {
    if data.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the variance of an empty series".to_string(),
        ));
    }

    Ok(data.iter().population_variance())
}

/// Largest absolute value, or zero for an empty slice
pub fn abs_max(data: &[f64]) -> f64 {
    data.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Centered moving average used for classical decomposition.
///
/// For an even `period` this is the 2x`period` moving average, so the
/// window stays centered. Positions without a full window are `None`.
pub fn centered_moving_average(data: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    if period == 0 {
        return Err(MathError::InvalidInput(
            "Moving average period must be positive".to_string(),
        ));
    }
    if data.len() < period + 1 {
        return Err(MathError::InsufficientData(format!(
            "Centered moving average of period {} needs at least {} points, got {}",
            period,
            period + 1,
            data.len()
        )));
    }

    let n = data.len();
    let half = period / 2;
    let mut result = vec![None; n];

    for (i, slot) in result.iter_mut().enumerate().take(n - half).skip(half) {
        let value = if period % 2 == 0 {
            // Half weights on both ends of a period+1 window
            let inner: f64 = data[i + 1 - half..i + half].iter().sum();
            (0.5 * data[i - half] + inner + 0.5 * data[i + half]) / period as f64
        } else {
            data[i - half..=i + half].iter().sum::<f64>() / period as f64
        };
        *slot = Some(value);
    }

    Ok(result)
}
