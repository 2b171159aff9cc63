//! Unit-root and seasonality tests for choosing differencing orders

use crate::stats::{centered_moving_average, mean, population_variance};
use crate::{MathError, Result};

/// 5% critical value of the KPSS level-stationarity statistic
pub const KPSS_CRITICAL_5PCT: f64 = 0.463;

/// Seasonal strength above which a seasonal difference is taken
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

/// KPSS statistic for the null hypothesis of level stationarity.
///
/// Uses the Bartlett-weighted long-run variance with the short lag
/// truncation `trunc(3 * sqrt(n) / 13)`. A series with no variation is
/// reported as perfectly stationary (statistic 0).
pub fn kpss_level_statistic(data: &[f64]) -> Result<f64> {
    let n = data.len();
    if n < 3 {
        return Err(MathError::InsufficientData(format!(
            "KPSS test needs at least 3 points, got {}",
            n
        )));
    }

    let mu = mean(data)?;
    let residuals: Vec<f64> = data.iter().map(|v| v - mu).collect();
    let n_f = n as f64;

    let mut partial = 0.0;
    let mut eta = 0.0;
    for e in &residuals {
        partial += e;
        eta += partial * partial;
    }
    eta /= n_f * n_f;

    let lags = (3.0 * n_f.sqrt() / 13.0).trunc() as usize;
    let mut long_run = residuals.iter().map(|e| e * e).sum::<f64>() / n_f;
    for lag in 1..=lags.min(n - 1) {
        let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
        let cov: f64 = residuals[lag..]
            .iter()
            .zip(&residuals[..n - lag])
            .map(|(a, b)| a * b)
            .sum();
        long_run += 2.0 * weight * cov / n_f;
    }

    if long_run <= 1e-12 {
        return Ok(0.0);
    }

    Ok(eta / long_run)
}

/// Whether the KPSS test rejects level stationarity at 5%
pub fn needs_difference(data: &[f64]) -> Result<bool> {
    Ok(kpss_level_statistic(data)? > KPSS_CRITICAL_5PCT)
}

/// Strength of seasonality of a classical additive decomposition.
///
/// `max(0, 1 - Var(remainder) / Var(seasonal + remainder))`, computed over
/// the positions where the centered trend is defined. Returns a value in
/// `[0, 1]`; 0 for a series with no detrended variation.
pub fn seasonal_strength(data: &[f64], period: usize) -> Result<f64> {
    if period < 2 {
        return Err(MathError::InvalidInput(
            "Seasonal period must be at least 2".to_string(),
        ));
    }
    if data.len() < 2 * period {
        return Err(MathError::InsufficientData(format!(
            "Seasonal strength needs two full cycles ({} points), got {}",
            2 * period,
            data.len()
        )));
    }

    let trend = centered_moving_average(data, period)?;

    // Average detrended value per seasonal position
    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, t) in trend.iter().enumerate() {
        if let Some(t) = t {
            sums[i % period] += data[i] - t;
            counts[i % period] += 1;
        }
    }
    let mut indices: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let centre = mean(&indices)?;
    for s in indices.iter_mut() {
        *s -= centre;
    }

    let mut detrended = Vec::new();
    let mut remainder = Vec::new();
    for (i, t) in trend.iter().enumerate() {
        if let Some(t) = t {
            let d = data[i] - t;
            detrended.push(d);
            remainder.push(d - indices[i % period]);
        }
    }

    let total = population_variance(&detrended)?;
    if total <= 1e-12 {
        return Ok(0.0);
    }
    let noise = population_variance(&remainder)?;

    Ok((1.0 - noise / total).clamp(0.0, 1.0))
}
