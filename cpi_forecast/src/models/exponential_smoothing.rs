//! Holt-Winters exponential smoothing with damped additive trend and
//! additive seasonality

use crate::data::{add_months, future_months, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use chrono::{Datelike, NaiveDate};
use series_math::optimize::NelderMead;
use series_math::stats::mean;
use tracing::debug;

/// Registry name of this strategy
pub const NAME: &str = "ETS";

/// Smoothing parameters of a fitted model
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingParams {
    /// Level smoothing
    pub alpha: f64,
    /// Trend smoothing
    pub beta: f64,
    /// Seasonal smoothing
    pub gamma: f64,
    /// Trend damping
    pub phi: f64,
}

/// Damped additive Holt-Winters model
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    /// Name of the model
    name: String,
    /// Observations per seasonal cycle
    seasonal_period: usize,
}

/// State after running the smoothing equations over a series
#[derive(Debug, Clone)]
struct SmoothedState {
    level: f64,
    trend: f64,
    seasonal: Vec<f64>,
    sse: f64,
    n: usize,
}

/// Trained exponential smoothing model
#[derive(Debug, Clone)]
pub struct TrainedExponentialSmoothing {
    /// Name of the model
    name: String,
    seasonal_period: usize,
    params: SmoothingParams,
    state: SmoothedState,
    last_date: NaiveDate,
}

impl ExponentialSmoothing {
    /// Create a new exponential smoothing model
    pub fn new(seasonal_period: usize) -> Result<Self> {
        if seasonal_period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "Seasonal period must be at least 2, got {}",
                seasonal_period
            )));
        }

        Ok(Self {
            name: NAME.to_string(),
            seasonal_period,
        })
    }
}

/// Starting level, trend and seasonal terms, as of the last month of the
/// first cycle (index `m - 1`), where smoothing picks up.
fn initialize_state(values: &[f64], m: usize) -> Result<(f64, f64, Vec<f64>)> {
    let first = mean(&values[..m])?;

    // Trend: average per-step change between the first two seasons
    let second = mean(&values[m..2 * m])?;
    let trend = (second - first) / m as f64;

    // The first cycle's mean sits at its midpoint
    let centre = (m as f64 - 1.0) / 2.0;
    let seasonal = values[..m]
        .iter()
        .enumerate()
        .map(|(i, v)| v - (first + (i as f64 - centre) * trend))
        .collect();
    let level = first + centre * trend;

    Ok((level, trend, seasonal))
}

fn smooth(values: &[f64], m: usize, params: &SmoothingParams) -> Result<SmoothedState> {
    let SmoothingParams {
        alpha,
        beta,
        gamma,
        phi,
    } = *params;
    let (mut level, mut trend, mut seasonal) = initialize_state(values, m)?;
    let mut sse = 0.0;

    for (t, &y) in values.iter().enumerate().skip(m) {
        let s_prev = seasonal[t % m];
        let forecast = level + phi * trend + s_prev;
        let error = y - forecast;
        sse += error * error;

        let prev_level = level;
        let prev_trend = trend;

        level = alpha * (y - s_prev) + (1.0 - alpha) * (prev_level + phi * prev_trend);
        trend = beta * (level - prev_level) + (1.0 - beta) * phi * prev_trend;
        seasonal[t % m] = gamma * (y - level) + (1.0 - gamma) * s_prev;
    }

    Ok(SmoothedState {
        level,
        trend,
        seasonal,
        sse,
        n: values.len(),
    })
}

fn optimize_params(values: &[f64], m: usize) -> Result<SmoothingParams> {
    let unpack = |raw: &[f64]| SmoothingParams {
        alpha: raw[0],
        beta: raw[1],
        gamma: raw[2],
        phi: raw[3],
    };

    let optimizer = NelderMead::new(vec![0.001, 0.001, 0.001, 0.8], vec![0.999, 0.5, 0.999, 0.98])?
        .with_max_iter(400)
        .with_tolerance(1e-6);

    let best = optimizer.minimize(
        |raw| {
            smooth(values, m, &unpack(raw))
                .map(|state| state.sse)
                .unwrap_or(f64::MAX)
        },
        &[0.3, 0.05, 0.1, 0.95],
    )?;

    debug!(
        alpha = best.point[0],
        beta = best.point[1],
        gamma = best.point[2],
        phi = best.point[3],
        sse = best.value,
        iterations = best.iterations,
        "Holt-Winters parameters"
    );

    Ok(unpack(&best.point))
}

impl ExponentialSmoothing {
    /// Fit on `data`, keeping the concrete trained type
    pub fn fit(&self, data: &TimeSeriesData) -> Result<TrainedExponentialSmoothing> {
        let m = self.seasonal_period;
        let values = data.values();
        if values.len() < 2 * m {
            return Err(ForecastError::model_fit(
                NAME,
                format!(
                    "Holt-Winters requires at least 2 full seasonal cycles ({} points), got {}",
                    2 * m,
                    values.len()
                ),
            ));
        }
        let (last_date, _) = data
            .last()
            .ok_or_else(|| ForecastError::model_fit(NAME, "Empty time series data"))?;

        let params = optimize_params(values, m)?;
        let state = smooth(values, m, &params)?;
        if !state.sse.is_finite() {
            return Err(ForecastError::model_fit(NAME, "Smoothing diverged"));
        }

        Ok(TrainedExponentialSmoothing {
            name: self.name.clone(),
            seasonal_period: m,
            params,
            state,
            last_date,
        })
    }
}

impl ForecastModel for ExponentialSmoothing {
    fn train(&self, data: &TimeSeriesData) -> Result<Box<dyn TrainedForecastModel>> {
        Ok(Box::new(self.fit(data)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedExponentialSmoothing {
    /// Fitted smoothing parameters
    pub fn params(&self) -> SmoothingParams {
        self.params
    }

    /// Point forecasts for the months from `start` through `end`, inclusive.
    ///
    /// Both dates must fall after the last training month; the forecast is
    /// indexed by calendar month rather than by position.
    pub fn predict_range(&self, start: NaiveDate, end: NaiveDate) -> Result<ForecastResult> {
        let first_step = months_between(self.last_date, start);
        let last_step = months_between(self.last_date, end);
        if first_step < 1 || last_step < first_step {
            return Err(ForecastError::model_fit(
                NAME,
                format!(
                    "Prediction range {}..{} must start after the last observation {}",
                    start, end, self.last_date
                ),
            ));
        }

        let m = self.seasonal_period;
        let SmoothedState {
            level,
            trend,
            ref seasonal,
            n,
            ..
        } = self.state;
        let phi = self.params.phi;

        let values: Vec<f64> = (first_step..=last_step)
            .map(|h| {
                let h = h as usize;
                // phi + phi^2 + ... + phi^h
                let damped = (1..=h).map(|i| phi.powi(i as i32)).sum::<f64>();
                level + damped * trend + seasonal[(n + h - 1) % m]
            })
            .collect();

        let dates = (first_step..=last_step)
            .map(|h| add_months(self.last_date, h as usize))
            .collect::<Result<Vec<_>>>()?;

        ForecastResult::new(values, dates)
    }
}

fn months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (i64::from(to.year()) * 12 + i64::from(to.month0()))
        - (i64::from(from.year()) * 12 + i64::from(from.month0()))
}

impl TrainedForecastModel for TrainedExponentialSmoothing {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        if horizon == 0 {
            return ForecastResult::new(Vec::new(), Vec::new());
        }
        let months = future_months(self.last_date, horizon)?;
        let (start, end) = (months[0], months[horizon - 1]);
        self.predict_range(start, end)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_initial_state() {
        let values: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let (level, trend, seasonal) = initialize_state(&values, 4).unwrap();
        assert_approx_eq!(level, 3.0);
        assert_approx_eq!(trend, 1.0);
        for s in seasonal {
            assert_approx_eq!(s, 0.0);
        }
    }

    #[test]
    fn test_initial_seasonals_exclude_trend() {
        let pattern = [1.0, -1.0, 2.0, -2.0];
        let values: Vec<f64> = (0..8)
            .map(|i| 10.0 + 0.5 * i as f64 + pattern[i % 4])
            .collect();
        let (level, trend, seasonal) = initialize_state(&values, 4).unwrap();
        assert_approx_eq!(level, 11.5);
        assert_approx_eq!(trend, 0.5);
        for (s, p) in seasonal.iter().zip(pattern) {
            assert_approx_eq!(*s, p);
        }
    }

    #[test]
    fn test_smoothing_tracks_trend_with_seasonality() {
        let pattern = [1.0, -1.0, 2.0, -2.0];
        let values: Vec<f64> = (0..16)
            .map(|i| 10.0 + 0.5 * i as f64 + pattern[i % 4])
            .collect();
        let params = SmoothingParams {
            alpha: 0.3,
            beta: 0.1,
            gamma: 0.1,
            phi: 1.0,
        };
        let state = smooth(&values, 4, &params).unwrap();
        assert!(state.sse < 1e-12, "sse {}", state.sse);
        assert_approx_eq!(state.level, 17.5);
        assert_approx_eq!(state.trend, 0.5);
    }

    #[test]
    fn test_smoothing_tracks_pure_seasonal_pattern() {
        let pattern = [1.0, 3.0, 2.0, 0.0];
        let values: Vec<f64> = (0..16).map(|i| 10.0 + pattern[i % 4]).collect();
        let params = SmoothingParams {
            alpha: 0.3,
            beta: 0.1,
            gamma: 0.1,
            phi: 0.9,
        };
        let state = smooth(&values, 4, &params).unwrap();
        assert!(state.sse < 1e-12);
        assert_approx_eq!(state.level, 11.5);
    }

    #[test]
    fn test_months_between() {
        let a = NaiveDate::from_ymd_opt(2022, 11, 1).unwrap();
        let b = NaiveDate::from_ymd_opt(2023, 2, 1).unwrap();
        assert_eq!(months_between(a, b), 3);
        assert_eq!(months_between(b, a), -3);
    }
}
