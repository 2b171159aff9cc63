//! Additive trend and seasonality decomposition in the style of Prophet
//!
//! The series is treated as dated points rather than as an evenly spaced
//! sequence. The fitted curve is
//!
//! ```text
//! y(t) = k*t + m + sum_j delta_j * max(t - s_j, 0) + yearly(t)
//! ```
//!
//! where `s_j` are changepoints spread over the first 80% of history and
//! `yearly` is a Fourier series in days. Coefficients are the maximum a
//! posteriori estimate under normal priors on `k`, `m` and the seasonal
//! terms, and a Laplace prior on the changepoint deltas, found by
//! iteratively reweighted ridge regression.

use crate::data::{future_months, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use chrono::NaiveDate;
use series_math::linalg::solve_linear_system;
use series_math::stats::{abs_max, population_variance};
use std::f64::consts::PI;
use tracing::debug;

/// Registry name of this strategy
pub const NAME: &str = "Prophet";

const YEAR_DAYS: f64 = 365.25;
const LAPLACE_EPSILON: f64 = 1e-6;
const SIGMA2_FLOOR: f64 = 1e-4;
const MAX_REWEIGHTS: usize = 100;

/// Trend/seasonality decomposition model
#[derive(Debug, Clone)]
pub struct Decomposition {
    /// Name of the model
    name: String,
    /// Upper bound on the number of trend changepoints
    pub n_changepoints: usize,
    /// Share of history in which changepoints may be placed
    pub changepoint_range: f64,
    /// Scale of the Laplace prior on changepoint deltas
    pub changepoint_prior_scale: f64,
    /// Scale of the normal prior on seasonal coefficients
    pub seasonality_prior_scale: f64,
    /// Scale of the normal prior on growth and offset
    pub trend_prior_scale: f64,
    /// Number of Fourier pairs for the yearly component
    pub yearly_order: usize,
    /// Minimum history, in days, before yearly seasonality is fitted
    pub yearly_min_span_days: i64,
}

impl Default for Decomposition {
    fn default() -> Self {
        Self::new()
    }
}

impl Decomposition {
    /// Create a model with the usual Prophet defaults
    pub fn new() -> Self {
        Self {
            name: NAME.to_string(),
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            trend_prior_scale: 5.0,
            yearly_order: 10,
            yearly_min_span_days: 730,
        }
    }

    /// Changepoint positions, on the scaled time axis
    fn changepoints(&self, t: &[f64]) -> Vec<f64> {
        let hist_size = (t.len() as f64 * self.changepoint_range).floor() as usize;
        let count = self.n_changepoints.min(hist_size.saturating_sub(1));
        if count == 0 {
            return Vec::new();
        }

        // Evenly spaced indexes over the allowed range, dropping the first
        let last = (hist_size - 1) as f64;
        (1..=count)
            .map(|i| {
                let idx = (last * i as f64 / count as f64).round() as usize;
                t[idx]
            })
            .collect()
    }
}

/// Fitted decomposition model
#[derive(Debug, Clone)]
pub struct TrainedDecomposition {
    /// Name of the model
    name: String,
    /// Day number (since 1970-01-01) of the first observation
    start_day: f64,
    /// Days spanned by the training history
    t_scale: f64,
    /// Divisor applied to the observed values
    y_scale: f64,
    changepoints: Vec<f64>,
    yearly_order: usize,
    /// Coefficients in design-matrix column order
    coefficients: Vec<f64>,
    last_date: NaiveDate,
}

fn epoch_day(date: NaiveDate) -> f64 {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN);
    date.signed_duration_since(epoch).num_days() as f64
}

/// One design-matrix row: offset, growth, changepoint hinges, then
/// sin/cos pairs of the yearly series
fn design_row(t: f64, day: f64, changepoints: &[f64], yearly_order: usize) -> Vec<f64> {
    let mut row = Vec::with_capacity(2 + changepoints.len() + 2 * yearly_order);
    row.push(1.0);
    row.push(t);
    row.extend(changepoints.iter().map(|&s| (t - s).max(0.0)));
    for i in 1..=yearly_order {
        let angle = 2.0 * PI * i as f64 * day / YEAR_DAYS;
        row.push(angle.sin());
        row.push(angle.cos());
    }
    row
}

fn residual_sum_of_squares(rows: &[Vec<f64>], y: &[f64], w: &[f64]) -> f64 {
    rows.iter()
        .zip(y)
        .map(|(row, target)| {
            let fitted: f64 = row.iter().zip(w).map(|(x, c)| x * c).sum();
            (target - fitted).powi(2)
        })
        .sum()
}

impl Decomposition {
    /// Fit on `data`, keeping the concrete trained type
    pub fn fit(&self, data: &TimeSeriesData) -> Result<TrainedDecomposition> {
        if data.len() < 2 {
            return Err(ForecastError::model_fit(
                NAME,
                format!("Need at least 2 observations, got {}", data.len()),
            ));
        }
        let (last_date, _) = data
            .last()
            .ok_or_else(|| ForecastError::model_fit(NAME, "Empty time series data"))?;

        let days: Vec<f64> = data.dates().iter().map(|&d| epoch_day(d)).collect();
        let start_day = days[0];
        let t_scale = days[days.len() - 1] - start_day;
        if t_scale <= 0.0 {
            return Err(ForecastError::model_fit(NAME, "History spans no time"));
        }
        let t: Vec<f64> = days.iter().map(|d| (d - start_day) / t_scale).collect();

        let y_scale = match abs_max(data.values()) {
            s if s > 0.0 => s,
            _ => 1.0,
        };
        let y: Vec<f64> = data.values().iter().map(|v| v / y_scale).collect();

        let changepoints = self.changepoints(&t);
        let yearly_order = if t_scale >= self.yearly_min_span_days as f64 {
            self.yearly_order
        } else {
            0
        };

        let rows: Vec<Vec<f64>> = t
            .iter()
            .zip(&days)
            .map(|(&ti, &day)| design_row(ti, day, &changepoints, yearly_order))
            .collect();
        let n_cols = rows[0].len();
        let delta_range = 2..2 + changepoints.len();

        // Gram matrix and right-hand side never change between reweights
        let mut gram = vec![vec![0.0; n_cols]; n_cols];
        let mut rhs = vec![0.0; n_cols];
        for (row, &target) in rows.iter().zip(&y) {
            for i in 0..n_cols {
                rhs[i] += row[i] * target;
                for j in 0..n_cols {
                    gram[i][j] += row[i] * row[j];
                }
            }
        }

        let trend_precision = 1.0 / self.trend_prior_scale.powi(2);
        let seasonal_precision = 1.0 / self.seasonality_prior_scale.powi(2);
        let tau = self.changepoint_prior_scale;

        // First pass treats the deltas as normal with the Laplace scale
        let mut precision: Vec<f64> = (0..n_cols)
            .map(|c| match c {
                0 | 1 => trend_precision,
                c if delta_range.contains(&c) => 1.0 / (tau * tau),
                _ => seasonal_precision,
            })
            .collect();
        let mut sigma2 = population_variance(&y)?.max(SIGMA2_FLOOR);
        let mut coefficients = vec![0.0; n_cols];
        let mut iterations = 0;

        for iteration in 0..MAX_REWEIGHTS {
            iterations = iteration + 1;
            let mut a = gram.clone();
            for (i, row) in a.iter_mut().enumerate() {
                row[i] += sigma2 * precision[i];
            }
            let next = solve_linear_system(a, rhs.clone())
                .map_err(|e| ForecastError::model_fit(NAME, e.to_string()))?;

            let change = next
                .iter()
                .zip(&coefficients)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);
            coefficients = next;

            sigma2 = (residual_sum_of_squares(&rows, &y, &coefficients) / y.len() as f64)
                .max(SIGMA2_FLOOR);
            for c in delta_range.clone() {
                precision[c] = 1.0 / (tau * (coefficients[c].abs() + LAPLACE_EPSILON));
            }

            if change < 1e-9 {
                break;
            }
        }

        if coefficients.iter().any(|c| !c.is_finite()) {
            return Err(ForecastError::model_fit(NAME, "Non-finite coefficients"));
        }

        debug!(
            changepoints = changepoints.len(),
            yearly_order,
            iterations,
            sigma2,
            "Decomposition fitted"
        );

        Ok(TrainedDecomposition {
            name: self.name.clone(),
            start_day,
            t_scale,
            y_scale,
            changepoints,
            yearly_order,
            coefficients,
            last_date,
        })
    }
}

impl ForecastModel for Decomposition {
    fn train(&self, data: &TimeSeriesData) -> Result<Box<dyn TrainedForecastModel>> {
        Ok(Box::new(self.fit(data)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl TrainedDecomposition {
    /// Predicted mean at an arbitrary date
    pub fn predict_at(&self, date: NaiveDate) -> f64 {
        let day = epoch_day(date);
        let t = (day - self.start_day) / self.t_scale;
        let row = design_row(t, day, &self.changepoints, self.yearly_order);
        let scaled: f64 = row.iter().zip(&self.coefficients).map(|(x, c)| x * c).sum();
        scaled * self.y_scale
    }

    /// Fitted trend growth rate, in original units per day
    pub fn growth_per_day(&self) -> f64 {
        self.coefficients[1] * self.y_scale / self.t_scale
    }
}

impl TrainedForecastModel for TrainedDecomposition {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let dates = future_months(self.last_date, horizon)?;
        let values = dates.iter().map(|&d| self.predict_at(d)).collect();
        ForecastResult::new(values, dates)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
