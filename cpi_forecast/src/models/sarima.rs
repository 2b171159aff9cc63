//! Seasonal ARIMA with automatic order selection
//!
//! The differencing orders are fixed first (seasonal strength for `D`,
//! repeated KPSS tests for `d`), then a stepwise search walks the
//! neighbourhood of the best model found so far, ranking candidates by AICc.
//! Each candidate is estimated by conditional sum of squares.

use crate::data::{future_months, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use chrono::NaiveDate;
use series_math::differencing::{difference, integrate};
use series_math::optimize::NelderMead;
use series_math::stationarity::{needs_difference, seasonal_strength, SEASONAL_STRENGTH_THRESHOLD};
use series_math::stats::mean;
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

/// Registry name of this strategy
pub const NAME: &str = "SARIMA";

/// Unconstrained parameters are mapped through `tanh`, so this bound keeps
/// every partial autocorrelation within (-0.995, 0.995).
const RAW_PARAM_BOUND: f64 = 3.0;

/// Orders of a seasonal ARIMA(p,d,q)(P,D,Q) model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
}

impl ArimaOrder {
    fn arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    fn with_arma(&self, p: usize, q: usize, seasonal_p: usize, seasonal_q: usize) -> Self {
        Self {
            p,
            q,
            seasonal_p,
            seasonal_q,
            ..*self
        }
    }
}

impl fmt::Display for ArimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ARIMA({},{},{})({},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q
        )
    }
}

/// Seasonal ARIMA strategy with stepwise order search
#[derive(Debug, Clone)]
pub struct AutoArima {
    name: String,
    seasonal_period: usize,
    max_p: usize,
    max_q: usize,
    max_seasonal_p: usize,
    max_seasonal_q: usize,
    max_order: usize,
    max_d: usize,
    max_fits: usize,
}

impl AutoArima {
    /// Create a new auto-ARIMA search for the given seasonal period
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
            max_p: 5,
            max_q: 5,
            max_seasonal_p: 2,
            max_seasonal_q: 2,
            max_order: 5,
            max_d: 2,
            max_fits: 94,
        })
    }

    /// Seasonal differencing order from the strength of the seasonal pattern
    fn seasonal_differences(&self, values: &[f64]) -> Result<usize> {
        if values.len() < 3 * self.seasonal_period {
            return Ok(0);
        }
        let strength = seasonal_strength(values, self.seasonal_period)?;
        Ok(usize::from(strength > SEASONAL_STRENGTH_THRESHOLD))
    }

    fn within_limits(&self, order: &ArimaOrder, seasonal_allowed: bool) -> bool {
        order.p <= self.max_p
            && order.q <= self.max_q
            && order.seasonal_p <= self.max_seasonal_p
            && order.seasonal_q <= self.max_seasonal_q
            && order.arma_params() <= self.max_order
            && (seasonal_allowed || order.seasonal_p + order.seasonal_q == 0)
    }

    fn neighbours(order: &ArimaOrder) -> Vec<ArimaOrder> {
        const STEPS: [(i64, i64, i64, i64); 12] = [
            (0, 0, -1, 0),
            (0, 0, 1, 0),
            (0, 0, 0, -1),
            (0, 0, 0, 1),
            (0, 0, -1, -1),
            (0, 0, 1, 1),
            (-1, 0, 0, 0),
            (1, 0, 0, 0),
            (0, -1, 0, 0),
            (0, 1, 0, 0),
            (-1, -1, 0, 0),
            (1, 1, 0, 0),
        ];

        let shift = |v: usize, delta: i64| usize::try_from(v as i64 + delta).ok();

        STEPS
            .iter()
            .filter_map(|&(dp, dq, dsp, dsq)| {
                Some(order.with_arma(
                    shift(order.p, dp)?,
                    shift(order.q, dq)?,
                    shift(order.seasonal_p, dsp)?,
                    shift(order.seasonal_q, dsq)?,
                ))
            })
            .collect()
    }
}

impl AutoArima {
    /// Fit on `data`, keeping the concrete trained type
    pub fn fit(&self, data: &TimeSeriesData) -> Result<TrainedSarima> {
        let (last_date, _) = data
            .last()
            .ok_or_else(|| ForecastError::model_fit(NAME, "Empty time series data"))?;
        let values = data.values();
        let m = self.seasonal_period;

        let seasonal_d = self.seasonal_differences(values)?;
        let mut stages: Vec<(Vec<f64>, usize)> = Vec::new();
        let mut working = values.to_vec();
        if seasonal_d == 1 {
            let next = difference(&working, m)?;
            stages.push((working, m));
            working = next;
        }

        let mut d = 0;
        while d < self.max_d && working.len() > 3 && needs_difference(&working)? {
            let next = difference(&working, 1)?;
            stages.push((working, 1));
            working = next;
            d += 1;
        }

        let include_constant = d + seasonal_d < 2;
        let seasonal_allowed = working.len() > 2 * m;

        debug!(
            d,
            seasonal_d,
            include_constant,
            seasonal_allowed,
            observations = values.len(),
            "ARIMA differencing orders"
        );

        let base = ArimaOrder {
            p: 0,
            d,
            q: 0,
            seasonal_p: 0,
            seasonal_d,
            seasonal_q: 0,
        };
        let sp = usize::from(seasonal_allowed);
        let starts = [
            base.with_arma(2, 2, sp, sp),
            base.with_arma(0, 0, 0, 0),
            base.with_arma(1, 0, sp, 0),
            base.with_arma(0, 1, 0, sp),
        ];

        let mut visited: HashSet<ArimaOrder> = HashSet::new();
        let mut best: Option<(ArimaOrder, ArmaFit)> = None;
        let mut fits = 0usize;

        let mut attempt = |order: ArimaOrder, best: &mut Option<(ArimaOrder, ArmaFit)>| -> bool {
            if fits >= self.max_fits
                || !self.within_limits(&order, seasonal_allowed)
                || !visited.insert(order)
            {
                return false;
            }
            fits += 1;

            match fit_arma(&working, &order, m, include_constant) {
                Ok(fit) => {
                    debug!(order = %order, aicc = fit.aicc, "ARIMA candidate");
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, current)| fit.aicc < current.aicc);
                    if better {
                        *best = Some((order, fit));
                    }
                    better
                }
                Err(e) => {
                    debug!(order = %order, error = %e, "ARIMA candidate skipped");
                    false
                }
            }
        };

        for order in starts {
            attempt(order, &mut best);
        }

        loop {
            let Some((current, _)) = best.as_ref() else {
                break;
            };
            let current = *current;
            let improved = Self::neighbours(&current)
                .into_iter()
                .any(|candidate| attempt(candidate, &mut best));
            if !improved {
                break;
            }
        }

        let (order, fit) = best.ok_or_else(|| {
            ForecastError::model_fit(NAME, "No ARIMA candidate could be fitted")
        })?;

        debug!(order = %order, aicc = fit.aicc, candidates = visited.len(), "ARIMA order selected");

        Ok(TrainedSarima {
            name: self.name.clone(),
            order,
            fit,
            stages,
            last_date,
        })
    }
}

impl ForecastModel for AutoArima {
    fn train(&self, data: &TimeSeriesData) -> Result<Box<dyn TrainedForecastModel>> {
        Ok(Box::new(self.fit(data)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Estimated ARMA part of a candidate, on the differenced series
#[derive(Debug, Clone)]
struct ArmaFit {
    /// Expanded AR lag coefficients (non-seasonal times seasonal)
    ar: Vec<f64>,
    /// Expanded MA lag coefficients
    ma: Vec<f64>,
    constant: f64,
    /// Differenced series with the constant removed
    centered: Vec<f64>,
    residuals: Vec<f64>,
    aicc: f64,
}

/// Trained seasonal ARIMA model
#[derive(Debug, Clone)]
pub struct TrainedSarima {
    name: String,
    order: ArimaOrder,
    fit: ArmaFit,
    /// Series before each differencing step, with the lag used
    stages: Vec<(Vec<f64>, usize)>,
    last_date: NaiveDate,
}

impl TrainedSarima {
    /// Orders chosen by the search
    pub fn order(&self) -> ArimaOrder {
        self.order
    }

    /// AICc of the chosen model
    pub fn aicc(&self) -> f64 {
        self.fit.aicc
    }
}

impl TrainedForecastModel for TrainedSarima {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let mut x = self.fit.centered.clone();
        let mut e = self.fit.residuals.clone();
        let mut differenced = Vec::with_capacity(horizon);

        for _ in 0..horizon {
            let t = x.len();
            let next = one_step(&x, &e, t, &self.fit.ar, &self.fit.ma);
            x.push(next);
            e.push(0.0);
            differenced.push(next + self.fit.constant);
        }

        let mut values = differenced;
        for (history, lag) in self.stages.iter().rev() {
            values = integrate(&values, history, *lag)?;
        }

        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit(NAME, "Forecast diverged"));
        }

        let dates = future_months(self.last_date, horizon)?;
        ForecastResult::new(values, dates)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Prediction of `x[t]` from the lags before it
fn one_step(x: &[f64], e: &[f64], t: usize, ar: &[f64], ma: &[f64]) -> f64 {
    let ar_part: f64 = ar
        .iter()
        .enumerate()
        .filter_map(|(i, a)| t.checked_sub(i + 1).map(|lag| a * x[lag]))
        .sum();
    let ma_part: f64 = ma
        .iter()
        .enumerate()
        .filter_map(|(j, b)| t.checked_sub(j + 1).map(|lag| b * e[lag]))
        .sum();
    ar_part + ma_part
}

/// Conditional sum of squares, conditioning on the first `ar.len()` values
fn conditional_sse(x: &[f64], ar: &[f64], ma: &[f64]) -> (f64, Vec<f64>) {
    let mut residuals = vec![0.0; x.len()];
    let mut sse = 0.0;
    for t in ar.len()..x.len() {
        let err = x[t] - one_step(x, &residuals, t, ar, ma);
        residuals[t] = err;
        sse += err * err;
    }
    (sse, residuals)
}

/// Map unconstrained values to the coefficients of a stationary AR
/// polynomial via partial autocorrelations (Durbin-Levinson recursion).
fn pacf_to_coefficients(raw: &[f64]) -> Vec<f64> {
    let mut coeffs: Vec<f64> = Vec::with_capacity(raw.len());
    for (k, u) in raw.iter().enumerate() {
        let r = u.tanh();
        let prev = coeffs.clone();
        for j in 0..k {
            coeffs[j] = prev[j] - r * prev[k - 1 - j];
        }
        coeffs.push(r);
    }
    coeffs
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Lag polynomial `1 + sign * Σ c_i B^{(i+1) step}`
fn lag_polynomial(coeffs: &[f64], step: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * step + 1];
    poly[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        poly[(i + 1) * step] = sign * c;
    }
    poly
}

/// Multiply the non-seasonal and seasonal polynomials and return the lag
/// coefficients in the same sign convention as the inputs.
fn expand(nonseasonal: &[f64], seasonal: &[f64], period: usize, sign: f64) -> Vec<f64> {
    let product = poly_mul(
        &lag_polynomial(nonseasonal, 1, sign),
        &lag_polynomial(seasonal, period, sign),
    );
    product[1..].iter().map(|c| sign * c).collect()
}

struct ArmaParams {
    ar: Vec<f64>,
    ma: Vec<f64>,
}

fn unpack(raw: &[f64], order: &ArimaOrder, period: usize) -> ArmaParams {
    let (ar_raw, rest) = raw.split_at(order.p);
    let (sar_raw, rest) = rest.split_at(order.seasonal_p);
    let (ma_raw, sma_raw) = rest.split_at(order.q);

    let negate = |v: Vec<f64>| v.into_iter().map(|c| -c).collect::<Vec<_>>();

    ArmaParams {
        ar: expand(
            &pacf_to_coefficients(ar_raw),
            &pacf_to_coefficients(sar_raw),
            period,
            -1.0,
        ),
        ma: expand(
            &negate(pacf_to_coefficients(ma_raw)),
            &negate(pacf_to_coefficients(sma_raw)),
            period,
            1.0,
        ),
    }
}

fn fit_arma(
    working: &[f64],
    order: &ArimaOrder,
    period: usize,
    include_constant: bool,
) -> Result<ArmaFit> {
    let constant = if include_constant { mean(working)? } else { 0.0 };
    let centered: Vec<f64> = working.iter().map(|v| v - constant).collect();

    let n_arma = order.arma_params();
    let ar_lags = order.p + order.seasonal_p * period;
    let k = n_arma + usize::from(include_constant) + 1;
    let n_eff = centered.len().saturating_sub(ar_lags);
    if n_eff < k + 2 {
        return Err(ForecastError::model_fit(
            NAME,
            format!("{} needs more than {} usable observations", order, n_eff),
        ));
    }

    let raw = if n_arma == 0 {
        Vec::new()
    } else {
        let optimizer = NelderMead::new(vec![-RAW_PARAM_BOUND; n_arma], vec![RAW_PARAM_BOUND; n_arma])?
            .with_max_iter(150 * n_arma)
            .with_tolerance(1e-5);
        let objective = |p: &[f64]| {
            let params = unpack(p, order, period);
            conditional_sse(&centered, &params.ar, &params.ma).0
        };
        optimizer.minimize(objective, &vec![0.0; n_arma])?.point
    };

    let params = unpack(&raw, order, period);
    let (sse, residuals) = conditional_sse(&centered, &params.ar, &params.ma);

    let n = n_eff as f64;
    let k = k as f64;
    let sigma2 = (sse / n).max(1e-300);
    let log_likelihood = -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
    let aic = -2.0 * log_likelihood + 2.0 * k;
    let aicc = aic + 2.0 * k * (k + 1.0) / (n - k - 1.0);

    if !aicc.is_finite() {
        return Err(ForecastError::model_fit(
            NAME,
            format!("{} produced a non-finite information criterion", order),
        ));
    }

    Ok(ArmaFit {
        ar: params.ar,
        ma: params.ma,
        constant,
        centered,
        residuals,
        aicc,
    })
}
