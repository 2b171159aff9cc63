//! Pipeline configuration
//!
//! The fixed constants of the forecasting pipeline live here instead of in
//! the strategies, so each model can be exercised with synthetic settings.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};

/// Constants that shape one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Trailing months held out to score each strategy
    #[serde(default = "default_validation_months")]
    pub validation_months: usize,

    /// Months ahead reported as point forecasts
    #[serde(default = "default_horizons")]
    pub horizons: Vec<usize>,

    /// Observations per seasonal cycle
    #[serde(default = "default_seasonal_period")]
    pub seasonal_period: usize,

    /// Months of history returned for charting
    #[serde(default = "default_chart_history_months")]
    pub chart_history_months: usize,

    /// Months of forecast curve returned for charting
    #[serde(default = "default_chart_forecast_months")]
    pub chart_forecast_months: usize,

    /// Training months required on top of the validation window
    #[serde(default = "default_min_training_months")]
    pub min_training_months: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            validation_months: default_validation_months(),
            horizons: default_horizons(),
            seasonal_period: default_seasonal_period(),
            chart_history_months: default_chart_history_months(),
            chart_forecast_months: default_chart_forecast_months(),
            min_training_months: default_min_training_months(),
        }
    }
}

impl PipelineConfig {
    /// Smallest series length the pipeline accepts
    pub fn min_observations(&self) -> usize {
        self.validation_months + self.min_training_months
    }

    /// Furthest point-forecast horizon
    pub fn max_horizon(&self) -> usize {
        self.horizons.iter().copied().max().unwrap_or(0)
    }

    /// Periods the winning model has to forecast to cover both the point
    /// horizons and the chart curve
    pub fn forecast_periods(&self) -> usize {
        self.max_horizon().max(self.chart_forecast_months)
    }

    /// Check that every setting is usable
    pub fn validate(&self) -> Result<()> {
        if self.validation_months == 0 {
            return Err(ForecastError::InvalidParameter(
                "validation_months must be positive".to_string(),
            ));
        }
        if self.horizons.is_empty() || self.horizons.contains(&0) {
            return Err(ForecastError::InvalidParameter(
                "horizons must be a non-empty list of positive month counts".to_string(),
            ));
        }
        if self.seasonal_period < 2 {
            return Err(ForecastError::InvalidParameter(format!(
                "seasonal_period must be at least 2, got {}",
                self.seasonal_period
            )));
        }
        if self.chart_history_months == 0 || self.chart_forecast_months == 0 {
            return Err(ForecastError::InvalidParameter(
                "chart windows must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_validation_months() -> usize {
    3
}
fn default_horizons() -> Vec<usize> {
    vec![3, 6, 12]
}
fn default_seasonal_period() -> usize {
    12
}
fn default_chart_history_months() -> usize {
    24
}
fn default_chart_forecast_months() -> usize {
    12
}
fn default_min_training_months() -> usize {
    12
}
