//! Forecasting strategies for monthly time series

use crate::config::PipelineConfig;
use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::metrics;
use chrono::NaiveDate;
use std::fmt::Debug;

/// Forecast result containing predicted values
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastResult {
    /// Forecasted values
    pub(crate) values: Vec<f64>,
    /// Month each value belongs to
    pub(crate) dates: Vec<NaiveDate>,
    /// Number of periods forecasted
    horizons: usize,
}

impl ForecastResult {
    /// Create a new forecast result
    pub fn new(values: Vec<f64>, dates: Vec<NaiveDate>) -> Result<Self> {
        if values.len() != dates.len() {
            return Err(ForecastError::InvalidParameter(format!(
                "Values length ({}) doesn't match dates length ({})",
                values.len(),
                dates.len()
            )));
        }

        Ok(Self {
            horizons: values.len(),
            values,
            dates,
        })
    }

    /// Get the forecasted values
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Get the forecast dates
    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    /// Get the number of periods forecasted
    pub fn horizons(&self) -> usize {
        self.horizons
    }

    /// Calculate mean absolute error between forecast and actual values
    pub fn mean_absolute_error(&self, actual: &[f64]) -> Result<f64> {
        metrics::mean_absolute_error(&self.values, actual)
    }
}

/// Trained forecast model
pub trait TrainedForecastModel: Debug + Send {
    /// Generate forecast for the `horizon` months after the training data
    fn forecast(&self, horizon: usize) -> Result<ForecastResult>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be trained on time series data
pub trait ForecastModel: Debug + Send + Sync {
    /// Train the model on time series data
    fn train(&self, data: &TimeSeriesData) -> Result<Box<dyn TrainedForecastModel>>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// The candidate strategies in declaration order.
///
/// Order matters: when two strategies tie on validation error the one
/// listed first wins.
pub fn default_models(config: &PipelineConfig) -> Result<Vec<Box<dyn ForecastModel>>> {
    let period = config.seasonal_period;
    Ok(vec![
        Box::new(sarima::AutoArima::new(period)?),
        Box::new(decomposition::Decomposition::new()),
        Box::new(exponential_smoothing::ExponentialSmoothing::new(period)?),
    ])
}

pub mod decomposition;
pub mod exponential_smoothing;
pub mod sarima;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_order() {
        let models = default_models(&PipelineConfig::default()).unwrap();
        let names: Vec<&str> = models.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["SARIMA", "Prophet", "ETS"]);
    }

    #[test]
    fn test_forecast_result_length_mismatch() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(ForecastResult::new(vec![1.0, 2.0], vec![date]).is_err());
        let empty = ForecastResult::new(vec![], vec![]).unwrap();
        assert_eq!(empty.horizons(), 0);
    }
}
