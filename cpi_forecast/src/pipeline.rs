//! Model selection pipeline: evaluate every strategy on a hold-out window,
//! pick the best, refit it on the full series and forecast

use crate::config::PipelineConfig;
use crate::data::TimeSeriesData;
use crate::error::{ForecastError, Result};
use crate::metrics::{percent_change, round_to};
use crate::models::{default_models, ForecastModel, TrainedForecastModel};
use crate::report::ForecastRecord;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{info, warn};

/// Validation score of one strategy
#[derive(Debug)]
pub struct Evaluation {
    /// Strategy name
    pub name: String,
    /// Mean absolute error on the hold-out window, infinite on failure
    pub mae: f64,
    /// The model fitted on the training part, when fitting succeeded
    pub trained: Option<Box<dyn TrainedForecastModel>>,
}

impl Evaluation {
    /// Whether the strategy produced a usable validation forecast
    pub fn is_viable(&self) -> bool {
        self.mae.is_finite()
    }
}

/// Forecasts of the winning strategy on the full series
#[derive(Debug, Clone, PartialEq)]
pub struct FinalForecast {
    /// Unrounded forecast at each configured horizon
    pub absolute: BTreeMap<usize, f64>,
    /// Percentage change from the last actual value, rounded to 2 places
    pub pct_change: BTreeMap<usize, f64>,
    /// Month-by-month forecast curve for charting
    pub curve: Vec<f64>,
}

/// Ordered set of strategies plus the constants that drive a run
#[derive(Debug)]
pub struct ForecastPipeline {
    config: PipelineConfig,
    models: Vec<Box<dyn ForecastModel>>,
}

impl ForecastPipeline {
    /// Pipeline with the default strategies
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let models = default_models(&config)?;
        Self::with_models(config, models)
    }

    /// Pipeline with a custom, ordered list of strategies
    pub fn with_models(config: PipelineConfig, models: Vec<Box<dyn ForecastModel>>) -> Result<Self> {
        config.validate()?;
        if models.is_empty() {
            return Err(ForecastError::InvalidParameter(
                "At least one forecast model is required".to_string(),
            ));
        }
        Ok(Self { config, models })
    }

    /// Pipeline configuration
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Names of the strategies, in declaration order
    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    /// Reject series the strategies cannot work with
    pub fn check_series(&self, series: &TimeSeriesData) -> Result<()> {
        let required = self.config.min_observations();
        if series.len() < required {
            return Err(ForecastError::InsufficientData {
                required,
                actual: series.len(),
            });
        }
        series.ensure_monthly()
    }

    /// Fit each strategy on all but the hold-out window and score its
    /// forecast of that window.
    ///
    /// One entry per strategy, in declaration order. A strategy that fails
    /// anywhere scores an infinite error and the others still run.
    pub fn evaluate(&self, series: &TimeSeriesData) -> Result<Vec<Evaluation>> {
        let split = series.split_holdout(self.config.validation_months)?;
        let actual = split.validation.values();

        let evaluations = self
            .models
            .iter()
            .map(|model| {
                let started = Instant::now();
                let outcome = model.train(&split.train).and_then(|trained| {
                    let forecast = trained.forecast(actual.len())?;
                    let mae = forecast.mean_absolute_error(actual)?;
                    Ok((trained, mae))
                });
                let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

                match outcome {
                    Ok((trained, mae)) => {
                        info!(model = model.name(), mae, elapsed_ms, "Validated model");
                        Evaluation {
                            name: model.name().to_string(),
                            mae,
                            trained: Some(trained),
                        }
                    }
                    Err(e) => {
                        warn!(model = model.name(), error = %e, elapsed_ms, "Model failed validation");
                        Evaluation {
                            name: model.name().to_string(),
                            mae: f64::INFINITY,
                            trained: None,
                        }
                    }
                }
            })
            .collect();

        Ok(evaluations)
    }

    /// Refit the named strategy on the full series and forecast every
    /// horizon plus the chart curve from a single forecast call
    pub fn final_forecast(&self, model_name: &str, series: &TimeSeriesData) -> Result<FinalForecast> {
        let fail = |reason: String| ForecastError::FinalForecast {
            model: model_name.to_string(),
            reason,
        };

        let model = self
            .models
            .iter()
            .find(|m| m.name() == model_name)
            .ok_or_else(|| fail("model is not registered".to_string()))?;
        let (_, last_actual) = series
            .last()
            .ok_or_else(|| fail("series is empty".to_string()))?;

        let forecast = model
            .train(series)
            .and_then(|trained| trained.forecast(self.config.forecast_periods()))
            .map_err(|e| fail(e.to_string()))?;
        let values = forecast.values();

        if let Some(bad) = values.iter().position(|v| !v.is_finite()) {
            return Err(fail(format!("forecast {} months ahead is not finite", bad + 1)));
        }

        let mut absolute = BTreeMap::new();
        let mut pct_change = BTreeMap::new();
        for &h in &self.config.horizons {
            let value = *values
                .get(h - 1)
                .ok_or_else(|| fail(format!("no forecast for horizon {}", h)))?;
            let change = percent_change(last_actual, value).map_err(|e| fail(e.to_string()))?;
            absolute.insert(h, value);
            pct_change.insert(h, round_to(change, 2));
        }

        let curve = values
            .iter()
            .take(self.config.chart_forecast_months)
            .copied()
            .collect();

        Ok(FinalForecast {
            absolute,
            pct_change,
            curve,
        })
    }

    /// Run the whole pipeline on a loaded series
    pub fn run(&self, series: &TimeSeriesData) -> Result<ForecastRecord> {
        self.check_series(series)?;
        info!(
            observations = series.len(),
            models = self.models.len(),
            "Starting forecast pipeline"
        );

        let evaluations = self.evaluate(series)?;
        let best = select_best(&evaluations)?;
        info!(model = %best.name, mae = best.mae, "Selected best model");

        let forecast = self.final_forecast(&best.name, series)?;
        let record = ForecastRecord::assemble(series, &best.name, best.mae, &forecast, &self.config)?;

        info!(model = %record.best_model_name, "Forecast pipeline finished");
        Ok(record)
    }
}

/// The evaluation with the strictly lowest finite error.
///
/// Ties keep the earliest entry, so declaration order breaks them.
pub fn select_best(evaluations: &[Evaluation]) -> Result<&Evaluation> {
    let mut best: Option<&Evaluation> = None;
    for evaluation in evaluations.iter().filter(|e| e.is_viable()) {
        match best {
            Some(current) if evaluation.mae >= current.mae => {}
            _ => best = Some(evaluation),
        }
    }
    best.ok_or(ForecastError::NoViableModel)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluation(name: &str, mae: f64) -> Evaluation {
        Evaluation {
            name: name.to_string(),
            mae,
            trained: None,
        }
    }

    #[test]
    fn test_select_best_prefers_lowest() {
        let evals = vec![evaluation("a", 2.0), evaluation("b", 0.5), evaluation("c", 1.0)];
        assert_eq!(select_best(&evals).unwrap().name, "b");
    }

    #[test]
    fn test_select_best_tie_keeps_first() {
        let evals = vec![
            evaluation("a", f64::INFINITY),
            evaluation("b", 1.0),
            evaluation("c", 1.0),
        ];
        assert_eq!(select_best(&evals).unwrap().name, "b");
    }

    #[test]
    fn test_select_best_all_failed() {
        let evals = vec![evaluation("a", f64::INFINITY), evaluation("b", f64::INFINITY)];
        assert!(matches!(select_best(&evals), Err(ForecastError::NoViableModel)));
    }
}
