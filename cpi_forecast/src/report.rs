//! The response record returned to clients

use crate::config::PipelineConfig;
use crate::data::{future_months, TimeSeriesData};
use crate::error::{ForecastError, Result};
use crate::metrics::round_to;
use crate::pipeline::FinalForecast;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LABEL_FORMAT: &str = "%Y-%m";
const DATE_FORMAT: &str = "%d/%m/%Y";

/// Observed values for the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

/// Forecast curve for the chart; a month the model did not cover is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedChart {
    pub labels: Vec<String>,
    pub values: Vec<Option<f64>>,
}

/// Everything a client needs to render one forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub last_actual_cpi: f64,
    /// `DD/MM/YYYY`
    pub last_actual_date: String,
    pub predictions_pct_change: BTreeMap<usize, f64>,
    pub predictions_absolute: BTreeMap<usize, f64>,
    pub best_model_name: String,
    pub best_model_mae_validation: f64,
    pub historical_data_for_chart: ChartSeries,
    pub predicted_data_for_chart: PredictedChart,
}

impl ForecastRecord {
    /// Build the record from the series, the winner and its forecasts.
    ///
    /// Rounds every reported number to 2 places. Percent changes arrive
    /// already rounded since they are computed from unrounded forecasts.
    pub fn assemble(
        series: &TimeSeriesData,
        best_model_name: &str,
        best_mae: f64,
        forecast: &FinalForecast,
        config: &PipelineConfig,
    ) -> Result<Self> {
        let (last_date, last_value) = series
            .last()
            .ok_or_else(|| ForecastError::DataError("Cannot report on an empty series".to_string()))?;

        let history = series.tail(config.chart_history_months);
        let historical_data_for_chart = ChartSeries {
            labels: history
                .dates()
                .iter()
                .map(|d| d.format(LABEL_FORMAT).to_string())
                .collect(),
            values: history.values().iter().map(|&v| round_to(v, 2)).collect(),
        };

        let future = future_months(last_date, config.chart_forecast_months)?;
        let predicted_data_for_chart = PredictedChart {
            labels: future
                .iter()
                .map(|d| d.format(LABEL_FORMAT).to_string())
                .collect(),
            values: (0..future.len())
                .map(|i| forecast.curve.get(i).map(|&v| round_to(v, 2)))
                .collect(),
        };

        Ok(Self {
            last_actual_cpi: round_to(last_value, 2),
            last_actual_date: last_date.format(DATE_FORMAT).to_string(),
            predictions_pct_change: forecast.pct_change.clone(),
            predictions_absolute: forecast
                .absolute
                .iter()
                .map(|(&h, &v)| (h, round_to(v, 2)))
                .collect(),
            best_model_name: best_model_name.to_string(),
            best_model_mae_validation: round_to(best_mae, 2),
            historical_data_for_chart,
            predicted_data_for_chart,
        })
    }

    /// Serialize to the JSON body sent to clients
    pub fn to_json(&self) -> Result<serde_json::Value> {
        serde_json::to_value(self)
            .map_err(|e| ForecastError::DataError(format!("Cannot serialize forecast: {}", e)))
    }
}
