use chrono::NaiveDate;
use cpi_forecast::data::{add_months, future_months, TimeSeriesData};
use cpi_forecast::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use cpi_forecast::{select_best, ForecastError, ForecastPipeline, PipelineConfig, Result};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Forecasts the last training value plus a fixed offset, or fails
#[derive(Debug)]
struct StubModel {
    name: &'static str,
    offset: f64,
    fail: bool,
    calls: Arc<AtomicUsize>,
}

impl StubModel {
    fn new(name: &'static str, offset: f64) -> Self {
        Self {
            name,
            offset,
            fail: false,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::new(name, 0.0)
        }
    }
}

#[derive(Debug)]
struct TrainedStub {
    name: &'static str,
    level: f64,
    last_date: NaiveDate,
}

impl ForecastModel for StubModel {
    fn train(&self, data: &TimeSeriesData) -> Result<Box<dyn TrainedForecastModel>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ForecastError::model_fit(self.name, "stub failure"));
        }
        let (last_date, last) = data.last().unwrap();
        Ok(Box::new(TrainedStub {
            name: self.name,
            level: last + self.offset,
            last_date,
        }))
    }

    fn name(&self) -> &str {
        self.name
    }
}

impl TrainedForecastModel for TrainedStub {
    fn forecast(&self, horizon: usize) -> Result<ForecastResult> {
        let values = vec![self.level; horizon];
        ForecastResult::new(values, future_months(self.last_date, horizon)?)
    }

    fn name(&self) -> &str {
        self.name
    }
}

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
}

fn linear_series(len: usize) -> TimeSeriesData {
    TimeSeriesData::from_monthly(start(), (0..len).map(|i| 100.0 + 0.1 * i as f64).collect())
        .unwrap()
}

fn stub_pipeline(models: Vec<StubModel>) -> ForecastPipeline {
    let models = models
        .into_iter()
        .map(|m| Box::new(m) as Box<dyn ForecastModel>)
        .collect();
    ForecastPipeline::with_models(PipelineConfig::default(), models).unwrap()
}

#[test]
fn test_evaluate_one_entry_per_model() {
    let pipeline = stub_pipeline(vec![
        StubModel::new("a", 0.0),
        StubModel::failing("b"),
        StubModel::new("c", 1.0),
    ]);
    let evaluations = pipeline.evaluate(&linear_series(20)).unwrap();

    let names: Vec<&str> = evaluations.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["a", "b", "c"]);
    assert!(evaluations[1].mae.is_infinite());
    assert!(evaluations[1].trained.is_none());

    // Last training value is 101.6; hold-out is 101.7, 101.8, 101.9
    assert!((evaluations[0].mae - 0.2).abs() < 1e-9);
    assert!((evaluations[2].mae - 0.8).abs() < 1e-9);
    assert!(evaluations.iter().all(|e| e.mae >= 0.0));
}

#[test]
fn test_tie_goes_to_first_declared() {
    let pipeline = stub_pipeline(vec![
        StubModel::failing("a"),
        StubModel::new("b", 0.5),
        StubModel::new("c", 0.5),
    ]);
    let evaluations = pipeline.evaluate(&linear_series(20)).unwrap();
    assert_eq!(select_best(&evaluations).unwrap().name, "b");

    let record = pipeline.run(&linear_series(20)).unwrap();
    assert_eq!(record.best_model_name, "b");
}

#[test]
fn test_all_models_failing() {
    let pipeline = stub_pipeline(vec![StubModel::failing("a"), StubModel::failing("b")]);
    let err = pipeline.run(&linear_series(20)).unwrap_err();
    assert!(matches!(err, ForecastError::NoViableModel));
    assert_eq!(err.to_string(), "Could not train any model successfully");
}

#[test]
fn test_insufficient_data_invokes_no_model() {
    let model = StubModel::new("a", 0.0);
    let calls = Arc::clone(&model.calls);
    let pipeline = stub_pipeline(vec![model]);

    let err = pipeline.run(&linear_series(14)).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Not enough data to make predictions"));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    assert!(pipeline.run(&linear_series(15)).is_ok());
}

#[test]
fn test_gaps_are_rejected_before_fitting() {
    let mut dates: Vec<NaiveDate> = (0..20).map(|i| add_months(start(), i).unwrap()).collect();
    dates[10] = add_months(start(), 30).unwrap();
    dates.sort();
    let series = TimeSeriesData::new(dates, vec![1.0; 20]).unwrap();

    let pipeline = stub_pipeline(vec![StubModel::new("a", 0.0)]);
    assert!(matches!(pipeline.run(&series), Err(ForecastError::DataError(_))));
}

#[test]
fn test_record_from_stub_winner() {
    let pipeline = stub_pipeline(vec![StubModel::new("flat", 2.0)]);
    let series = linear_series(30);
    let record = pipeline.run(&series).unwrap();

    // Last value 102.9, flat forecast 104.9
    assert_eq!(record.last_actual_cpi, 102.9);
    assert_eq!(record.last_actual_date, "01/06/2023");
    assert_eq!(
        record.predictions_absolute,
        BTreeMap::from([(3, 104.9), (6, 104.9), (12, 104.9)])
    );
    assert_eq!(
        record.predictions_pct_change,
        BTreeMap::from([(3, 1.94), (6, 1.94), (12, 1.94)])
    );
    // Validated from 102.6 against 102.7..=102.9
    assert_eq!(record.best_model_mae_validation, 1.8);

    let history = &record.historical_data_for_chart;
    assert_eq!(history.labels.len(), 24);
    assert_eq!(history.labels.first().unwrap(), "2021-07");
    assert_eq!(history.labels.last().unwrap(), "2023-06");

    let predicted = &record.predicted_data_for_chart;
    assert_eq!(predicted.labels.len(), 12);
    assert_eq!(predicted.labels[0], "2023-07");
    assert_eq!(predicted.labels[11], "2024-06");
    assert!(predicted.values.iter().all(|v| *v == Some(104.9)));
}

#[test]
fn test_short_history_chart_uses_whole_series() {
    let pipeline = stub_pipeline(vec![StubModel::new("flat", 0.0)]);
    let record = pipeline.run(&linear_series(16)).unwrap();
    assert_eq!(record.historical_data_for_chart.labels.len(), 16);
    assert_eq!(record.historical_data_for_chart.labels[0], "2021-01");
}

#[test]
fn test_zero_series_fails_final_forecast() {
    let pipeline = stub_pipeline(vec![StubModel::new("flat", 0.0)]);
    let series = TimeSeriesData::from_monthly(start(), vec![0.0; 20]).unwrap();
    let err = pipeline.run(&series).unwrap_err();
    assert!(err
        .to_string()
        .starts_with("Error making final predictions with flat"));
}

#[test]
fn test_linear_series_end_to_end() {
    let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
    let series = linear_series(36);
    let record = pipeline.run(&series).unwrap();

    assert!(["SARIMA", "Prophet", "ETS"].contains(&record.best_model_name.as_str()));
    assert_eq!(record.last_actual_cpi, 103.5);
    assert!(record.predictions_absolute[&3] > record.last_actual_cpi);
    assert!(record.best_model_mae_validation.is_finite());
    for (h, value) in &record.predictions_absolute {
        assert!(value.is_finite(), "horizon {}", h);
        assert!(record.predictions_pct_change[h].is_finite());
    }
    assert!(record
        .predicted_data_for_chart
        .values
        .iter()
        .all(|v| v.map_or(false, f64::is_finite)));

    let json = record.to_json().unwrap();
    assert!(json["predictions_absolute"]["3"].is_number());
    assert!(json["predictions_pct_change"]["12"].is_number());
}

#[test]
fn test_evaluate_default_registry() {
    let pipeline = ForecastPipeline::new(PipelineConfig::default()).unwrap();
    assert_eq!(pipeline.model_names(), vec!["SARIMA", "Prophet", "ETS"]);

    let evaluations = pipeline.evaluate(&linear_series(20)).unwrap();
    assert_eq!(evaluations.len(), 3);
    for evaluation in &evaluations {
        assert!(evaluation.mae >= 0.0);
    }
}

#[test]
fn test_pipeline_rejects_empty_model_list() {
    let err = ForecastPipeline::with_models(PipelineConfig::default(), Vec::new()).unwrap_err();
    assert!(matches!(err, ForecastError::InvalidParameter(_)));
}
