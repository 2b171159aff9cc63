//! API route handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use cpi_forecast::{DataLoader, ForecastError, ForecastPipeline, PipelineConfig};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

/// Application state shared across handlers
#[derive(Debug, Clone)]
pub struct AppState {
    pub data_file: Arc<PathBuf>,
    pub pipeline_config: Arc<PipelineConfig>,
}

impl AppState {
    pub fn new(data_file: PathBuf, pipeline_config: PipelineConfig) -> Self {
        Self {
            data_file: Arc::new(data_file),
            pipeline_config: Arc::new(pipeline_config),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Any failure of a forecast request; always answered with 500
#[derive(Debug)]
pub struct ApiError(String);

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        ApiError(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        error!(error = %self.0, "Prediction request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse { error: self.0 }),
        )
            .into_response()
    }
}

/// Routes served by the application
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/predict", get(predict))
        .with_state(state)
}

/// Load the series, select a model and forecast.
///
/// The pipeline is CPU-bound, so it runs on the blocking thread pool.
pub async fn predict(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let data_file = Arc::clone(&state.data_file);
    let config = PipelineConfig::clone(&state.pipeline_config);

    let body = tokio::task::spawn_blocking(move || -> cpi_forecast::Result<serde_json::Value> {
        let series = DataLoader::from_csv(data_file.as_path())?;
        let pipeline = ForecastPipeline::new(config)?;
        let record = pipeline.run(&series)?;
        info!(
            model = %record.best_model_name,
            mae = record.best_model_mae_validation,
            "Prediction served"
        );
        record.to_json()
    })
    .await
    .map_err(|e| ApiError(format!("Prediction task failed: {}", e)))??;

    Ok(Json(body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tower::ServiceExt;

    fn csv_file(rows: &[(u32, u32, f64)]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "Date,CPI").unwrap();
        for (year, month, value) in rows {
            writeln!(file, "01/{:02}/{},{}", month, year, value).unwrap();
        }
        file
    }

    fn monthly_rows(count: usize) -> Vec<(u32, u32, f64)> {
        (0..count)
            .map(|i| {
                let year = 2020 + (i / 12) as u32;
                let month = (i % 12) as u32 + 1;
                (year, month, 100.0 + 0.1 * i as f64)
            })
            .collect()
    }

    async fn get_predict(file: &NamedTempFile) -> (StatusCode, serde_json::Value) {
        let state = AppState::new(file.path().to_path_buf(), PipelineConfig::default());
        let response = router(state)
            .oneshot(
                Request::builder()
                    .uri("/api/predict")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_too_few_rows_is_500() {
        let file = csv_file(&monthly_rows(10));
        let (status, body) = get_predict(&file).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("Not enough data to make predictions"));
    }

    #[tokio::test]
    async fn test_missing_file_is_500() {
        let state = AppState::new(PathBuf::from("/no/such/data.csv"), PipelineConfig::default());
        let response = router(state)
            .oneshot(Request::builder().uri("/api/predict").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_zero_series_is_500() {
        let rows: Vec<_> = monthly_rows(20)
            .into_iter()
            .map(|(y, m, _)| (y, m, 0.0))
            .collect();
        let file = csv_file(&rows);
        let (status, body) = get_predict(&file).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_linear_series_prediction() {
        let file = csv_file(&monthly_rows(36));
        let (status, body) = get_predict(&file).await;
        assert_eq!(status, StatusCode::OK);

        assert_eq!(body["last_actual_cpi"], 103.5);
        assert_eq!(body["last_actual_date"], "01/12/2022");
        let model = body["best_model_name"].as_str().unwrap();
        assert!(["SARIMA", "Prophet", "ETS"].contains(&model));

        let three = body["predictions_absolute"]["3"].as_f64().unwrap();
        assert!(three > 103.5);
        for h in ["3", "6", "12"] {
            assert!(body["predictions_pct_change"][h].as_f64().unwrap().is_finite());
        }

        let history = body["historical_data_for_chart"]["labels"].as_array().unwrap();
        assert_eq!(history.len(), 24);
        assert_eq!(history[0], "2021-01");

        let predicted = &body["predicted_data_for_chart"];
        assert_eq!(predicted["labels"][0], "2023-01");
        assert_eq!(predicted["labels"][11], "2023-12");
        assert_eq!(predicted["values"].as_array().unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let file = csv_file(&monthly_rows(20));
        let state = AppState::new(file.path().to_path_buf(), PipelineConfig::default());
        let response = router(state)
            .oneshot(Request::builder().uri("/api/other").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
