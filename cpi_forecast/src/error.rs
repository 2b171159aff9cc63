//! Error types for the cpi_forecast crate

use series_math::MathError;
use thiserror::Error;

/// Custom error types for the cpi_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// The source could not be read into a usable monthly series
    #[error("Data error: {0}")]
    DataError(String),

    /// Too few observations to hold out a validation window and still train
    #[error("Not enough data to make predictions: need at least {required} monthly observations, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    /// A single strategy failed to fit or forecast
    #[error("Model {model} failed: {reason}")]
    ModelFit { model: String, reason: String },

    /// Every strategy failed during validation
    #[error("Could not train any model successfully")]
    NoViableModel,

    /// The winning strategy failed on the full series
    #[error("Error making final predictions with {model}: {reason}")]
    FinalForecast { model: String, reason: String },

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from the CSV reader
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl ForecastError {
    /// Build a [`ForecastError::ModelFit`] for the named model
    pub fn model_fit(model: &str, reason: impl Into<String>) -> Self {
        ForecastError::ModelFit {
            model: model.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<MathError> for ForecastError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InvalidInput(msg) => ForecastError::InvalidParameter(msg),
            other => ForecastError::DataError(other.to_string()),
        }
    }
}
