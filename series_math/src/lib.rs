//! # Series Math
//!
//! Numeric building blocks shared by the forecasting models.
//! This crate provides descriptive statistics, differencing, a small dense
//! linear solver, a bounded Nelder-Mead optimizer and the stationarity and
//! seasonality tests used to pick differencing orders.

use thiserror::Error;

pub mod differencing;
pub mod linalg;
pub mod optimize;
pub mod stationarity;
pub mod stats;

/// Errors that can occur in series calculations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = MathError::InsufficientData("need 3 points".to_string());
        assert_eq!(
            err.to_string(),
            "Insufficient data for calculation: need 3 points"
        );
    }
}
