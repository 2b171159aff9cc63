//! # CPI Forecast
//!
//! Forecasts a monthly price index by letting three models compete on the
//! most recent months of history.
//!
//! ## Features
//!
//! - CSV loading of `Date`/`CPI` series with tolerant number parsing
//! - Forecasting models (automatic SARIMA, Prophet-style decomposition,
//!   damped Holt-Winters)
//! - Hold-out validation and selection by mean absolute error
//! - Point forecasts at fixed horizons and a chart-ready forecast curve
//!
//! ## Quick Start
//!
//! ```no_run
//! use cpi_forecast::{DataLoader, ForecastPipeline, PipelineConfig};
//!
//! let series = DataLoader::from_csv("data.csv")?;
//! let pipeline = ForecastPipeline::new(PipelineConfig::default())?;
//! let record = pipeline.run(&series)?;
//!
//! println!("{} wins, 12 months ahead: {:?}",
//!     record.best_model_name, record.predictions_absolute.get(&12));
//! # Ok::<(), cpi_forecast::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod report;

// Re-export commonly used types
pub use crate::config::PipelineConfig;
pub use crate::data::{DataLoader, LoaderOptions, TimeSeriesData};
pub use crate::error::{ForecastError, Result};
pub use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
pub use crate::pipeline::{select_best, Evaluation, ForecastPipeline};
pub use crate::report::ForecastRecord;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
