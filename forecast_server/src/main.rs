//! # forecast_server
//!
//! Serves monthly CPI forecasts over HTTP: `GET /api/predict` reads the
//! configured CSV, lets the candidate models compete on the latest months
//! and returns the winner's forecasts as JSON.

use cpi_forecast::PipelineConfig;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod routes;

use crate::config::ServerConfig;
use crate::routes::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "forecast_server=info,cpi_forecast=info,tower_http=info".into()
            }),
        )
        .init();

    let config = ServerConfig::from_env()?;
    let addr = config.addr()?;

    let state = AppState::new(config.data_file.clone(), PipelineConfig::default());

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!(
        "forecast_server v{} listening on {}, data file {}",
        env!("CARGO_PKG_VERSION"),
        addr,
        config.data_file.display()
    );

    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
        tracing::error!(%addr, error = %e, "Failed to bind");
        e
    })?;
    axum::serve(listener, app).await?;

    Ok(())
}
