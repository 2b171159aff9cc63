//! Server settings read from the environment

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Start-up configuration problems
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("PORT must be a valid port number, got '{0}'")]
    InvalidPort(String),

    #[error("Invalid listen address '{0}'")]
    InvalidAddress(String),
}

/// Where to listen and which CSV to forecast from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5001,
            data_file: PathBuf::from("data.csv"),
        }
    }
}

impl ServerConfig {
    /// Read `HOST`, `PORT` and `DATA_FILE`, loading `.env` first when present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => defaults.port,
        };

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port,
            data_file: lookup("DATA_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_file),
        })
    }

    /// Socket address to bind
    pub fn addr(&self) -> Result<SocketAddr, ConfigError> {
        let raw = format!("{}:{}", self.host, self.port);
        raw.parse().map_err(|_| ConfigError::InvalidAddress(raw))
    }
}
