//! Application Configuration Module
//!
//! Centralizes the configuration for the interviewer client. Settings are
//! loaded from environment variables into a single struct that is passed
//! throughout the application.

use std::env;
use tracing::Level;

/// Holds all configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_ws_url: String,
    pub observation_base_url: String,
    pub log_level: Level,
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid log level provided for RUST_LOG: {0}")]
    InvalidLogLevel(String),
    #[error("Invalid URL for {var}: {value}")]
    InvalidUrl { var: String, value: String },
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    // *   `SERVER_WS_URL`: (Optional) Base URL of the interview backend's
    //     WebSocket endpoint. Defaults to "ws://127.0.0.1:8000".
    // *   `OBSERVATION_BASE_URL`: (Optional) Base URL of the behavioral
    //     observation service. Defaults to "http://127.0.0.1:8001".
    // *   `RUST_LOG`: (Optional) The logging level. Defaults to "INFO".
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file. This is useful for local development and is ignored if not present.
        dotenvy::dotenv().ok();

        let server_ws_url =
            env::var("SERVER_WS_URL").unwrap_or_else(|_| "ws://127.0.0.1:8000".to_string());
        validate_ws_url("SERVER_WS_URL", &server_ws_url)?;

        let observation_base_url = env::var("OBSERVATION_BASE_URL")
            .unwrap_or_else(|_| "http://127.0.0.1:8001".to_string());
        validate_http_url("OBSERVATION_BASE_URL", &observation_base_url)?;

        // Configure logging level from RUST_LOG, with a sensible default.
        let log_level_str = env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str
            .parse::<Level>()
            .map_err(|_| ConfigError::InvalidLogLevel(log_level_str))?;

        Ok(Self {
            server_ws_url,
            observation_base_url,
            log_level,
        })
    }
}

fn validate_ws_url(var: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("ws://") || value.starts_with("wss://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            var: var.to_string(),
            value: value.to_string(),
        })
    }
}

fn validate_http_url(var: &str, value: &str) -> Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            var: var.to_string(),
            value: value.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_urls_must_use_a_websocket_scheme() {
        assert!(validate_ws_url("SERVER_WS_URL", "ws://127.0.0.1:8000").is_ok());
        assert!(validate_ws_url("SERVER_WS_URL", "wss://interviews.example.com").is_ok());
        let err = validate_ws_url("SERVER_WS_URL", "http://127.0.0.1:8000").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl { .. }));
    }

    #[test]
    fn observation_urls_must_use_http() {
        assert!(validate_http_url("OBSERVATION_BASE_URL", "http://127.0.0.1:8001").is_ok());
        assert!(validate_http_url("OBSERVATION_BASE_URL", "https://obs.example.com").is_ok());
        assert!(validate_http_url("OBSERVATION_BASE_URL", "ftp://nope").is_err());
    }
}
