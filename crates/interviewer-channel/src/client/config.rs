use std::time::Duration;

use crate::client::consts::{DEFAULT_BASE_URL, HANDSHAKE_TIMEOUT, SESSION_PATH};

#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    handshake_timeout: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            handshake_timeout: HANDSHAKE_TIMEOUT,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Full URL of the session endpoint.
    pub fn session_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), SESSION_PATH)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
