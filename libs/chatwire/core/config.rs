use crate::reassembler::DEFAULT_SENTINEL;
use crate::traits::{ChatWireError, ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

/// Environment variable overriding the configured address
pub const ADDRESS_ENV_VAR: &str = "CHAT_ADDRESS";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config file: {0}")]
    FileError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for ChatWireError {
    fn from(e: ConfigError) -> Self {
        ChatWireError::Configuration(e.to_string())
    }
}

/// Immutable connection settings
///
/// Created once when the client is built and never mutated afterwards.
///
/// ```yaml
/// address: ws://127.0.0.1:8080/ws
/// base_delay_ms: 1000
/// max_delay_ms: 60000
/// max_attempts: 30
/// backoff_multiplier: 1.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// WebSocket URL (ws:// or wss://)
    pub address: String,
    /// Delay before the first retry
    pub base_delay_ms: u64,
    /// Upper bound for any retry delay
    pub max_delay_ms: u64,
    /// Retries allowed after a loss before giving up
    pub max_attempts: u32,
    /// Growth factor applied per retry
    pub backoff_multiplier: f64,
    /// Terminator frame character
    pub sentinel: char,
    /// Upper bound for a single open attempt
    pub open_timeout_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: "ws://127.0.0.1:8080/ws".to_string(),
            base_delay_ms: 1000,
            max_delay_ms: 60_000,
            max_attempts: 30,
            backoff_multiplier: 1.5,
            sentinel: DEFAULT_SENTINEL,
            open_timeout_ms: 10_000,
        }
    }
}

impl ConnectionConfig {
    /// Load configuration from a YAML file
    ///
    /// Missing keys fall back to their defaults. `CHAT_ADDRESS`, when set,
    /// overrides the address from the file.
    pub fn load(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let yaml_content = std::fs::read_to_string(config_path)?;
        let mut config: ConnectionConfig = serde_yaml::from_str(&yaml_content)?;

        if let Ok(address) = std::env::var(ADDRESS_ENV_VAR) {
            info!("Using address from {}", ADDRESS_ENV_VAR);
            config.address = address;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::ValidationError("address must not be empty".into()));
        }
        if self.base_delay_ms == 0 {
            return Err(ConfigError::ValidationError("base_delay_ms must be positive".into()));
        }
        if self.max_delay_ms < self.base_delay_ms {
            return Err(ConfigError::ValidationError(format!(
                "max_delay_ms ({}) must be at least base_delay_ms ({})",
                self.max_delay_ms, self.base_delay_ms
            )));
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err(ConfigError::ValidationError(format!(
                "backoff_multiplier must be a finite number >= 1.0, got {}",
                self.backoff_multiplier
            )));
        }
        if self.open_timeout_ms == 0 {
            return Err(ConfigError::ValidationError("open_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    /// Backoff policy described by this configuration
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::from_config(self)
    }
}

impl ExponentialBackoff {
    pub fn from_config(config: &ConnectionConfig) -> Self {
        ExponentialBackoff::new(
            config.base_delay(),
            config.max_delay(),
            config.backoff_multiplier,
            config.max_attempts,
        )
    }
}
