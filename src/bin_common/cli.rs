//! CLI utilities for binaries
//!
//! Handles configuration loading and environment variables
//! for the binary executables.

use chatwire::{ConnectionConfig, ADDRESS_ENV_VAR};
use std::path::{Path, PathBuf};
use tracing::info;

/// Type of configuration to load
#[derive(Debug, Clone)]
pub enum ConfigType {
    /// Chat connection configuration (config/chat.yaml)
    Chat,
    /// Custom path
    Custom(String),
}

impl ConfigType {
    /// Get the default path for this config type
    pub fn default_path(&self) -> &str {
        match self {
            ConfigType::Chat => "config/chat.yaml",
            ConfigType::Custom(path) => path,
        }
    }

    /// Get the environment variable name for this config type
    pub fn env_var_name(&self) -> &str {
        match self {
            ConfigType::Chat => "CHAT_CONFIG_PATH",
            ConfigType::Custom(_) => "CHAT_CONFIG_PATH",
        }
    }
}

/// Load configuration path from environment or use default
///
/// # Examples
/// ```
/// use chat_relay::bin_common::{load_config_from_env, ConfigType};
///
/// let path = load_config_from_env(ConfigType::Custom("chat.yaml".into()));
/// ```
pub fn load_config_from_env(config_type: ConfigType) -> PathBuf {
    match config_type {
        ConfigType::Custom(path) => path.into(),
        other => std::env::var(other.env_var_name())
            .unwrap_or_else(|_| other.default_path().to_string())
            .into(),
    }
}

/// Load the connection config, falling back to defaults when the file is absent
///
/// `CHAT_ADDRESS` overrides the address in both cases.
pub fn load_connection_config(path: &Path) -> anyhow::Result<ConnectionConfig> {
    if path.exists() {
        info!("Loading connection config from {}", path.display());
        return Ok(ConnectionConfig::load(path)?);
    }

    info!("No config at {}, using defaults", path.display());
    let mut config = ConnectionConfig::default();
    if let Ok(address) = std::env::var(ADDRESS_ENV_VAR) {
        config.address = address;
    }
    config.validate()?;
    Ok(config)
}

/// Outbound wire payload: the sender's name, one space, then the message
pub fn compose_outbound(name: &str, message: &str) -> String {
    format!("{name} {message}")
}

/// Parse command line arguments for a binary
///
/// Returns a vector of arguments (excluding the program name)
pub fn parse_args() -> Vec<String> {
    std::env::args().skip(1).collect()
}
