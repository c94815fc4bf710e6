//! Configuration management for the explorer views

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{ExplorerError, Result};

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub stakes: StakesConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    #[serde(default = "default_blocks_topic")]
    pub blocks_topic: String,
    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginationConfig {
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StakesConfig {
    #[serde(default = "default_token_decimals")]
    pub token_decimals: u32,
    #[serde(default = "default_token_symbol")]
    pub token_symbol: String,
    #[serde(default = "default_stakes_topic")]
    pub topic: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            socket_url: default_socket_url(),
            blocks_topic: default_blocks_topic(),
            heartbeat_secs: default_heartbeat_secs(),
        }
    }
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_timeout(),
        }
    }
}

impl Default for StakesConfig {
    fn default() -> Self {
        Self {
            token_decimals: default_token_decimals(),
            token_symbol: default_token_symbol(),
            topic: default_stakes_topic(),
        }
    }
}

impl ExplorerConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

impl PaginationConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Load the config at `path`. A missing or empty file yields the defaults.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let config_str = fs::read_to_string(path.as_ref()).unwrap_or_default();
    let config: Config = if config_str.trim().is_empty() {
        Config::default()
    } else {
        toml::from_str(&config_str)?
    };

    // Validate critical values
    if config.explorer.base_url.is_empty() {
        return Err(ExplorerError::ConfigError(
            "explorer.base_url must be set".to_string(),
        ));
    }

    if config.explorer.socket_url.is_empty() {
        return Err(ExplorerError::ConfigError(
            "explorer.socket_url must be set".to_string(),
        ));
    }

    if config.explorer.heartbeat_secs == 0 {
        return Err(ExplorerError::ConfigError(
            "explorer.heartbeat_secs must be greater than zero".to_string(),
        ));
    }

    Ok(config)
}

fn default_base_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_socket_url() -> String {
    "ws://localhost:4000/socket/websocket?vsn=1.0.0".to_string()
}

fn default_blocks_topic() -> String {
    "blocks:new_block".to_string()
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_timeout() -> u64 {
    30
}

fn default_token_decimals() -> u32 {
    18
}

fn default_token_symbol() -> String {
    "TRI".to_string()
}

fn default_stakes_topic() -> String {
    "stakes:staking_update".to_string()
}
