//! Error types for the TrinityChain explorer views

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExplorerError {
    MarkupError(String),
    SelectorError(String),
    ConfigError(String),
    NetworkError(String),
    ChannelError(String),
    DecodeError(String),
    InvalidAmount(String),
    ContractError(String),
    PageNotFound,
    IoError(String),
}

impl fmt::Display for ExplorerError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ExplorerError::MarkupError(msg) => write!(f, "Malformed markup: {}", msg),
            ExplorerError::SelectorError(msg) => write!(f, "Invalid selector: {}", msg),
            ExplorerError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            ExplorerError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            ExplorerError::ChannelError(msg) => write!(f, "Channel error: {}", msg),
            ExplorerError::DecodeError(msg) => write!(f, "Decode error: {}", msg),
            ExplorerError::InvalidAmount(msg) => write!(f, "Invalid amount: {}", msg),
            ExplorerError::ContractError(msg) => write!(f, "Contract call failed: {}", msg),
            ExplorerError::PageNotFound => write!(f, "Page is not a block list page"),
            ExplorerError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for ExplorerError {}

impl From<std::io::Error> for ExplorerError {
    fn from(err: std::io::Error) -> Self {
        ExplorerError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for ExplorerError {
    fn from(err: serde_json::Error) -> Self {
        ExplorerError::DecodeError(err.to_string())
    }
}

impl From<toml::de::Error> for ExplorerError {
    fn from(err: toml::de::Error) -> Self {
        ExplorerError::ConfigError(err.to_string())
    }
}

impl From<reqwest::Error> for ExplorerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ExplorerError::DecodeError(err.to_string())
        } else {
            ExplorerError::NetworkError(err.to_string())
        }
    }
}

impl From<url::ParseError> for ExplorerError {
    fn from(err: url::ParseError) -> Self {
        ExplorerError::NetworkError(format!("bad url: {}", err))
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExplorerError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ExplorerError::ChannelError(err.to_string())
    }
}

/// Convenience alias used across the crate
pub type Result<T> = std::result::Result<T, ExplorerError>;
