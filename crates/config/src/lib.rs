//! Configuration management for the transfer assistant
//!
//! Supports loading configuration from:
//! - `config/default.yaml`
//! - `config/{env}.yaml`
//! - Environment variables (`FINASSIST__` prefix, `__` as the section separator)

pub mod settings;

pub use settings::{
    load_settings, load_settings_from, ConversationConfig, LlmProvider, LlmSettings,
    ObservabilityConfig, RuntimeEnvironment, ServerConfig, Settings, TransferConfig,
    INITIAL_BACKOFF,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}
