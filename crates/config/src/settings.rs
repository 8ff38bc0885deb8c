//! Main settings module

use config::{Config, Environment, File};
use finassist_core::TransferLimits;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::ConfigError;

/// Placeholders a custom extraction prompt must contain
pub const PROMPT_PLACEHOLDERS: [&str; 2] = ["{transcript}", "{message}"];

/// First retry delay for provider calls; doubles on each further retry
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(200);

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation
    #[default]
    Development,
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP server and session storage
    #[serde(default)]
    pub server: ServerConfig,

    /// Completion provider
    #[serde(default)]
    pub llm: LlmSettings,

    /// Transfer limits and simulated balance
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Slot-filling behaviour
    #[serde(default)]
    pub conversation: ConversationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    /// Create default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_llm()?;
        self.validate_transfer()?;
        self.validate_conversation()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        let server = &self.server;

        if server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                message: "Port cannot be 0".to_string(),
            });
        }

        if server.max_sessions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.max_sessions".to_string(),
                message: "Max sessions must be at least 1".to_string(),
            });
        }

        if server.session_ttl_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.session_ttl_seconds".to_string(),
                message: "Session TTL must be at least 1 second".to_string(),
            });
        }

        if self.environment.is_production() && server.cors_enabled && server.cors_origins.is_empty()
        {
            tracing::warn!(
                "CORS is enabled in production with no origins configured; all origins are allowed"
            );
        }

        Ok(())
    }

    fn validate_llm(&self) -> Result<(), ConfigError> {
        let llm = &self.llm;

        if llm.timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue {
                field: "llm.timeout_seconds".to_string(),
                message: "Timeout must be at least 1 second".to_string(),
            });
        }

        if llm.model.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.model".to_string()));
        }

        if llm.provider.requires_api_key() && llm.api_key.is_none() {
            if self.environment.is_strict() {
                return Err(ConfigError::InvalidValue {
                    field: "llm.api_key".to_string(),
                    message: format!("API key must be set for provider '{}'", llm.provider),
                });
            }
            tracing::warn!(
                provider = %llm.provider,
                "No API key configured; provider calls will fail and extraction will use the fallback"
            );
        }

        if llm.provider == LlmProvider::Process && llm.process_command.trim().is_empty() {
            return Err(ConfigError::MissingField("llm.process_command".to_string()));
        }

        Ok(())
    }

    fn validate_transfer(&self) -> Result<(), ConfigError> {
        let transfer = &self.transfer;

        if !(transfer.min_amount > 0.0) {
            return Err(ConfigError::InvalidValue {
                field: "transfer.min_amount".to_string(),
                message: format!("Must be positive, got {}", transfer.min_amount),
            });
        }

        if transfer.min_amount > transfer.max_amount {
            return Err(ConfigError::InvalidValue {
                field: "transfer.max_amount".to_string(),
                message: format!(
                    "Must be at least min_amount ({}), got {}",
                    transfer.min_amount, transfer.max_amount
                ),
            });
        }

        if transfer.account_balance < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "transfer.account_balance".to_string(),
                message: format!("Cannot be negative, got {}", transfer.account_balance),
            });
        }

        Ok(())
    }

    fn validate_conversation(&self) -> Result<(), ConfigError> {
        if let Some(prompt) = &self.conversation.extraction_prompt {
            for placeholder in PROMPT_PLACEHOLDERS {
                if !prompt.contains(placeholder) {
                    return Err(ConfigError::InvalidValue {
                        field: "conversation.extraction_prompt".to_string(),
                        message: format!("Template must contain {}", placeholder),
                    });
                }
            }
        }

        match &self.conversation.default_from_account {
            Some(account) => {
                if !finassist_core::validation::is_valid_account_number(account) {
                    return Err(ConfigError::InvalidValue {
                        field: "conversation.default_from_account".to_string(),
                        message: "Must be 9 to 18 digits".to_string(),
                    });
                }
            }
            // Nothing would ever supply the source account
            None if !self.conversation.require_from_account => {
                return Err(ConfigError::MissingField(
                    "conversation.default_from_account".to_string(),
                ));
            }
            None => {}
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Maximum concurrently active sessions
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,

    /// Idle time after which a session expires
    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    /// How often expired sessions are purged
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_seconds: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_max_sessions() -> usize {
    1000
}
fn default_session_ttl() -> u64 {
    1800
}
fn default_cleanup_interval() -> u64 {
    300
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_sessions: default_max_sessions(),
            session_ttl_seconds: default_session_ttl(),
            cleanup_interval_seconds: default_cleanup_interval(),
        }
    }
}

/// Completion provider kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama server over HTTP
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions API
    OpenAI,
    /// Google Gemini generateContent API
    Gemini,
    /// Local runtime driven over a subprocess's stdin/stdout
    Process,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "ollama",
            LlmProvider::OpenAI => "openai",
            LlmProvider::Gemini => "gemini",
            LlmProvider::Process => "process",
        }
    }

    pub fn requires_api_key(&self) -> bool {
        matches!(self, LlmProvider::OpenAI | LlmProvider::Gemini)
    }

    /// Endpoint used when none is configured
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::OpenAI => "https://api.openai.com/v1",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com/v1beta/models",
            LlmProvider::Process => "",
        }
    }
}

impl std::fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Completion provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    #[serde(default)]
    pub provider: LlmProvider,

    /// Model name or ID
    #[serde(default = "default_model")]
    pub model: String,

    /// Override of the provider's default endpoint
    #[serde(default)]
    pub endpoint: Option<String>,

    /// API key (OpenAI, Gemini)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Per-request timeout
    #[serde(default = "default_llm_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Retries on network and 5xx errors
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Executable for the process provider
    #[serde(default = "default_process_command")]
    pub process_command: String,

    /// Arguments placed before the model name
    #[serde(default = "default_process_args")]
    pub process_args: Vec<String>,
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_max_tokens() -> usize {
    512
}
fn default_temperature() -> f32 {
    0.2
}
fn default_max_retries() -> u32 {
    2
}
fn default_process_command() -> String {
    "ollama".to_string()
}
fn default_process_args() -> Vec<String> {
    vec!["run".to_string()]
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_model(),
            endpoint: None,
            api_key: None,
            timeout_seconds: default_llm_timeout(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_retries: default_max_retries(),
            process_command: default_process_command(),
            process_args: default_process_args(),
        }
    }
}

impl LlmSettings {
    /// Worst-case duration of one provider call: every attempt timing out
    /// plus the backoff sleeps between them
    pub fn call_budget(&self) -> Duration {
        let attempts = u64::from(self.max_retries) + 1;
        let backoff = INITIAL_BACKOFF * ((1u32 << self.max_retries.min(16)) - 1);
        Duration::from_secs(self.timeout_seconds.saturating_mul(attempts)) + backoff
    }

    /// Configured endpoint or the provider default, without a trailing slash
    pub fn endpoint(&self) -> String {
        self.endpoint
            .as_deref()
            .unwrap_or_else(|| self.provider.default_endpoint())
            .trim_end_matches('/')
            .to_string()
    }
}

/// Transfer limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    #[serde(default = "default_min_amount")]
    pub min_amount: f64,

    #[serde(default = "default_max_amount")]
    pub max_amount: f64,

    /// Simulated balance of the user's account
    #[serde(default = "default_account_balance")]
    pub account_balance: f64,
}

fn default_min_amount() -> f64 {
    100.0
}
fn default_max_amount() -> f64 {
    25_000.0
}
fn default_account_balance() -> f64 {
    50_000.0
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            min_amount: default_min_amount(),
            max_amount: default_max_amount(),
            account_balance: default_account_balance(),
        }
    }
}

impl TransferConfig {
    pub fn limits(&self) -> TransferLimits {
        TransferLimits {
            min_amount: self.min_amount,
            max_amount: self.max_amount,
            account_balance: self.account_balance,
        }
    }
}

/// Slot-filling behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Ask the user for their source account
    #[serde(default = "default_true")]
    pub require_from_account: bool,

    /// Source account used in the payload when none was collected
    #[serde(default)]
    pub default_from_account: Option<String>,

    /// Replacement for the built-in extraction prompt
    #[serde(default)]
    pub extraction_prompt: Option<String>,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            require_from_account: true,
            default_from_account: None,
            extraction_prompt: None,
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable metrics
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from `config/` relative to the working directory
///
/// Priority (highest to lowest):
/// 1. Environment variables (FINASSIST__ prefix)
/// 2. config/{env}.yaml (if env specified)
/// 3. config/default.yaml
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings from an explicit configuration directory
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    let default_path = dir.join("default");
    builder = builder.add_source(File::with_name(&default_path.to_string_lossy()).required(false));

    if let Some(env_name) = env {
        let env_path = dir.join(env_name);
        builder = builder.add_source(File::with_name(&env_path.to_string_lossy()).required(false));
    }

    // Values stay strings until typed deserialization so that account
    // numbers keep their leading zeros
    builder = builder.add_source(
        Environment::with_prefix("FINASSIST")
            .prefix_separator("__")
            .separator("__"),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.server.max_sessions, 1000);
        assert_eq!(settings.llm.provider, LlmProvider::Ollama);
        assert_eq!(settings.llm.timeout_seconds, 30);
        assert_eq!(settings.transfer.max_amount, 25_000.0);
        assert!(settings.conversation.require_from_account);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_server_validation() {
        let mut settings = Settings::default();

        settings.server.port = 0;
        assert!(settings.validate_server().is_err());
        settings.server.port = 8080;

        settings.server.max_sessions = 0;
        assert!(settings.validate_server().is_err());
        settings.server.max_sessions = 10;

        settings.server.session_ttl_seconds = 0;
        assert!(settings.validate_server().is_err());
        settings.server.session_ttl_seconds = 60;

        assert!(settings.validate_server().is_ok());
    }

    #[test]
    fn test_transfer_validation() {
        let mut settings = Settings::default();

        settings.transfer.min_amount = 0.0;
        assert!(settings.validate_transfer().is_err());

        settings.transfer.min_amount = 500.0;
        settings.transfer.max_amount = 100.0;
        assert!(settings.validate_transfer().is_err());

        settings.transfer.max_amount = 1000.0;
        settings.transfer.account_balance = -1.0;
        assert!(settings.validate_transfer().is_err());

        settings.transfer.account_balance = 0.0;
        assert!(settings.validate_transfer().is_ok());
    }

    #[test]
    fn test_api_key_required_when_strict() {
        let mut settings = Settings::default();
        settings.llm.provider = LlmProvider::Gemini;

        assert!(settings.validate_llm().is_ok());

        settings.environment = RuntimeEnvironment::Production;
        assert!(settings.validate_llm().is_err());

        settings.llm.api_key = Some("key".to_string());
        assert!(settings.validate_llm().is_ok());
    }

    #[test]
    fn test_extraction_prompt_placeholders() {
        let mut settings = Settings::default();
        settings.conversation.extraction_prompt = Some("Extract from {message}".to_string());
        assert!(settings.validate_conversation().is_err());

        settings.conversation.extraction_prompt =
            Some("History:\n{transcript}\nMessage: {message}".to_string());
        assert!(settings.validate_conversation().is_ok());
    }

    #[test]
    fn test_source_account_must_come_from_somewhere() {
        let mut settings = Settings::default();
        settings.conversation.require_from_account = false;
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::MissingField(field)) if field == "conversation.default_from_account"
        ));

        settings.conversation.default_from_account = Some("12AB".to_string());
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));

        settings.conversation.default_from_account = Some("000011112222".to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_endpoint_defaults() {
        let mut llm = LlmSettings::default();
        assert_eq!(llm.endpoint(), "http://localhost:11434");

        llm.endpoint = Some("http://ollama:11434/".to_string());
        assert_eq!(llm.endpoint(), "http://ollama:11434");
    }

    #[test]
    fn test_call_budget_covers_retries() {
        let mut llm = LlmSettings::default();
        assert_eq!(llm.call_budget(), Duration::from_millis(90_600));

        llm.max_retries = 0;
        assert_eq!(llm.call_budget(), Duration::from_secs(30));
    }

    #[test]
    fn test_limits_conversion() {
        let transfer = TransferConfig::default();
        assert_eq!(transfer.limits(), TransferLimits::default());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            "server:\n  port: 9000\nllm:\n  provider: process\n  model: deepseek-r1:14b\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("staging.yaml"),
            "environment: staging\ntransfer:\n  max_amount: 10000\n",
        )
        .unwrap();

        let settings = load_settings_from(dir.path(), Some("staging")).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.environment, RuntimeEnvironment::Staging);
        assert_eq!(settings.llm.provider, LlmProvider::Process);
        assert_eq!(settings.llm.model, "deepseek-r1:14b");
        assert_eq!(settings.transfer.max_amount, 10_000.0);
        assert_eq!(settings.transfer.min_amount, 100.0);
    }

    #[test]
    fn test_env_override_keeps_leading_zeros() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            "conversation:\n  require_from_account: false\n  default_from_account: \"111122223333\"\n",
        )
        .unwrap();

        std::env::set_var("FINASSIST__CONVERSATION__DEFAULT_FROM_ACCOUNT", "000123456789");
        std::env::set_var("FINASSIST__TRANSFER__ACCOUNT_BALANCE", "75000");
        let result = load_settings_from(dir.path(), None);
        std::env::remove_var("FINASSIST__CONVERSATION__DEFAULT_FROM_ACCOUNT");
        std::env::remove_var("FINASSIST__TRANSFER__ACCOUNT_BALANCE");

        let settings = result.unwrap();
        assert!(!settings.conversation.require_from_account);
        assert_eq!(
            settings.conversation.default_from_account.as_deref(),
            Some("000123456789")
        );
        // Typed fields still parse from env strings
        assert_eq!(settings.transfer.account_balance, 75_000.0);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("default.yaml"),
            "transfer:\n  min_amount: 5000\n  max_amount: 1000\n",
        )
        .unwrap();

        let err = load_settings_from(dir.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}
