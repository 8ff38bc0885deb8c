//! Completion providers
//!
//! Features:
//! - Multiple backend support (Ollama, OpenAI-compatible, Gemini)
//! - Local runtime driven as a long-lived subprocess
//! - Optional image input on user messages
//! - Retry with exponential backoff on transient failures

pub mod backend;
pub mod factory;
pub mod gemini;
pub mod process;
pub mod prompt;

pub use backend::{
    FinishReason, GenerationResult, LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend,
};
pub use factory::LlmFactory;
pub use gemini::GeminiBackend;
pub use process::{ProcessBackend, ProcessConfig};
pub use prompt::{ImageInput, Message, Role};

use thiserror::Error;

/// LLM errors
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout")]
    Timeout,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Subprocess error: {0}")]
    Process(String),

    /// Provider answered without any text (e.g. a safety block)
    #[error("Empty response: {0}")]
    EmptyResponse(String),
}

impl LlmError {
    /// Network failures and timeouts are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Network(_) | LlmError::Timeout)
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else {
            // Request URLs may carry credentials
            LlmError::Network(err.without_url().to_string())
        }
    }
}
