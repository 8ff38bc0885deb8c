//! LLM Backend implementations
//!
//! HTTP backends for a local Ollama server and for OpenAI-compatible chat
//! completion APIs. Both are non-streaming: the slot extractor needs the
//! whole reply before it can parse it.

use async_trait::async_trait;
use finassist_config::{LlmSettings, INITIAL_BACKOFF};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::prompt::Message;
use crate::LlmError;

/// LLM configuration
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Model name/ID
    pub model: String,
    /// API endpoint, without trailing slash
    pub endpoint: String,
    /// API key (optional)
    pub api_key: Option<String>,
    /// Maximum tokens to generate
    pub max_tokens: usize,
    pub temperature: f32,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum retry attempts for transient failures
    pub max_retries: u32,
    /// Initial backoff duration (doubles each retry)
    pub initial_backoff: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::from(&LlmSettings::default())
    }
}

impl From<&LlmSettings> for LlmConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            model: settings.model.clone(),
            endpoint: settings.endpoint(),
            api_key: settings.api_key.clone(),
            max_tokens: settings.max_tokens,
            temperature: settings.temperature,
            timeout: Duration::from_secs(settings.timeout_seconds),
            max_retries: settings.max_retries,
            initial_backoff: INITIAL_BACKOFF,
        }
    }
}

/// LLM generation result
#[derive(Debug, Clone)]
pub struct GenerationResult {
    /// Generated text
    pub text: String,
    /// Tokens generated, when the provider reports it
    pub tokens: usize,
    /// Total generation time (ms)
    pub total_time_ms: u64,
    pub finish_reason: FinishReason,
}

/// Finish reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    /// Provider withheld output (content filter / safety block)
    Filtered,
}

/// LLM Backend trait
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Generate a response
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError>;

    /// Check if the provider is reachable
    async fn is_available(&self) -> bool;

    /// Get model name
    fn model_name(&self) -> &str;
}

pub(crate) fn build_client(timeout: Duration) -> Result<Client, LlmError> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LlmError::Configuration(format!("Failed to create HTTP client: {}", e)))
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// retry budget is spent. Backoff doubles after every failed attempt.
pub(crate) async fn with_retries<T, F, Fut>(
    max_retries: u32,
    initial_backoff: Duration,
    mut op: F,
) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, LlmError>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            tracing::warn!(
                "LLM request failed, retrying in {:?} (attempt {}/{})",
                backoff,
                attempt,
                max_retries
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() => last_error = Some(e),
            Err(e) => return Err(e),
        }
    }

    Err(last_error.unwrap_or_else(|| LlmError::Network("Max retries exceeded".to_string())))
}

/// Ollama backend
#[derive(Clone)]
pub struct OllamaBackend {
    client: Client,
    config: LlmConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    /// Build the API URL
    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.config.endpoint, path)
    }

    fn build_request(&self, messages: &[Message]) -> OllamaChatRequest {
        OllamaChatRequest {
            model: self.config.model.clone(),
            messages: messages.iter().map(|m| m.into()).collect(),
            stream: false,
            options: Some(OllamaOptions {
                temperature: Some(self.config.temperature),
                num_predict: Some(self.config.max_tokens as i32),
            }),
        }
    }

    /// Execute a single request (used by retry logic)
    async fn execute_request(
        &self,
        request: &OllamaChatRequest,
    ) -> Result<OllamaChatResponse, LlmError> {
        let response = self
            .client
            .post(self.api_url("/chat"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error = response.text().await.unwrap_or_default();
            // 5xx errors are retryable, 4xx are not
            if status.is_server_error() {
                return Err(LlmError::Network(format!("Server error {}: {}", status, error)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error)));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages);

        let result = with_retries(self.config.max_retries, self.config.initial_backoff, || {
            self.execute_request(&request)
        })
        .await?;

        Ok(GenerationResult {
            text: result.message.content,
            tokens: result.eval_count.unwrap_or(0) as usize,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason: match result.done_reason.as_deref() {
                Some("length") => FinishReason::Length,
                _ => FinishReason::Stop,
            },
        })
    }

    async fn is_available(&self) -> bool {
        self.client
            .get(self.api_url("/tags"))
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// Ollama API types
#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    /// Raw base64 images
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    images: Vec<String>,
}

impl From<&Message> for OllamaMessage {
    fn from(msg: &Message) -> Self {
        Self {
            role: msg.role.to_string(),
            content: msg.content.clone(),
            images: msg.images.iter().map(|i| i.data.clone()).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: OllamaMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// OpenAI-compatible backend
///
/// Works with OpenAI itself and any server exposing `/chat/completions`
/// (vLLM, llama.cpp server, Ollama's compatibility endpoint). Text only.
pub struct OpenAIBackend {
    config: LlmConfig,
    client: Client,
}

impl OpenAIBackend {
    /// Create new OpenAI backend
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let has_key = config.api_key.as_deref().is_some_and(|k| !k.is_empty());
        if !has_key && !config.endpoint.starts_with("http://localhost") {
            return Err(LlmError::Configuration(
                "API key required for remote endpoints".to_string(),
            ));
        }

        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    /// Get the full API URL for chat completions
    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.config.endpoint)
    }

    /// Build request headers
    fn build_headers(&self) -> reqwest::header::HeaderMap {
        use reqwest::header::HeaderValue;

        let mut headers = reqwest::header::HeaderMap::new();

        if let Some(key) = self.config.api_key.as_deref() {
            if let Ok(val) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(reqwest::header::AUTHORIZATION, val);
            }
        }

        headers.insert(
            reqwest::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        headers
    }

    fn build_request(&self, messages: &[Message]) -> Result<OpenAIChatRequest, LlmError> {
        if messages.iter().any(Message::has_images) {
            return Err(LlmError::Configuration(
                "Image input is not supported by the OpenAI-compatible backend".to_string(),
            ));
        }

        Ok(OpenAIChatRequest {
            model: self.config.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAIMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            max_tokens: Some(self.config.max_tokens),
            temperature: Some(self.config.temperature),
            stream: Some(false),
        })
    }

    async fn execute_request(
        &self,
        request: &OpenAIChatRequest,
    ) -> Result<OpenAIChatResponse, LlmError> {
        let response = self
            .client
            .post(self.chat_url())
            .headers(self.build_headers())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            if status.is_server_error() {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, error_text)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, error_text)));
        }

        response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.without_url().to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAIBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages)?;

        let response = with_retries(self.config.max_retries, self.config.initial_backoff, || {
            self.execute_request(&request)
        })
        .await?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::InvalidResponse("No choices in response".to_string()))?;

        let finish_reason = match choice.finish_reason.as_deref() {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::Filtered,
            _ => FinishReason::Stop,
        };

        let text = choice.message.content.unwrap_or_default();
        if text.trim().is_empty() && finish_reason == FinishReason::Filtered {
            return Err(LlmError::EmptyResponse(
                "Response withheld by content filter".to_string(),
            ));
        }

        Ok(GenerationResult {
            text,
            tokens: response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/models", self.config.endpoint);
        self.client
            .get(&url)
            .headers(self.build_headers())
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }
}

// OpenAI API types
#[derive(Debug, Serialize)]
struct OpenAIChatRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream: Option<bool>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChatResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    completion_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ImageInput;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_config_from_settings() {
        let settings = LlmSettings {
            endpoint: Some("http://ollama:11434/".to_string()),
            timeout_seconds: 12,
            ..Default::default()
        };
        let config = LlmConfig::from(&settings);
        assert_eq!(config.endpoint, "http://ollama:11434");
        assert_eq!(config.timeout, Duration::from_secs(12));
        assert_eq!(config.max_retries, 2);
    }

    #[test]
    fn test_message_conversion() {
        let msg = Message::user("Read this card").with_image(ImageInput {
            mime_type: "image/png".to_string(),
            data: "iVBORw0KGgo=".to_string(),
        });
        let ollama_msg: OllamaMessage = (&msg).into();
        assert_eq!(ollama_msg.role, "user");
        assert_eq!(ollama_msg.content, "Read this card");
        assert_eq!(ollama_msg.images, vec!["iVBORw0KGgo=".to_string()]);
    }

    #[test]
    fn test_ollama_request_serialization() {
        let backend = OllamaBackend::new(LlmConfig::default()).unwrap();
        let request = backend.build_request(&[Message::user("hi")]);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["stream"], false);
        assert_eq!(json["options"]["num_predict"], 512);
        assert!(json["messages"][0].get("images").is_none());
    }

    #[test]
    fn test_openai_rejects_images() {
        let config = LlmConfig {
            endpoint: "http://localhost:8000/v1".to_string(),
            ..Default::default()
        };
        let backend = OpenAIBackend::new(config).unwrap();
        let msg = Message::user("x").with_image(ImageInput {
            mime_type: "image/jpeg".to_string(),
            data: "/9j/4AAQ".to_string(),
        });
        assert!(matches!(
            backend.build_request(&[msg]),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_openai_requires_key_for_remote() {
        let config = LlmConfig {
            endpoint: "https://api.openai.com/v1".to_string(),
            api_key: None,
            ..Default::default()
        };
        assert!(OpenAIBackend::new(config).is_err());
    }

    #[tokio::test]
    async fn test_retry_stops_on_success() {
        let attempts = AtomicU32::new(0);
        let result = with_retries(3, Duration::from_millis(1), || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(LlmError::Network("connection reset".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_skips_permanent_errors() {
        let attempts = AtomicU32::new(0);
        let result: Result<(), _> = with_retries(3, Duration::from_millis(1), || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(LlmError::Api("HTTP 400".to_string())) }
        })
        .await;

        assert!(matches!(result, Err(LlmError::Api(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
