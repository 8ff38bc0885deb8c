//! Google Gemini backend (`generateContent` REST API)

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::backend::{build_client, with_retries, FinishReason, GenerationResult, LlmBackend, LlmConfig};
use crate::prompt::{Message, Role};
use crate::LlmError;

/// Sent as a header, never in the query string
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Gemini backend.
///
/// System messages are sent as `system_instruction`; assistant turns use the
/// `model` role. Images on user messages become `inlineData` parts.
pub struct GeminiBackend {
    config: LlmConfig,
    api_key: String,
    client: Client,
}

impl GeminiBackend {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LlmError::Configuration("Gemini requires an API key".to_string()))?;

        let client = build_client(config.timeout)?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/{}:generateContent", self.config.endpoint, self.config.model)
    }

    fn build_request(&self, messages: &[Message]) -> GenerateContentRequest {
        let system_text: Vec<&str> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect();

        let system_instruction = (!system_text.is_empty()).then(|| Content {
            role: None,
            parts: vec![Part::Text {
                text: system_text.join("\n\n"),
            }],
        });

        let contents = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let mut parts = vec![Part::Text {
                    text: m.content.clone(),
                }];
                parts.extend(m.images.iter().map(|image| Part::InlineData {
                    inline_data: InlineDataPayload {
                        mime_type: image.mime_type.clone(),
                        data: image.data.clone(),
                    },
                }));
                Content {
                    role: Some(match m.role {
                        Role::Assistant => "model".to_string(),
                        _ => "user".to_string(),
                    }),
                    parts,
                }
            })
            .collect();

        GenerateContentRequest {
            contents,
            system_instruction,
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        }
    }

    async fn send_request(
        &self,
        body: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse, LlmError> {
        let response = self
            .client
            .post(self.generate_url())
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorWrapper>(&body_text)
                .ok()
                .and_then(|w| w.error.message)
                .unwrap_or(body_text);
            if status.is_server_error() || status.as_u16() == 429 {
                return Err(LlmError::Network(format!("HTTP {}: {}", status, message)));
            }
            return Err(LlmError::Api(format!("HTTP {}: {}", status, message)));
        }

        response
            .json()
            .await
            .map_err(|e| {
                LlmError::InvalidResponse(format!(
                    "Failed to parse Gemini response: {}",
                    e.without_url()
                ))
            })
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    async fn generate(&self, messages: &[Message]) -> Result<GenerationResult, LlmError> {
        let start = Instant::now();
        let request = self.build_request(messages);

        let response = with_retries(self.config.max_retries, self.config.initial_backoff, || {
            self.send_request(&request)
        })
        .await?;

        let (text, finish_reason) = extract_text_response(response)?;

        Ok(GenerationResult {
            text,
            tokens: 0,
            total_time_ms: start.elapsed().as_millis() as u64,
            finish_reason,
        })
    }

    async fn is_available(&self) -> bool {
        let url = format!("{}/{}", self.config.endpoint, self.config.model);
        self.client
            .get(url)
            .header(API_KEY_HEADER, &self.api_key)
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

fn extract_text_response(
    response: GenerateContentResponse,
) -> Result<(String, FinishReason), LlmError> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(LlmError::EmptyResponse(format!("Prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .and_then(|mut candidates| {
            if candidates.is_empty() {
                None
            } else {
                Some(candidates.remove(0))
            }
        })
        .ok_or_else(|| LlmError::EmptyResponse("No candidates in response".to_string()))?;

    let finish_reason = match candidate.finish_reason.as_deref() {
        Some("MAX_TOKENS") => FinishReason::Length,
        Some("SAFETY") | Some("RECITATION") | Some("BLOCKLIST") => FinishReason::Filtered,
        _ => FinishReason::Stop,
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(LlmError::EmptyResponse(format!(
            "Gemini returned no text (finish reason {:?})",
            finish_reason
        )));
    }

    Ok((text, finish_reason))
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineDataPayload,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataPayload {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<ContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}
