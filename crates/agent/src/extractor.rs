//! Slot extraction
//!
//! [`LlmSlotExtractor`] asks the completion provider for a JSON object with
//! one key per slot. Anything that goes wrong on that path (provider error,
//! timeout, empty or malformed output) is logged and replaced by the
//! keyword heuristic in [`fallback_extract`]. Extraction never fails from the
//! caller's point of view.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

use finassist_core::{ExtractionResult, SlotId, TransferMethod};
use finassist_llm::{LlmBackend, Message};

use crate::prompts::{render_extraction_prompt, EXTRACTION_PROMPT};
use crate::ExtractionError;

/// Produces a best-effort partial record from one user turn
#[async_trait]
pub trait SlotExtractor: Send + Sync {
    /// `context` is the rendered transcript before this turn
    async fn extract(&self, message: &str, context: &str) -> ExtractionResult;
}

/// Provider-backed extractor with keyword fallback
pub struct LlmSlotExtractor {
    llm: Arc<dyn LlmBackend>,
    template: String,
    timeout: Duration,
}

impl LlmSlotExtractor {
    pub fn new(llm: Arc<dyn LlmBackend>, timeout: Duration) -> Self {
        Self {
            llm,
            template: EXTRACTION_PROMPT.to_string(),
            timeout,
        }
    }

    /// Replace the built-in instruction template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Provider path only; errors are returned rather than absorbed
    pub async fn try_extract(
        &self,
        message: &str,
        context: &str,
    ) -> Result<ExtractionResult, ExtractionError> {
        let prompt = render_extraction_prompt(&self.template, context, message);
        let start = Instant::now();

        let result = tokio::time::timeout(self.timeout, self.llm.generate(&[Message::user(prompt)]))
            .await
            .map_err(|_| ExtractionError::Timeout(self.timeout))?;

        let elapsed = start.elapsed();
        metrics::histogram!("finassist_llm_latency_seconds").record(elapsed.as_secs_f64());

        let generation = result?;
        tracing::info!(
            model = %self.llm.model_name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Extraction completed"
        );

        parse_extraction_response(&generation.text)
    }
}

#[async_trait]
impl SlotExtractor for LlmSlotExtractor {
    async fn extract(&self, message: &str, context: &str) -> ExtractionResult {
        match self.try_extract(message, context).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(
                    model = %self.llm.model_name(),
                    error = %e,
                    "LLM extraction failed, using keyword fallback"
                );
                metrics::counter!("finassist_extraction_fallbacks_total").increment(1);
                fallback_extract(message)
            }
        }
    }
}

/// Parse the provider's reply into an extraction result.
///
/// Strips an optional code fence and, failing a direct parse, the prose
/// around the outermost braces. Missing keys are null. String values are
/// trimmed; empty strings and the literal "null" count as null. Numbers are
/// kept as their textual form.
pub fn parse_extraction_response(text: &str) -> Result<ExtractionResult, ExtractionError> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(ExtractionError::Empty);
    }

    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(first) => {
            let start = body.find('{');
            let end = body.rfind('}');
            match (start, end) {
                (Some(s), Some(e)) if s < e => serde_json::from_str(&body[s..=e])
                    .map_err(|e| ExtractionError::Malformed(e.to_string()))?,
                _ => return Err(ExtractionError::Malformed(first.to_string())),
            }
        }
    };

    let Value::Object(object) = value else {
        return Err(ExtractionError::Malformed(
            "expected a JSON object".to_string(),
        ));
    };

    let mut result = ExtractionResult::default();
    for slot in SlotId::ALL {
        if let Some(v) = slot_value(&object, slot) {
            result.set(slot, v);
        }
    }
    Ok(result)
}

/// Trim and drop a surrounding markdown code fence
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

fn slot_value(object: &Map<String, Value>, slot: SlotId) -> Option<String> {
    match object.get(slot.as_str())? {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

const AMOUNT_MARKERS: [&str; 4] = ["rs", "rupees", "₹", "send"];

/// Keyword heuristic used when the provider path is unusable.
///
/// Only the transfer method, the beneficiary name and the amount can be
/// found this way; every other slot stays null.
pub fn fallback_extract(message: &str) -> ExtractionResult {
    let lowered = message.to_lowercase();
    let tokens: Vec<&str> = lowered.split_whitespace().collect();
    let mut result = ExtractionResult::default();

    let method = tokens
        .iter()
        .find_map(|t| t.parse::<TransferMethod>().ok())
        .unwrap_or_default();
    result.set(SlotId::TransactionType, method.as_str());

    if let Some(pos) = tokens.iter().position(|t| *t == "to") {
        if let Some(name) = tokens.get(pos + 1) {
            result.set(SlotId::BeneficiaryName, capitalize(name));
        }
    }

    let amount = tokens
        .windows(2)
        .find(|pair| AMOUNT_MARKERS.contains(&pair[0]))
        .map(|pair| pair[1]);
    if let Some(amount) = amount {
        result.set(SlotId::Amount, amount);
    }

    result
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
