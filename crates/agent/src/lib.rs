//! Slot-filling conversation for banking transfers
//!
//! Features:
//! - LLM-backed slot extraction with a deterministic keyword fallback
//! - Session controller: merge, validate, next-question selection
//! - Explicit commands: complete, cancel, change <field>
//! - Confirmation summary and final transfer payload

pub mod controller;
pub mod extractor;
pub mod prompts;
pub mod session;

pub use controller::{Command, ControllerConfig, SlotFillingController, TurnOutcome};
pub use extractor::{
    fallback_extract, parse_extraction_response, strip_code_fence, LlmSlotExtractor,
    SlotExtractor,
};
pub use prompts::sanitize_prompt;
pub use session::ConversationSession;

use finassist_llm::LlmError;
use thiserror::Error;

/// Why the LLM extraction path produced nothing usable.
///
/// Never reaches callers of [`SlotExtractor::extract`]; every variant is
/// absorbed into the keyword fallback.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("Provider error: {0}")]
    Provider(#[from] LlmError),

    #[error("Provider timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Provider returned empty output")]
    Empty,

    #[error("Malformed extraction output: {0}")]
    Malformed(String),
}
