//! Chat messages sent to a completion provider

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::LlmError;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Base64 image attached to a user message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageInput {
    pub mime_type: String,
    /// Base64 payload without any `data:` prefix
    pub data: String,
}

impl ImageInput {
    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
    ///
    /// The payload must decode; the MIME type is sniffed from the magic bytes
    /// when the input does not declare one.
    pub fn from_base64(input: &str) -> Result<Self, LlmError> {
        let input = input.trim();
        let (declared, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').ok_or_else(|| {
                    LlmError::Configuration("Malformed data URL for image".to_string())
                })?;
                let mime = meta.trim_end_matches(";base64");
                (Some(mime.to_string()), payload)
            }
            None => (None, input),
        };

        let bytes = BASE64_STANDARD
            .decode(payload)
            .map_err(|e| LlmError::Configuration(format!("Image is not valid base64: {}", e)))?;

        let mime_type = declared
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| sniff_mime_type(&bytes).to_string());

        Ok(Self {
            mime_type,
            data: payload.to_string(),
        })
    }
}

fn sniff_mime_type(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if bytes.starts_with(b"GIF8") {
        "image/gif"
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageInput>,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            images: Vec::new(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_image(mut self, image: ImageInput) -> Self {
        self.images.push(image);
        self
    }

    pub fn has_images(&self) -> bool {
        !self.images.is_empty()
    }
}

/// Flatten messages into one prompt for providers that take plain text
pub fn flatten_messages(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
