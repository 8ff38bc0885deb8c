//! LLM Factory
//!
//! Builds the configured completion provider. The result is handed to the
//! slot extractor and the chat endpoint explicitly; nothing reads provider
//! settings from ambient process state.

use std::sync::Arc;
use std::time::Duration;

use finassist_config::{LlmProvider, LlmSettings};

use crate::backend::{LlmBackend, LlmConfig, OllamaBackend, OpenAIBackend};
use crate::gemini::GeminiBackend;
use crate::process::{ProcessBackend, ProcessConfig};
use crate::LlmError;

pub struct LlmFactory;

impl LlmFactory {
    /// Create a backend from settings
    pub fn create(settings: &LlmSettings) -> Result<Arc<dyn LlmBackend>, LlmError> {
        let config = LlmConfig::from(settings);

        let backend: Arc<dyn LlmBackend> = match settings.provider {
            LlmProvider::Ollama => Arc::new(OllamaBackend::new(config)?),
            LlmProvider::OpenAI => Arc::new(OpenAIBackend::new(config)?),
            LlmProvider::Gemini => Arc::new(GeminiBackend::new(config)?),
            LlmProvider::Process => Arc::new(ProcessBackend::new(ProcessConfig {
                command: settings.process_command.clone(),
                args: settings.process_args.clone(),
                model: settings.model.clone(),
                timeout: Duration::from_secs(settings.timeout_seconds),
            })?),
        };

        tracing::info!(
            provider = %settings.provider,
            model = %backend.model_name(),
            "Created LLM backend"
        );

        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ollama() {
        let backend = LlmFactory::create(&LlmSettings::default()).unwrap();
        assert_eq!(backend.model_name(), "llama3.1:8b");
    }

    #[test]
    fn test_create_process() {
        let settings = LlmSettings {
            provider: LlmProvider::Process,
            model: "deepseek-r1:14b".to_string(),
            ..Default::default()
        };
        let backend = LlmFactory::create(&settings).unwrap();
        assert_eq!(backend.model_name(), "deepseek-r1:14b");
    }

    #[test]
    fn test_gemini_without_key_fails() {
        let settings = LlmSettings {
            provider: LlmProvider::Gemini,
            api_key: None,
            ..Default::default()
        };
        assert!(matches!(
            LlmFactory::create(&settings),
            Err(LlmError::Configuration(_))
        ));
    }

    #[test]
    fn test_create_gemini() {
        let settings = LlmSettings {
            provider: LlmProvider::Gemini,
            model: "gemini-1.5-flash".to_string(),
            api_key: Some("key".to_string()),
            ..Default::default()
        };
        let backend = LlmFactory::create(&settings).unwrap();
        assert_eq!(backend.model_name(), "gemini-1.5-flash");
    }
}
