//! Application State
//!
//! Shared state across all handlers.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;

use finassist_agent::{ControllerConfig, LlmSlotExtractor, SlotFillingController};
use finassist_config::Settings;
use finassist_llm::LlmBackend;

use crate::session::{InMemorySessionStore, SessionStore};

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    /// Completion provider, shared by the extractor and `/chat`
    pub llm: Arc<dyn LlmBackend>,
    pub controller: Arc<SlotFillingController>,
    pub sessions: Arc<dyn SessionStore>,
    /// Present when Prometheus export is enabled
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state with an in-memory session store sized from settings
    pub fn new(config: Settings, llm: Arc<dyn LlmBackend>) -> Self {
        let store = InMemorySessionStore::new(
            config.server.max_sessions,
            Duration::from_secs(config.server.session_ttl_seconds),
        );
        Self::with_session_store(config, llm, Arc::new(store))
    }

    /// Build state with a custom session store
    pub fn with_session_store(
        config: Settings,
        llm: Arc<dyn LlmBackend>,
        sessions: Arc<dyn SessionStore>,
    ) -> Self {
        // Give the backend's own retries a chance before falling back
        let mut extractor = LlmSlotExtractor::new(llm.clone(), config.llm.call_budget());
        if let Some(template) = &config.conversation.extraction_prompt {
            extractor = extractor.with_template(template.clone());
        }

        let controller = SlotFillingController::new(
            Arc::new(extractor),
            ControllerConfig::from_settings(&config),
        );

        Self {
            config: Arc::new(config),
            llm,
            controller: Arc::new(controller),
            sessions,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
