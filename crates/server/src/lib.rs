//! FinAssist Server
//!
//! HTTP endpoints for the transfer assistant: the session-based
//! slot-filling flow (`/start`, `/process`, `/complete`), the stateless
//! `/chat` pass-through, and health/metrics probes.

pub mod http;
pub mod metrics;
pub mod session;
pub mod state;

pub use http::create_router;
pub use metrics::{init_metrics, metrics_handler};
pub use session::{start_cleanup_task, InMemorySessionStore, SessionStore};
pub use state::AppState;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use finassist_core::SlotId;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("session_id is required")]
    MissingSessionId,

    #[error("message is required")]
    MissingMessage,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("No active session: {0}")]
    NoActiveSession(String),

    #[error("Transaction is incomplete")]
    IncompleteRecord { missing: Vec<SlotId> },

    #[error("Maximum number of sessions reached")]
    SessionLimit,

    #[error("LLM provider error: {0}")]
    Provider(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::MissingSessionId
            | ServerError::MissingMessage
            | ServerError::InvalidRequest(_)
            | ServerError::IncompleteRecord { .. } => StatusCode::BAD_REQUEST,
            ServerError::NoActiveSession(_) => StatusCode::NOT_FOUND,
            ServerError::SessionLimit => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Provider(_) => StatusCode::BAD_GATEWAY,
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable reason code
    pub fn reason(&self) -> &'static str {
        match self {
            ServerError::MissingSessionId => "missing_session_id",
            ServerError::MissingMessage => "missing_message",
            ServerError::InvalidRequest(_) => "invalid_request",
            ServerError::NoActiveSession(_) => "no_active_session",
            ServerError::IncompleteRecord { .. } => "incomplete_record",
            ServerError::SessionLimit => "session_limit",
            ServerError::Provider(_) => "provider_error",
            ServerError::Internal(_) => "internal_error",
        }
    }
}

impl From<finassist_core::Error> for ServerError {
    fn from(err: finassist_core::Error) -> Self {
        use finassist_core::Error;
        match err {
            Error::NoActiveSession(id) => ServerError::NoActiveSession(id),
            Error::IncompleteRecord { missing } => ServerError::IncompleteRecord { missing },
            Error::InvalidInput(msg) => ServerError::InvalidRequest(msg),
            Error::Validation(e) => ServerError::InvalidRequest(e.to_string()),
            Error::Internal(msg) => ServerError::Internal(msg),
        }
    }
}

impl From<ServerError> for StatusCode {
    fn from(err: ServerError) -> Self {
        err.status()
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = match &self {
            ServerError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = serde_json::json!({
            "error": error,
            "reason": self.reason(),
        });
        if let ServerError::IncompleteRecord { missing } = &self {
            body["missing_fields"] = serde_json::json!(missing);
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServerError::MissingSessionId.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ServerError::NoActiveSession("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(ServerError::SessionLimit.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            ServerError::Provider("down".into()).status(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_from_core_error() {
        let err: ServerError = finassist_core::Error::IncompleteRecord {
            missing: vec![SlotId::Amount],
        }
        .into();
        assert_eq!(err.reason(), "incomplete_record");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
