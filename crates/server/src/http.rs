//! HTTP Endpoints
//!
//! REST API for the transfer assistant.

use axum::{
    extract::{rejection::JsonRejection, Json, Path, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use finassist_agent::{prompts::CHAT_SYSTEM_PROMPT, sanitize_prompt, strip_code_fence};
use finassist_core::{DialogState, SlotId, TransactionRecord, TransferRequest, SUCCESS_MESSAGE};
use finassist_llm::{ImageInput, Message};

use crate::metrics::metrics_handler;
use crate::state::AppState;
use crate::ServerError;

/// Reply marker the chat instruction asks the model to emit on confirmation
const CHAT_SUCCESS_MARKER: &str = "Transfer request submitted successfully";

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors_layer = build_cors_layer(&server.cors_origins, server.cors_enabled);

    // Room for a full provider call plus slack
    let request_timeout = state.config.llm.call_budget() + Duration::from_secs(10);

    Router::new()
        // Slot-filling flow
        .route("/start", post(start))
        .route("/process", post(process))
        .route("/complete", post(complete))
        // Stateless pass-through
        .route("/chat", post(chat))
        // Session inspection
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        // Probes
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(cors_layer)
        .with_state(state)
}

/// Build CORS layer from configured origins
///
/// - disabled: no cross-origin access
/// - no origins configured: any origin
/// - otherwise the listed origins
fn build_cors_layer(origins: &[String], enabled: bool) -> CorsLayer {
    if !enabled {
        tracing::info!("CORS disabled");
        return CorsLayer::new();
    }

    if origins.is_empty() {
        tracing::info!("No CORS origins configured, allowing any origin");
        return CorsLayer::permissive();
    }

    let parsed_origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("Invalid CORS origin: {}", origin);
                None
            })
        })
        .collect();

    if parsed_origins.is_empty() {
        tracing::error!("All configured CORS origins are invalid, allowing any origin");
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured with {} origins", parsed_origins.len());
    CorsLayer::new()
        .allow_origin(parsed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any)
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ServerError::InvalidRequest(e.body_text()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Serialize)]
struct StartResponse {
    session_id: String,
    next_prompt: String,
}

/// POST /start
async fn start(State(state): State<AppState>) -> Result<Json<StartResponse>, ServerError> {
    let (session, prompt) = state.controller.start();
    let session_id = session.id.clone();
    state.sessions.create(session).await?;

    Ok(Json(StartResponse {
        session_id,
        next_prompt: prompt,
    }))
}

#[derive(Debug, Deserialize)]
struct ProcessRequest {
    session_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProcessResponse {
    session_id: String,
    next_prompt: String,
    state: DialogState,
    transaction_info: TransactionRecord,
    missing_fields: Vec<SlotId>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    validation_errors: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<TransferRequest>,
}

/// POST /process
async fn process(
    State(state): State<AppState>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<Json<ProcessResponse>, ServerError> {
    let request = json_body(payload)?;
    let session_id = non_empty(request.session_id).ok_or(ServerError::MissingSessionId)?;
    let message = non_empty(request.message).ok_or(ServerError::MissingMessage)?;

    let mut session = state
        .sessions
        .load(&session_id)
        .await?
        .ok_or_else(|| ServerError::NoActiveSession(session_id.clone()))?;

    let outcome = state.controller.handle_message(&mut session, &message).await?;

    let response = ProcessResponse {
        session_id: session.id.clone(),
        next_prompt: outcome.reply,
        state: outcome.state,
        transaction_info: session.record.clone(),
        missing_fields: state.controller.missing_fields(&session),
        validation_errors: outcome.errors.iter().map(|e| e.to_string()).collect(),
        result: outcome.payload,
    };

    if outcome.state.is_terminal() {
        state.sessions.remove(&session_id).await?;
    } else {
        state.sessions.save(session).await?;
    }

    Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct CompleteRequest {
    session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompleteResponse {
    #[serde(flatten)]
    request: TransferRequest,
    session_id: String,
    transaction_info: TransactionRecord,
}

/// POST /complete
async fn complete(
    State(state): State<AppState>,
    payload: Result<Json<CompleteRequest>, JsonRejection>,
) -> Result<Json<CompleteResponse>, ServerError> {
    let request = json_body(payload)?;
    let session_id = non_empty(request.session_id).ok_or(ServerError::MissingSessionId)?;

    let mut session = state
        .sessions
        .load(&session_id)
        .await?
        .ok_or_else(|| ServerError::NoActiveSession(session_id.clone()))?;

    let outcome = state.controller.complete(&mut session)?;
    let request = outcome
        .payload
        .ok_or_else(|| ServerError::Internal("completion produced no payload".to_string()))?;

    state.sessions.remove(&session_id).await?;

    Ok(Json(CompleteResponse {
        request,
        session_id,
        transaction_info: session.record,
    }))
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    prompt: Option<String>,
    /// Base64 image, optionally as a data URL
    image: Option<String>,
}

/// POST /chat
///
/// Single provider call with the FinAssist instruction. A confirmed
/// transfer comes back as JSON and is relayed with 201.
async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ServerError> {
    let request = json_body(payload)?;
    let prompt = request
        .prompt
        .map(|p| sanitize_prompt(&p))
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ServerError::InvalidRequest("prompt is required".to_string()))?;

    let mut user = Message::user(prompt);
    if let Some(image) = non_empty(request.image) {
        let image = ImageInput::from_base64(&image)
            .map_err(|e| ServerError::InvalidRequest(e.to_string()))?;
        user = user.with_image(image);
    }

    let messages = [Message::system(CHAT_SYSTEM_PROMPT), user];
    let generation = state.llm.generate(&messages).await.map_err(|e| {
        tracing::warn!(error = %e, "Chat completion failed");
        ServerError::Provider(e.to_string())
    })?;

    let text = generation.text.trim().to_string();
    if text.contains(CHAT_SUCCESS_MARKER) {
        if let Ok(serde_json::Value::Object(reply)) =
            serde_json::from_str::<serde_json::Value>(strip_code_fence(&text))
        {
            let status = reply
                .get("status")
                .cloned()
                .unwrap_or_else(|| serde_json::Value::from("success"));
            let message = reply
                .get("message")
                .cloned()
                .unwrap_or_else(|| serde_json::Value::from(SUCCESS_MESSAGE));
            let data = reply
                .get("data")
                .cloned()
                .unwrap_or_else(|| serde_json::Value::Object(reply.clone()));
            let body = serde_json::json!({
                "status": status,
                "message": message,
                "data": data,
            });
            tracing::info!("Chat produced a transfer request");
            return Ok((StatusCode::CREATED, Json(body)).into_response());
        }
    }

    Ok(Json(serde_json::json!({ "response": text })).into_response())
}

/// GET /api/sessions/:id
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let session = state
        .sessions
        .load(&id)
        .await?
        .ok_or_else(|| ServerError::NoActiveSession(id.clone()))?;

    Ok(Json(serde_json::json!({
        "session_id": session.id,
        "state": session.state,
        "transaction_info": session.record,
        "missing_fields": state.controller.missing_fields(&session),
        "turn_count": session.transcript.user_turn_count(),
    })))
}

/// DELETE /api/sessions/:id
async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let mut session = state
        .sessions
        .load(&id)
        .await?
        .ok_or_else(|| ServerError::NoActiveSession(id.clone()))?;

    state.controller.cancel(&mut session)?;
    state.sessions.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /health
async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.sessions.count(),
    }))
}

/// GET /ready
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    let available = tokio::time::timeout(Duration::from_secs(5), state.llm.is_available())
        .await
        .unwrap_or(false);

    let status_code = if available {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(serde_json::json!({
            "status": if available { "ready" } else { "not_ready" },
            "checks": {
                "llm_backend": {
                    "status": if available { "ok" } else { "unreachable" },
                    "provider": state.config.llm.provider.as_str(),
                    "model": state.llm.model_name(),
                }
            }
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use finassist_config::Settings;
    use finassist_llm::{FinishReason, GenerationResult, LlmBackend, LlmError};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use tower::ServiceExt;

    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<String, LlmError>>>,
        available: bool,
    }

    #[async_trait]
    impl LlmBackend for ScriptedLlm {
        async fn generate(&self, _messages: &[Message]) -> Result<GenerationResult, LlmError> {
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(LlmError::Network("no reply scripted".to_string())));
            reply.map(|text| GenerationResult {
                text,
                tokens: 0,
                total_time_ms: 0,
                finish_reason: FinishReason::Stop,
            })
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn app(replies: Vec<Result<&str, LlmError>>) -> Router {
        let llm = Arc::new(ScriptedLlm {
            replies: Mutex::new(replies.into_iter().map(|r| r.map(str::to_string)).collect()),
            available: true,
        });
        create_router(AppState::new(Settings::default(), llm))
    }

    async fn send(
        app: &Router,
        method: Method,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, serde_json::Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(match body {
                Some(json) => Body::from(json.to_string()),
                None => Body::empty(),
            })
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    async fn start_session(app: &Router) -> String {
        let (status, body) = send(app, Method::POST, "/start", None).await;
        assert_eq!(status, StatusCode::OK);
        body["session_id"].as_str().unwrap().to_string()
    }

    const FULL_RECORD: &str = r#"{"beneficiary_name": "John", "beneficiary_account": "123456789012", "beneficiary_ifsc": "HDFC0001234", "amount": "5000", "from_account": "987654321098", "remarks": "rent"}"#;

    #[tokio::test]
    async fn test_health() {
        let app = app(vec![]);
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_ready() {
        let app = app(vec![]);
        let (status, body) = send(&app, Method::GET, "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["llm_backend"]["model"], "scripted");
    }

    #[tokio::test]
    async fn test_start_and_process_flow() {
        let app = app(vec![Ok(r#"{"beneficiary_name": "Asha"}"#), Ok(FULL_RECORD)]);
        let id = start_session(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "to asha"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "collecting");
        assert_eq!(body["transaction_info"]["beneficiary_name"], "Asha");
        assert_eq!(
            body["next_prompt"],
            "What is the account number of the recipient?"
        );

        let (_, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "rest of it"})),
        )
        .await;
        assert_eq!(body["state"], "awaiting_confirmation");
        assert_eq!(body["missing_fields"], serde_json::json!([]));

        let (status, body) = send(
            &app,
            Method::POST,
            "/complete",
            Some(serde_json::json!({"session_id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["userAccountNumber"], "XXXXXXXX1098");
        assert_eq!(body["data"]["purposeOfTransfer"], "rent");

        let (status, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["reason"], "no_active_session");
    }

    #[tokio::test]
    async fn test_process_bad_requests() {
        let app = app(vec![]);

        let (status, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "missing_session_id");

        let (status, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": "abc", "message": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "missing_message");

        let (status, _) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": "unknown", "message": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_complete_incomplete_record() {
        let app = app(vec![Ok(r#"{"beneficiary_name": "Asha", "amount": "400"}"#)]);
        let id = start_session(&app).await;
        send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "400 to asha"})),
        )
        .await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/complete",
            Some(serde_json::json!({"session_id": id})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["reason"], "incomplete_record");
        assert_eq!(
            body["missing_fields"],
            serde_json::json!(["beneficiary_account", "beneficiary_ifsc", "from_account"])
        );

        // Same check through the confirm command
        let (status, _) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "confirm"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_cancel_removes_session() {
        let app = app(vec![]);
        let id = start_session(&app).await;

        let (status, body) = send(
            &app,
            Method::POST,
            "/process",
            Some(serde_json::json!({"session_id": id, "message": "cancel"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "cancelled");

        let (status, _) = send(&app, Method::GET, &format!("/api/sessions/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_session_inspect_and_delete() {
        let app = app(vec![]);
        let id = start_session(&app).await;
        let uri = format!("/api/sessions/{}", id);

        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"], "collecting");
        assert_eq!(body["turn_count"], 0);
        assert_eq!(body["missing_fields"][0], "beneficiary_name");

        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_chat_plain_reply() {
        let app = app(vec![Ok("Who would you like to send money to?")]);
        let (status, body) = send(
            &app,
            Method::POST,
            "/chat",
            Some(serde_json::json!({"prompt": "I want to send money"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["response"], "Who would you like to send money to?");
    }

    #[tokio::test]
    async fn test_chat_transfer_json() {
        let reply = r#"```json
{"status": "success", "message": "Transfer request submitted successfully.", "data": {"beneficiaryName": "Asha", "transferAmount": 500}}
```"#;
        let app = app(vec![Ok(reply)]);
        let (status, body) = send(
            &app,
            Method::POST,
            "/chat",
            Some(serde_json::json!({"prompt": "yes, confirm"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "success");
        assert_eq!(body["data"]["beneficiaryName"], "Asha");
    }

    #[tokio::test]
    async fn test_chat_errors() {
        let app = app(vec![Err(LlmError::EmptyResponse("blocked".to_string()))]);

        let (status, _) = send(
            &app,
            Method::POST,
            "/chat",
            Some(serde_json::json!({"prompt": "{{}}"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, Method::POST, "/chat", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            Method::POST,
            "/chat",
            Some(serde_json::json!({"prompt": "hello"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["reason"], "provider_error");
    }

    #[tokio::test]
    async fn test_metrics_disabled_without_recorder() {
        let app = app(vec![]);
        let (status, _) = send(&app, Method::GET, "/metrics", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
