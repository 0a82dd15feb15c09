//! HTTP/SSE gateway over the assistant.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::channel::mpsc;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::assistant::{Assistant, AssistantError, StreamedTurn, TurnOutcome, TurnRequest};
use crate::dialogue::{NextAction, SessionError, SlotKey, SlotMap};
use crate::locale::Locale;

/// Errors from running the gateway
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway bind error: {0}")]
    Bind(std::io::Error),
    #[error("gateway server error: {0}")]
    Serve(std::io::Error),
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_addr: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8003".to_string(),
        }
    }
}

/// Serve the gateway until the process is stopped.
pub async fn serve(config: GatewayConfig, assistant: Arc<Assistant>) -> Result<(), GatewayError> {
    let listener = TcpListener::bind(config.bind_addr.as_str())
        .await
        .map_err(GatewayError::Bind)?;
    serve_on(listener, assistant).await
}

/// Serve on an already-bound listener.
pub async fn serve_on(
    listener: TcpListener,
    assistant: Arc<Assistant>,
) -> Result<(), GatewayError> {
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("gateway listening on {}", addr);
    }
    let router = router(assistant);
    axum::serve(listener, router.into_make_service())
        .await
        .map_err(GatewayError::Serve)
}

pub fn router(assistant: Arc<Assistant>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/chat/stream", post(chat_stream_handler))
        .route("/confirm", post(confirm_handler))
        .route("/sessions", get(list_sessions_handler))
        .route("/sessions/:id", get(get_session_handler))
        .route("/sessions/:id", delete(delete_session_handler))
        .with_state(assistant)
}

#[derive(Debug, Deserialize)]
struct ChatRequestBody {
    message: String,
    session_id: Option<String>,
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(default = "default_language")]
    language: String,
    user_context: Option<UserContext>,
}

#[derive(Debug, Deserialize)]
struct UserContext {
    allowed_merchant_ids: Option<Vec<String>>,
}

fn default_user_id() -> String {
    "ai-assistant".to_string()
}

fn default_language() -> String {
    "id".to_string()
}

impl ChatRequestBody {
    fn into_turn_request(self) -> TurnRequest {
        TurnRequest {
            message: self.message,
            session_id: self.session_id,
            user_id: self.user_id,
            locale: Locale::parse(&self.language),
            allowed_merchants: self
                .user_context
                .and_then(|context| context.allowed_merchant_ids),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatResponseBody {
    message: String,
    session_id: String,
    collected_data: SlotMap,
    missing_fields: Vec<SlotKey>,
    next_action: NextAction,
    is_complete: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_hit: Option<f64>,
}

impl From<TurnOutcome> for ChatResponseBody {
    fn from(outcome: TurnOutcome) -> Self {
        Self {
            message: outcome.reply,
            session_id: outcome.session_id,
            collected_data: outcome.slots,
            missing_fields: outcome.missing_fields,
            next_action: outcome.next_action,
            is_complete: outcome.is_complete,
            cache_hit: outcome.cache_hit,
        }
    }
}

fn error_status(error: &AssistantError) -> StatusCode {
    match error {
        AssistantError::Session(SessionError::NotFound(_)) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn root_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "service": "lapor",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
    }))
}

async fn health_handler(State(assistant): State<Arc<Assistant>>) -> Json<serde_json::Value> {
    let info = assistant.provider_info();
    Json(serde_json::json!({
        "status": "healthy",
        "provider": info.name,
        "model": info.model,
    }))
}

async fn chat_handler(
    State(assistant): State<Arc<Assistant>>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Json<ChatResponseBody>, StatusCode> {
    let outcome = assistant
        .process_turn(body.into_turn_request())
        .await
        .map_err(|e| {
            tracing::error!("chat turn failed: {}", e);
            error_status(&e)
        })?;
    Ok(Json(outcome.into()))
}

async fn chat_stream_handler(
    State(assistant): State<Arc<Assistant>>,
    Json(body): Json<ChatRequestBody>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = mpsc::unbounded::<Result<Event, Infallible>>();

    tokio::spawn(async move {
        let send = |event: Event| tx.unbounded_send(Ok(event)).is_ok();

        let streamed = match assistant.process_turn_stream(body.into_turn_request()).await {
            Ok(streamed) => streamed,
            Err(e) => {
                let _ = send(
                    Event::default()
                        .event("error")
                        .data(serde_json::json!({ "error": e.to_string() }).to_string()),
                );
                return;
            }
        };

        match streamed {
            StreamedTurn::Immediate(outcome) => {
                send_session_and_cache(&send, &outcome.session_id, outcome.cache_hit);
                let _ = send(
                    Event::default()
                        .data(serde_json::json!({ "chunk": outcome.reply }).to_string()),
                );
                send_done(&send, &outcome);
            }
            StreamedTurn::Streaming {
                session_id,
                cache_hit,
                mut chunks,
            } => {
                send_session_and_cache(&send, &session_id, cache_hit);
                let _ = send(
                    Event::default()
                        .event("status")
                        .data(serde_json::json!({ "status": "Generating response..." }).to_string()),
                );

                let mut reply = String::new();
                while let Some(chunk) = chunks.next().await {
                    match chunk {
                        Ok(text) => {
                            reply.push_str(&text);
                            if !send(
                                Event::default()
                                    .data(serde_json::json!({ "chunk": text }).to_string()),
                            ) {
                                // Client went away; the turn stays half
                                // generated but the session state is already
                                // consistent.
                                return;
                            }
                        }
                        Err(e) => {
                            tracing::warn!("stream chunk error: {}", e);
                            break;
                        }
                    }
                }

                match assistant.finish_turn(&session_id, &reply, cache_hit).await {
                    Ok(outcome) => send_done(&send, &outcome),
                    Err(e) => {
                        let _ = send(
                            Event::default()
                                .event("error")
                                .data(serde_json::json!({ "error": e.to_string() }).to_string()),
                        );
                    }
                }
            }
        }
    });

    Sse::new(rx).keep_alive(KeepAlive::default())
}

fn send_session_and_cache(
    send: &impl Fn(Event) -> bool,
    session_id: &str,
    cache_hit: Option<f64>,
) {
    let _ = send(
        Event::default()
            .event("session")
            .data(serde_json::json!({ "session_id": session_id }).to_string()),
    );
    let cache_payload = match cache_hit {
        Some(similarity) => serde_json::json!({ "cache_hit": true, "similarity": similarity }),
        None => serde_json::json!({ "cache_hit": false }),
    };
    let _ = send(Event::default().event("cache").data(cache_payload.to_string()));
}

fn send_done(send: &impl Fn(Event) -> bool, outcome: &TurnOutcome) {
    let _ = send(
        Event::default().event("done").data(
            serde_json::json!({
                "collected_data": outcome.slots,
                "missing_fields": outcome.missing_fields,
                "next_action": outcome.next_action,
                "is_complete": outcome.is_complete,
            })
            .to_string(),
        ),
    );
}

#[derive(Debug, Deserialize)]
struct ConfirmRequestBody {
    session_id: String,
    #[serde(default = "default_user_id")]
    user_id: String,
}

async fn confirm_handler(
    State(assistant): State<Arc<Assistant>>,
    Json(body): Json<ConfirmRequestBody>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let outcome = assistant
        .confirm(&body.session_id, &body.user_id)
        .await
        .map_err(|e| {
            tracing::error!("confirm failed: {}", e);
            error_status(&e)
        })?;
    Ok(Json(serde_json::to_value(outcome).map_err(|_| {
        StatusCode::INTERNAL_SERVER_ERROR
    })?))
}

async fn list_sessions_handler(
    State(assistant): State<Arc<Assistant>>,
) -> Json<serde_json::Value> {
    let ids = assistant.sessions().list_ids();
    Json(serde_json::json!({ "total": ids.len(), "sessions": ids }))
}

async fn get_session_handler(
    State(assistant): State<Arc<Assistant>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = assistant.sessions().get(&id).ok_or(StatusCode::NOT_FOUND)?;
    serde_json::to_value(session)
        .map(Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

async fn delete_session_handler(
    State(assistant): State<Arc<Assistant>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    if assistant.sessions().delete(&id) {
        Ok(Json(serde_json::json!({ "message": "Session deleted" })))
    } else {
        Err(StatusCode::NOT_FOUND)
    }
}
