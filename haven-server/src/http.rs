//! Haven HTTP server
//!
//! Axum-based server exposing the therapist chat as an HTML form and a JSON API.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to an
//! inner function. The inner functions are directly testable without axum
//! dispatch machinery.
//!
//! HTML endpoints:
//! - GET  /         — chat page with the full transcript
//! - POST /send     — form submit, redirects back to /
//! - GET  /report   — emotion counts
//! - GET|POST /reset — clear the transcript, redirects back to /
//!
//! JSON endpoints:
//! - GET  /health       — backend names and transcript size
//! - GET  /version      — server version info
//! - POST /api/chat     — run one exchange
//! - GET  /api/history  — full transcript
//! - GET  /api/report   — emotion counts
//! - POST /api/reset    — clear the transcript

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use haven_core::{HavenConfig, HavenError, ModelError};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::pages;
use crate::subsystems::chat::ChatService;
use crate::subsystems::report::EmotionReport;

/// Shared state for all HTTP handlers
pub struct HttpState {
    pub chat: ChatService,
    pub config: HavenConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/send", post(send_handler))
        .route("/report", get(report_page_handler))
        .route("/reset", get(reset_page_handler).post(reset_page_handler))
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/api/chat", post(chat_handler))
        .route("/api/history", get(history_handler))
        .route("/api/report", get(report_handler))
        .route("/api/reset", post(reset_handler))
        .with_state(state)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    state: Arc<HttpState>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", state.config.http.host, state.config.http.port);

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Haven listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SendForm {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: Option<String>,
    pub knowledge: Option<String>,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }
}

/// Status code for a failed exchange: caller mistakes are 400, model trouble 502.
pub fn error_status(err: &HavenError) -> StatusCode {
    match err {
        HavenError::EmptyMessage => StatusCode::BAD_REQUEST,
        HavenError::Model(ModelError::Tokenizer(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        HavenError::Model(_) => StatusCode::BAD_GATEWAY,
        HavenError::Config(_) | HavenError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// ============================================================================
// Inner (directly testable) functions
// ============================================================================

/// Inner health — reports backends and transcript size.
pub async fn health_inner(chat: &ChatService) -> (StatusCode, serde_json::Value) {
    (
        StatusCode::OK,
        serde_json::json!({
            "status": "healthy",
            "version": env!("CARGO_PKG_VERSION"),
            "emotion_backend": chat.classifier_name(),
            "generation_backend": chat.generator_name(),
            "turns": chat.turn_count().await,
        }),
    )
}

/// Inner version — returns version info (pure, no IO).
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": "haven/1",
    })
}

/// Inner chat — validates the message and runs one exchange.
pub async fn chat_inner(chat: &ChatService, req: ChatRequest) -> (StatusCode, serde_json::Value) {
    let message = match req.message {
        Some(m) if !m.trim().is_empty() => m,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                serde_json::json!(ErrorResponse::new("message field is required")),
            );
        }
    };

    let start = Instant::now();

    match chat.send(&message, req.knowledge.as_deref()).await {
        Ok(turn) => {
            let took_ms = start.elapsed().as_millis() as u64;
            let mut body = serde_json::json!(turn);
            if let Some(obj) = body.as_object_mut() {
                obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
            }
            (StatusCode::OK, body)
        }
        Err(e) => {
            tracing::error!(error = %e, "Chat exchange failed");
            (error_status(&e), serde_json::json!(ErrorResponse::new(e.to_string())))
        }
    }
}

/// Inner history — the full transcript, oldest first.
pub async fn history_inner(chat: &ChatService) -> serde_json::Value {
    let turns = chat.history().await;
    serde_json::json!({
        "count": turns.len(),
        "turns": turns,
    })
}

/// Inner report — raw counts per emotion label.
pub async fn report_inner(chat: &ChatService) -> serde_json::Value {
    let counts = chat.emotion_counts().await;
    let total: usize = counts.values().sum();
    serde_json::json!({
        "counts": counts,
        "total": total,
    })
}

/// Inner reset — clears the transcript.
pub async fn reset_inner(chat: &ChatService) -> serde_json::Value {
    serde_json::json!({ "cleared": chat.reset().await })
}

// ============================================================================
// HTML handlers
// ============================================================================

pub async fn home_handler(State(state): State<Arc<HttpState>>) -> Html<String> {
    Html(pages::render_home(&state.chat.history().await))
}

pub async fn send_handler(
    State(state): State<Arc<HttpState>>,
    Form(form): Form<SendForm>,
) -> Response {
    match state.chat.send(&form.message, None).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Chat exchange failed");
            (error_status(&e), Html(pages::render_error(&e.to_string()))).into_response()
        }
    }
}

pub async fn report_page_handler(State(state): State<Arc<HttpState>>) -> Html<String> {
    let report = EmotionReport::from_counts(state.chat.emotion_counts().await);
    Html(pages::render_report(&report))
}

pub async fn reset_page_handler(State(state): State<Arc<HttpState>>) -> Redirect {
    state.chat.reset().await;
    Redirect::to("/")
}

// ============================================================================
// JSON handlers (thin — delegate to inner functions)
// ============================================================================

pub async fn health_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = health_inner(&state.chat).await;
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn chat_handler(
    State(state): State<Arc<HttpState>>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    let (status, body) = chat_inner(&state.chat, req).await;
    (status, Json(body))
}

pub async fn history_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(history_inner(&state.chat).await))
}

pub async fn report_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(report_inner(&state.chat).await))
}

pub async fn reset_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(reset_inner(&state.chat).await))
}

// ============================================================================
// Unit Tests — call inner functions directly
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "haven/1", "protocol must be haven/1");
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(error_status(&HavenError::EmptyMessage), StatusCode::BAD_REQUEST);
        assert_eq!(
            error_status(&HavenError::Model(ModelError::EmptyResponse)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            error_status(&HavenError::Model(ModelError::Tokenizer("bad".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_response_shape() {
        let v = serde_json::json!(ErrorResponse::new("nope"));
        assert_eq!(v["error"], "nope");
        assert_eq!(v["status"], "error");
    }
}
