//! HTTP chat server.
//!
//! Exposes the chat pipeline as a small JSON API for browser front ends.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Answer `{"message"}` with `{"reply"}` |
//! | `POST` | `/api/chat` | Same as `/chat` |
//! | `POST` | `/api/suggest` | Keyword download suggestions for `{"message"}` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! Errors are a flat JSON object:
//!
//! ```json
//! { "error": "Empty message" }
//! ```
//!
//! An empty or whitespace-only message is `400`. A retrieval failure is
//! `500`. A generation failure is **not** an HTTP error: the reply carries
//! the failure text and the status is `200`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::chat::ChatContext;
use crate::config::ServerConfig;
use crate::suggest::{suggest_downloads, Suggestion};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    chat: Arc<ChatContext>,
}

/// Build the router with all routes and CORS.
pub fn router(chat: Arc<ChatContext>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/api/chat", post(handle_chat))
        .route("/api/suggest", post(handle_suggest))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState { chat })
}

/// Starts the HTTP server on `server.bind_addr()`.
///
/// Runs until the process is terminated. Returns an error if binding fails.
pub async fn run_server(server: &ServerConfig, chat: Arc<ChatContext>) -> anyhow::Result<()> {
    let bind_addr = server.bind_addr();
    let app = router(chat);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "Chat server listening");
    println!("Chat server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

// ============ Request bodies ============

/// Body for `/chat`, `/api/chat` and `/api/suggest`. A missing or `null`
/// `message` is treated as empty.
#[derive(Deserialize)]
struct MessageRequest {
    #[serde(default)]
    message: Option<String>,
}

impl MessageRequest {
    fn text(&self) -> &str {
        self.message.as_deref().unwrap_or("")
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /chat, /api/chat ============

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

/// Handler for `POST /chat` and `POST /api/chat`.
async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(req) = body?;
    let message = req.text();
    if message.trim().is_empty() {
        return Err(bad_request("Empty message"));
    }

    let reply = state.chat.answer(message).await.map_err(|e| {
        error!(error = %e, "chat request failed");
        internal(format!("{:#}", e))
    })?;

    Ok(Json(ChatResponse { reply }))
}

// ============ POST /api/suggest ============

#[derive(Serialize)]
struct SuggestResponse {
    suggestions: Vec<Suggestion>,
}

async fn handle_suggest(
    body: Result<Json<MessageRequest>, JsonRejection>,
) -> Result<Json<SuggestResponse>, AppError> {
    let Json(req) = body?;
    Ok(Json(SuggestResponse {
        suggestions: suggest_downloads(req.text()),
    }))
}
