//! Router assembly.
//!
//! API routes under `/api`, the realtime channel at `/api/ws`, and the built
//! frontend served as static files from `STATIC_DIR` (default `dist`) for
//! everything else.

pub mod ai;
pub mod execute;
pub mod ws;

use std::path::PathBuf;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let static_files = ServeDir::new(static_dir()).append_index_html_on_directories(true);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/session", get(session))
        .route("/api/ws", get(ws::handle_ws))
        .route("/api/execute", post(execute::execute))
        .route("/api/ai/breakdown", post(ai::breakdown))
        .route("/api/ai/review", post(ai::review))
        .route("/api/ai/chat", post(ai::chat))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
        .fallback_service(static_files)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

/// Read-only view of the live session, for inspection and debugging.
async fn session(State(state): State<AppState>) -> Response {
    match state.relay.snapshot().await {
        Some(snapshot) => Json(snapshot).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

/// Resolve the directory holding the built frontend.
fn static_dir() -> PathBuf {
    std::env::var("STATIC_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dist"))
}
