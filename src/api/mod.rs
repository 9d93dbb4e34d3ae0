//! HTTP API.
//!
//! - `GET /`: service status
//! - `POST /api/chat`: grounded chat over uploaded files
//! - `POST /api/upload`: multipart file upload

pub mod chat;
pub mod error;
pub mod upload;

pub use error::{ApiError, ErrorBody};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Multipart framing allowance on top of the file size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let upload_limit = state
        .config
        .upload
        .max_file_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/", get(status_handler))
        .route("/api/chat", post(chat::chat_handler))
        .route(
            "/api/upload",
            post(upload::upload_handler).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    message: &'static str,
    grounded_chat: bool,
    uploads: bool,
}

async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "SageAI is running",
        grounded_chat: state.grounded.is_some(),
        uploads: state.uploader.is_some(),
    })
}
