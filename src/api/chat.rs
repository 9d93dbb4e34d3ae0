//! Grounded chat endpoint.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

use super::error::ApiError;
use crate::AppState;
use crate::grounded::{FileReference, GroundedAnswer};

/// Request body for `POST /api/chat`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    /// User message.
    #[serde(default)]
    pub message: String,
    /// Previously uploaded files to ground the answer on.
    #[serde(default, alias = "file_ids")]
    pub file_references: Vec<FileReference>,
}

/// Answer a message using retrieval over the attached files.
///
/// POST /api/chat
///
/// The orchestration is tied to this request: if the client disconnects,
/// axum drops the handler and the drop guard cancels polling.
pub async fn chat_handler(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<GroundedAnswer>, ApiError> {
    if req.message.trim().is_empty() {
        return Err(ApiError::bad_request("Message is required"));
    }
    if req.file_references.is_empty() {
        return Err(ApiError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "At least one file reference is required",
        ));
    }
    let Some(orchestrator) = &state.grounded else {
        return Err(ApiError::unavailable(
            "Grounded chat is not configured (OPENAI_API_KEY and OPENAI_ASSISTANT_ID)",
        ));
    };

    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();

    let answer = orchestrator
        .run_grounded_chat(&req.message, req.file_references, cancel)
        .await
        .inspect_err(|e| {
            tracing::error!(
                name: "api.chat.failed",
                step = %e.step(),
                error = %e,
                "Grounded chat failed"
            );
        })?;

    Ok(Json(answer))
}
