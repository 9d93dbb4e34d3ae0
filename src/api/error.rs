//! JSON error responses.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::grounded::{GroundedChatError, Step};

/// Body of every error response.
#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    /// Human-readable summary.
    pub error: String,
    /// Orchestration step that failed, for grounded chat errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<Step>,
    /// Detail reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_detail: Option<String>,
}

/// Error returned by API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                step: None,
                provider_detail: None,
            },
        }
    }

    pub fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    pub fn unavailable(error: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, error)
    }

    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.body.provider_detail = Some(detail.into());
        self
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn body(&self) -> &ErrorBody {
        &self.body
    }
}

impl From<GroundedChatError> for ApiError {
    fn from(err: GroundedChatError) -> Self {
        let status = match &err {
            GroundedChatError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GroundedChatError::RunTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            GroundedChatError::Cancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
            GroundedChatError::ContextCreation { .. }
            | GroundedChatError::EntryAppend { .. }
            | GroundedChatError::RunStart { .. }
            | GroundedChatError::RunFailed { .. }
            | GroundedChatError::Provider { .. } => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                step: Some(err.step()),
                provider_detail: Some(err.provider_detail()),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
