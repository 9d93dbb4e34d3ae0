//! File upload endpoint.
//!
//! Forwards a single multipart file to the provider and returns the file id
//! to attach to later chat requests. Nothing is written to local disk.

use axum::{
    Json,
    extract::{Multipart, State},
    http::StatusCode,
};

use super::error::ApiError;
use crate::AppState;
use crate::grounded::ProviderError;
use crate::openai::UploadedFile;
use mime_guess::Mime;

/// Name of the multipart field carrying the file.
const FILE_FIELD: &str = "file";

/// Upload a file for grounded chat.
///
/// POST /api/upload
pub async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadedFile>, ApiError> {
    let Some(uploader) = &state.uploader else {
        return Err(ApiError::unavailable("OpenAI API key not configured"));
    };
    let max_bytes = state.config.upload.max_file_bytes;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), "File upload error").with_detail(e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field
            .file_name()
            .map_or_else(|| format!("upload-{}", uuid::Uuid::new_v4()), ToString::to_string);
        // Unparseable client types fall back to a guess from the file name.
        let content_type = field
            .content_type()
            .and_then(|ct| ct.parse::<Mime>().ok())
            .unwrap_or_else(|| mime_guess::from_path(&filename).first_or_octet_stream())
            .to_string();

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), "File upload error").with_detail(e.body_text()))?;

        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }
        if data.len() > max_bytes {
            return Err(ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                format!("File exceeds the {max_bytes} byte limit"),
            ));
        }

        tracing::debug!(
            name: "api.upload.received",
            filename = %filename,
            content_type = %content_type,
            size = data.len(),
            "Forwarding upload"
        );

        let uploaded = uploader
            .upload(&filename, &content_type, data.to_vec())
            .await
            .inspect_err(|e| {
                tracing::error!(name: "api.upload.failed", error = %e, "File upload failed");
            })
            .map_err(|e| {
                let status = match e {
                    ProviderError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                    _ => StatusCode::BAD_GATEWAY,
                };
                ApiError::new(status, "Failed to upload file to OpenAI").with_detail(e.to_string())
            })?;

        return Ok(Json(uploaded));
    }

    Err(ApiError::bad_request("No file uploaded"))
}
