//! File upload to the OpenAI Files API.
//!
//! Uploaded files become the [`FileReference`]s that grounded chat attaches
//! to user entries.

use async_trait::async_trait;
use mime_guess::Mime;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use super::{OpenAiClient, send_json};
use crate::grounded::{FileReference, ProviderError};

/// Purpose tag required for files used by assistants.
const ASSISTANTS_PURPOSE: &str = "assistants";

/// A file accepted by the provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadedFile {
    /// Provider-assigned file id.
    pub file_id: FileReference,
    /// Full file object as returned by the provider.
    pub file: serde_json::Value,
}

/// Uploads raw file bytes to a provider.
#[async_trait]
pub trait FileUploader: Send + Sync + std::fmt::Debug {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadedFile, ProviderError>;
}

#[async_trait]
impl FileUploader for OpenAiClient {
    async fn upload(
        &self,
        filename: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<UploadedFile, ProviderError> {
        let mime: Mime = content_type.parse().map_err(|e| {
            ProviderError::InvalidRequest(format!("`{content_type}` is not a valid content type: {e}"))
        })?;
        let size = data.len();
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str(mime.as_ref())?;
        let form = Form::new()
            .text("purpose", ASSISTANTS_PURPOSE)
            .part("file", part);

        let file: serde_json::Value = send_json(self.post("/v1/files").multipart(form)).await?;

        let id = file
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Malformed("file response has no id".to_string()))?
            .to_string();

        tracing::info!(
            name: "openai.file.uploaded",
            file_id = %id,
            filename = %filename,
            size,
            "File uploaded"
        );

        Ok(UploadedFile {
            file_id: FileReference::new(id),
            file,
        })
    }
}
