//! OpenAI HTTP client.
//!
//! Thin wrapper over `reqwest` for the two OpenAI surfaces this service uses:
//!
//! - [`assistants`]: threads, messages and runs (Assistants API v2), exposed
//!   as an [`AssistantProvider`](crate::grounded::AssistantProvider)
//! - [`files`]: file upload with `purpose=assistants`
//!
//! Requests are authenticated with a bearer key. Non-success responses are
//! turned into [`ProviderError::Rejected`] carrying the provider's message.

pub mod assistants;
pub mod files;

pub use assistants::OpenAiAssistants;
pub use files::{FileUploader, UploadedFile};

use serde::de::DeserializeOwned;

use crate::grounded::ProviderError;

/// Default OpenAI API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

/// Header selecting the Assistants API version.
const ASSISTANTS_BETA_HEADER: (&str, &str) = ("OpenAI-Beta", "assistants=v2");

/// OpenAI connection settings.
#[derive(Clone)]
pub struct OpenAiSettings {
    /// Base URL for the API (e.g., `https://api.openai.com`).
    pub base_url: String,
    /// API key for authentication.
    pub api_key: String,
    /// Assistant used for grounded runs.
    pub assistant_id: Option<String>,
}

impl std::fmt::Debug for OpenAiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("assistant_id", &self.assistant_id)
            .finish()
    }
}

/// Shared HTTP client for OpenAI endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    http: reqwest::Client,
    settings: OpenAiSettings,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("settings", &self.settings)
            .finish()
    }
}

impl OpenAiClient {
    /// Create a new client with the given settings.
    #[must_use]
    pub fn new(settings: OpenAiSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    /// Get the connection settings.
    #[must_use]
    pub fn settings(&self) -> &OpenAiSettings {
        &self.settings
    }

    /// Build an absolute URL for an API path such as `/v1/threads`.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.settings.base_url.trim_end_matches('/'), path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .bearer_auth(&self.settings.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(self.url(path))
            .bearer_auth(&self.settings.api_key)
    }
}

/// Send a request and decode a JSON body.
async fn send_json<T: DeserializeOwned>(rb: reqwest::RequestBuilder) -> Result<T, ProviderError> {
    let resp = rb.send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(ProviderError::Rejected {
            status: status.as_u16(),
            message: error_message(&body),
        });
    }
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ProviderError::Malformed(e.to_string()))
}

/// Extract `error.message` from an OpenAI error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}
