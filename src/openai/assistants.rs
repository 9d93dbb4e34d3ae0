//! OpenAI Assistants API (v2) provider.
//!
//! Maps the grounded-chat capability onto threads, messages and runs:
//!
//! | capability       | endpoint                                   |
//! |------------------|--------------------------------------------|
//! | `create_context` | `POST /v1/threads`                         |
//! | `append_entry`   | `POST /v1/threads/{thread}/messages`       |
//! | `start_run`      | `POST /v1/threads/{thread}/runs`           |
//! | `get_run_status` | `GET /v1/threads/{thread}/runs/{run}`      |
//! | `list_entries`   | `GET /v1/threads/{thread}/messages`        |

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ASSISTANTS_BETA_HEADER, OpenAiClient, send_json};
use crate::grounded::{
    AssistantProvider, ContextId, Entry, EntryRole, FileReference, ProviderError, Run, RunId,
    RunStatus, RunStatusReport,
};

/// Page size when listing thread messages. A fresh thread holds the user
/// message and the assistant replies, so one page is plenty.
const MESSAGE_PAGE_LIMIT: u32 = 20;

/// [`AssistantProvider`] backed by a fixed OpenAI assistant.
#[derive(Debug, Clone)]
pub struct OpenAiAssistants {
    client: OpenAiClient,
    assistant_id: String,
}

impl OpenAiAssistants {
    /// Create a provider running `assistant_id` for every run.
    #[must_use]
    pub fn new(client: OpenAiClient, assistant_id: impl Into<String>) -> Self {
        Self {
            client,
            assistant_id: assistant_id.into(),
        }
    }

    /// Create a provider from the client's configured assistant, if any.
    #[must_use]
    pub fn from_client(client: OpenAiClient) -> Option<Self> {
        let assistant_id = client.settings().assistant_id.clone()?;
        Some(Self::new(client, assistant_id))
    }

    /// Get the assistant id used for runs.
    #[must_use]
    pub fn assistant_id(&self) -> &str {
        &self.assistant_id
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ThreadObject {
    id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateMessageBody<'a> {
    role: EntryRole,
    content: &'a str,
    attachments: Vec<Attachment<'a>>,
}

#[derive(Debug, Serialize)]
struct Attachment<'a> {
    file_id: &'a str,
    tools: [AttachmentTool; 1],
}

#[derive(Debug, Serialize)]
struct AttachmentTool {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl AttachmentTool {
    const FILE_SEARCH: Self = Self {
        kind: "file_search",
    };
}

#[derive(Debug, Serialize)]
struct CreateRunBody<'a> {
    assistant_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct RunObject {
    id: Option<String>,
    status: Option<RunStatus>,
    #[serde(default)]
    last_error: Option<RunError>,
}

#[derive(Debug, Deserialize)]
struct RunError {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl RunError {
    fn describe(self) -> Option<String> {
        match (self.code, self.message) {
            (Some(code), Some(message)) => Some(format!("{code}: {message}")),
            (None, Some(message)) => Some(message),
            (Some(code), None) => Some(code),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MessageList {
    #[serde(default)]
    data: Vec<MessageObject>,
}

#[derive(Debug, Deserialize)]
struct MessageObject {
    role: EntryRole,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    attachments: Vec<MessageAttachment>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: TextBlock },
    #[serde(other)]
    Unsupported,
}

#[derive(Debug, Deserialize)]
struct TextBlock {
    value: String,
}

#[derive(Debug, Deserialize)]
struct MessageAttachment {
    file_id: String,
}

impl From<MessageObject> for Entry {
    fn from(msg: MessageObject) -> Self {
        // The first content block carries the answer; images and other block
        // kinds have no text.
        let content = match msg.content.into_iter().next() {
            Some(ContentBlock::Text { text }) => text.value,
            _ => String::new(),
        };
        Self {
            role: msg.role,
            content,
            file_references: msg
                .attachments
                .into_iter()
                .map(|a| FileReference::new(a.file_id))
                .collect(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Capability
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl AssistantProvider for OpenAiAssistants {
    async fn create_context(&self) -> Result<ContextId, ProviderError> {
        let thread: ThreadObject = send_json(
            self.client
                .post("/v1/threads")
                .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
                .json(&serde_json::json!({})),
        )
        .await?;

        thread
            .id
            .filter(|id| !id.is_empty())
            .map(ContextId::new)
            .ok_or_else(|| ProviderError::Malformed("thread response has no id".to_string()))
    }

    async fn append_entry(
        &self,
        context: &ContextId,
        role: EntryRole,
        content: &str,
        file_references: &[FileReference],
    ) -> Result<(), ProviderError> {
        let body = CreateMessageBody {
            role,
            content,
            attachments: file_references
                .iter()
                .map(|f| Attachment {
                    file_id: f.as_str(),
                    tools: [AttachmentTool::FILE_SEARCH],
                })
                .collect(),
        };

        let _: serde_json::Value = send_json(
            self.client
                .post(&format!("/v1/threads/{context}/messages"))
                .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
                .json(&body),
        )
        .await?;
        Ok(())
    }

    async fn start_run(&self, context: &ContextId) -> Result<Run, ProviderError> {
        let run: RunObject = send_json(
            self.client
                .post(&format!("/v1/threads/{context}/runs"))
                .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1)
                .json(&CreateRunBody {
                    assistant_id: &self.assistant_id,
                }),
        )
        .await?;

        let id = run
            .id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ProviderError::Malformed("run response has no id".to_string()))?;

        Ok(Run {
            id: RunId::new(id),
            context_id: context.clone(),
            status: run.status.unwrap_or(RunStatus::Queued),
        })
    }

    async fn get_run_status(
        &self,
        context: &ContextId,
        run: &RunId,
    ) -> Result<RunStatusReport, ProviderError> {
        let run: RunObject = send_json(
            self.client
                .get(&format!("/v1/threads/{context}/runs/{run}"))
                .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1),
        )
        .await?;

        let status = run
            .status
            .ok_or_else(|| ProviderError::Malformed("run response has no status".to_string()))?;

        Ok(RunStatusReport {
            status,
            last_error: run.last_error.and_then(RunError::describe),
        })
    }

    async fn list_entries(&self, context: &ContextId) -> Result<Vec<Entry>, ProviderError> {
        // Newest first, so the latest reply is always on the first page.
        let list: MessageList = send_json(
            self.client
                .get(&format!("/v1/threads/{context}/messages"))
                .query(&[
                    ("order", "desc".to_string()),
                    ("limit", MESSAGE_PAGE_LIMIT.to_string()),
                ])
                .header(ASSISTANTS_BETA_HEADER.0, ASSISTANTS_BETA_HEADER.1),
        )
        .await?;

        let mut entries: Vec<Entry> = list.data.into_iter().map(Entry::from).collect();
        entries.reverse();
        Ok(entries)
    }
}
