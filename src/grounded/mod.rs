//! File-grounded chat orchestration.
//!
//! A grounded chat answers a user message using retrieval over files that were
//! previously uploaded to the provider. The provider holds all state; this
//! module only sequences the calls and interprets their results.
//!
//! # Architecture
//!
//! - [`AssistantProvider`]: the remote capability (contexts, entries, runs)
//! - [`GroundedChatOrchestrator`]: drives one request from context creation
//!   to answer extraction
//! - [`poll`]: interval/budget polling with an injectable sleeper
//!
//! # Example
//!
//! ```rust,ignore
//! use sageai_server::grounded::{FileReference, GroundedChatOrchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = GroundedChatOrchestrator::new(provider, PollPolicy::default());
//! let answer = orchestrator
//!     .run_grounded_chat("Summarise the report", vec![FileReference::new("file-abc")], CancellationToken::new())
//!     .await?;
//! println!("{}", answer.text);
//! ```

pub mod error;
pub mod orchestrator;
pub mod poll;
pub mod provider;

pub use error::{GroundedChatError, ProviderError, Step};
pub use orchestrator::{GroundedChatOrchestrator, NO_RESPONSE_SENTINEL};
pub use poll::{PollOutcome, PollPolicy, Sleeper, TokioSleeper};
pub use provider::{AssistantProvider, RunStatusReport};

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of a remote conversation context (a provider "thread").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContextId(String);

impl ContextId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque identifier of a run executing over a context.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle to a file previously uploaded to the provider.
///
/// File references are owned by the caller; attaching one to an entry grants
/// the run retrieval access to the file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileReference(String);

impl FileReference {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    /// Appended by the orchestrator on behalf of the caller.
    User,
    /// Appended by the provider while a run executes.
    Assistant,
}

/// One message within a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Role of the entry author.
    pub role: EntryRole,
    /// Text content (first text part of the provider message).
    pub content: String,
    /// Files bound to this entry for retrieval.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub file_references: Vec<FileReference>,
}

impl Entry {
    /// Create an assistant entry with the given text.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: EntryRole::Assistant,
            content: content.into(),
            file_references: Vec::new(),
        }
    }

    /// Create a user entry with the given text and file bindings.
    #[must_use]
    pub fn user(content: impl Into<String>, file_references: Vec<FileReference>) -> Self {
        Self {
            role: EntryRole::User,
            content: content.into(),
            file_references,
        }
    }
}

/// Status of a run as reported by the provider.
///
/// Only [`RunStatus::Completed`] and [`RunStatus::Failed`] are terminal.
/// Every other provider status, including ones this crate does not know
/// about, keeps the poll loop going.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    /// Any other status string, preserved verbatim.
    Other(String),
}

impl RunStatus {
    /// Whether polling should stop at this status.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for RunStatus {
    fn from(s: &str) -> Self {
        match s {
            "queued" => Self::Queued,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for RunStatus {
    fn from(s: String) -> Self {
        Self::from(s.as_str())
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Run {
    pub id: RunId,
    pub context_id: ContextId,
    /// Status reported when the run was created.
    pub status: RunStatus,
}

/// Final answer of a grounded chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroundedAnswer {
    /// Text of the most recent assistant entry, or the no-response sentinel.
    pub text: String,
    /// File references exactly as supplied by the caller.
    pub file_references: Vec<FileReference>,
    /// When the answer was extracted.
    pub generated_at: DateTime<Utc>,
}
