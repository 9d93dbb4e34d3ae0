//! Remote assistant capability consumed by the orchestrator.

use async_trait::async_trait;

use super::{ContextId, Entry, EntryRole, FileReference, ProviderError, Run, RunId, RunStatus};

/// Operations the orchestrator needs from an assistant provider.
///
/// Implementations own their model/assistant configuration; the orchestrator
/// never chooses a model. All methods are independent network calls and
/// carry no state between invocations.
#[async_trait]
pub trait AssistantProvider: Send + Sync + std::fmt::Debug {
    /// Create a fresh conversation context.
    async fn create_context(&self) -> Result<ContextId, ProviderError>;

    /// Append an entry to `context`, binding each file for retrieval.
    async fn append_entry(
        &self,
        context: &ContextId,
        role: EntryRole,
        content: &str,
        file_references: &[FileReference],
    ) -> Result<(), ProviderError>;

    /// Start a run over `context` with the provider's fixed configuration.
    async fn start_run(&self, context: &ContextId) -> Result<Run, ProviderError>;

    /// Read the current status of a run. Must not mutate the run.
    async fn get_run_status(
        &self,
        context: &ContextId,
        run: &RunId,
    ) -> Result<RunStatusReport, ProviderError>;

    /// List the entries of `context`, oldest first.
    async fn list_entries(&self, context: &ContextId) -> Result<Vec<Entry>, ProviderError>;
}

/// Result of a single status read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStatusReport {
    pub status: RunStatus,
    /// Provider error message attached to a failed run.
    pub last_error: Option<String>,
}

impl From<RunStatus> for RunStatusReport {
    fn from(status: RunStatus) -> Self {
        Self {
            status,
            last_error: None,
        }
    }
}
