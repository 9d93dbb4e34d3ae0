//! Error taxonomy for grounded chat.

use std::fmt;

use serde::Serialize;

use super::RunStatus;

/// Errors raised by an [`AssistantProvider`](super::AssistantProvider).
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The request could not be sent or the response body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    /// The provider answered with a non-success status.
    #[error("provider rejected request ({status}): {message}")]
    Rejected {
        /// HTTP status code.
        status: u16,
        /// Error message reported by the provider.
        message: String,
    },

    /// The request could not be built from the caller's input; nothing was sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered successfully but a required field was missing.
    #[error("malformed provider response: {0}")]
    Malformed(String),
}

impl ProviderError {
    /// Whether the failure happened below the API layer.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Orchestration step at which a grounded chat failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Validate,
    CreateContext,
    AppendEntry,
    StartRun,
    PollRun,
    ListEntries,
}

impl Step {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::CreateContext => "create_context",
            Self::AppendEntry => "append_entry",
            Self::StartRun => "start_run",
            Self::PollRun => "poll_run",
            Self::ListEntries => "list_entries",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a grounded chat request.
///
/// Every variant is scoped to the single request that produced it.
#[derive(Debug, thiserror::Error)]
pub enum GroundedChatError {
    /// The request was rejected before any provider call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The provider did not return a usable context id.
    #[error("failed to create conversation context: {detail}")]
    ContextCreation { detail: String },

    /// The provider rejected the user entry.
    #[error("failed to append entry: {detail}")]
    EntryAppend { detail: String },

    /// The provider did not return a run id.
    #[error("failed to start run: {detail}")]
    RunStart { detail: String },

    /// The run reached the `failed` status.
    #[error("assistant run failed with status `{status}`")]
    RunFailed {
        status: RunStatus,
        /// Error message attached to the run by the provider, if any.
        detail: Option<String>,
    },

    /// The poll budget was exhausted before the run reached a terminal status.
    #[error("assistant run did not complete after {attempts} polls (last status `{last_status}`)")]
    RunTimeout { last_status: RunStatus, attempts: u32 },

    /// The caller went away before the run finished.
    #[error("grounded chat cancelled by caller during {step}")]
    Cancelled { step: Step },

    /// Unexpected transport-level failure talking to the provider.
    #[error("provider error during {step}: {source}")]
    Provider {
        step: Step,
        #[source]
        source: ProviderError,
    },
}

impl GroundedChatError {
    /// Map a provider error raised at `step`.
    ///
    /// Transport failures and the read-only steps become [`Self::Provider`];
    /// rejections of the create/append/start calls get their step-specific
    /// variant.
    #[must_use]
    pub fn at_step(step: Step, err: ProviderError) -> Self {
        if err.is_transport() {
            return Self::Provider { step, source: err };
        }
        match step {
            Step::CreateContext => Self::ContextCreation {
                detail: err.to_string(),
            },
            Step::AppendEntry => Self::EntryAppend {
                detail: err.to_string(),
            },
            Step::StartRun => Self::RunStart {
                detail: err.to_string(),
            },
            _ => Self::Provider { step, source: err },
        }
    }

    /// The step that failed.
    #[must_use]
    pub fn step(&self) -> Step {
        match self {
            Self::InvalidRequest(_) => Step::Validate,
            Self::ContextCreation { .. } => Step::CreateContext,
            Self::EntryAppend { .. } => Step::AppendEntry,
            Self::RunStart { .. } => Step::StartRun,
            Self::RunFailed { .. } | Self::RunTimeout { .. } => Step::PollRun,
            Self::Cancelled { step } | Self::Provider { step, .. } => *step,
        }
    }

    /// Detail suitable for rendering a user-facing message.
    #[must_use]
    pub fn provider_detail(&self) -> String {
        match self {
            Self::InvalidRequest(detail)
            | Self::ContextCreation { detail }
            | Self::EntryAppend { detail }
            | Self::RunStart { detail } => detail.clone(),
            Self::RunFailed { status, detail } => match detail {
                Some(d) => format!("{status}: {d}"),
                None => status.to_string(),
            },
            Self::RunTimeout { last_status, .. } => last_status.to_string(),
            Self::Cancelled { .. } => "cancelled".to_string(),
            Self::Provider { source, .. } => source.to_string(),
        }
    }
}
