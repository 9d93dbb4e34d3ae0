//! Grounded-chat job orchestrator.
//!
//! The orchestrator manages one grounded chat request end to end:
//! 1. Create a conversation context
//! 2. Append the user message with a retrieval binding per file
//! 3. Start exactly one run
//! 4. Poll the run status until it is terminal or the budget is spent
//! 5. Extract the most recent assistant entry
//!
//! Nothing is cached between calls: the same input replayed twice creates two
//! contexts and two runs.

use std::future::Future;
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use super::poll::{PollOutcome, PollPolicy, Sleeper, TokioSleeper, poll_until};
use super::provider::RunStatusReport;
use super::{
    AssistantProvider, Entry, EntryRole, FileReference, GroundedAnswer, GroundedChatError,
    ProviderError, RunStatus, Step,
};

/// Answer returned when a completed run left no assistant text.
pub const NO_RESPONSE_SENTINEL: &str = "No response from assistant.";

/// Drives grounded chat requests against an [`AssistantProvider`].
///
/// Cloning is cheap; clones share the provider and sleeper.
#[derive(Clone)]
pub struct GroundedChatOrchestrator {
    provider: Arc<dyn AssistantProvider>,
    sleeper: Arc<dyn Sleeper>,
    policy: PollPolicy,
}

#[allow(clippy::missing_fields_in_debug)]
impl std::fmt::Debug for GroundedChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundedChatOrchestrator")
            .field("provider", &self.provider)
            .field("policy", &self.policy)
            .finish()
    }
}

impl GroundedChatOrchestrator {
    /// Create an orchestrator that sleeps on the tokio timer.
    pub fn new(provider: Arc<dyn AssistantProvider>, policy: PollPolicy) -> Self {
        Self::with_sleeper(provider, policy, Arc::new(TokioSleeper))
    }

    /// Create an orchestrator with a custom sleeper.
    pub fn with_sleeper(
        provider: Arc<dyn AssistantProvider>,
        policy: PollPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            provider,
            sleeper,
            policy,
        }
    }

    /// Get the poll policy.
    #[must_use]
    pub fn policy(&self) -> &PollPolicy {
        &self.policy
    }

    /// Answer `message` using retrieval over `file_references`.
    ///
    /// Cancelling `cancel` abandons the request at the next suspension point
    /// with [`GroundedChatError::Cancelled`] naming the interrupted step. The remote run is left to the
    /// provider.
    #[instrument(
        skip(self, message, file_references, cancel),
        fields(
            request_id = %Uuid::new_v4(),
            file_count = file_references.len(),
            context_id = tracing::field::Empty,
            run_id = tracing::field::Empty
        )
    )]
    pub async fn run_grounded_chat(
        &self,
        message: &str,
        file_references: Vec<FileReference>,
        cancel: CancellationToken,
    ) -> Result<GroundedAnswer, GroundedChatError> {
        if message.trim().is_empty() {
            return Err(GroundedChatError::InvalidRequest(
                "message is required".to_string(),
            ));
        }
        if file_references.is_empty() {
            return Err(GroundedChatError::InvalidRequest(
                "grounded chat needs at least one file reference".to_string(),
            ));
        }

        // 1. Context
        let context = self
            .step(Step::CreateContext, &cancel, self.provider.create_context())
            .await?;
        tracing::Span::current().record("context_id", context.as_str());
        tracing::debug!(name: "grounded.context.created", "Conversation context created");

        // 2. User entry with retrieval bindings
        self.step(
            Step::AppendEntry,
            &cancel,
            self.provider
                .append_entry(&context, EntryRole::User, message, &file_references),
        )
        .await?;
        tracing::debug!(name: "grounded.entry.appended", "User entry appended");

        // 3. The single run for this request
        let run = self
            .step(Step::StartRun, &cancel, self.provider.start_run(&context))
            .await?;
        tracing::Span::current().record("run_id", run.id.as_str());
        tracing::info!(
            name: "grounded.run.started",
            status = %run.status,
            "Assistant run started"
        );

        // 4. Poll
        let outcome = poll_until(
            &self.policy,
            self.sleeper.as_ref(),
            &cancel,
            RunStatusReport::from(run.status.clone()),
            |attempt| {
                tracing::trace!(attempt, "Polling run status");
                self.provider.get_run_status(&context, &run.id)
            },
            |report| report.status.is_terminal(),
        )
        .await
        .map_err(|e| GroundedChatError::at_step(Step::PollRun, e))?;

        match outcome {
            PollOutcome::Ready { value, attempts } => {
                if value.status == RunStatus::Failed {
                    tracing::warn!(
                        name: "grounded.run.failed",
                        attempts,
                        error = ?value.last_error,
                        "Assistant run failed"
                    );
                    return Err(GroundedChatError::RunFailed {
                        status: value.status,
                        detail: value.last_error,
                    });
                }
                tracing::info!(name: "grounded.run.completed", attempts, "Assistant run completed");
            }
            PollOutcome::Exhausted { last, attempts } => {
                tracing::warn!(
                    name: "grounded.run.timeout",
                    attempts,
                    last_status = %last.status,
                    "Assistant run did not complete"
                );
                return Err(GroundedChatError::RunTimeout {
                    last_status: last.status,
                    attempts,
                });
            }
            PollOutcome::Cancelled { attempts } => {
                tracing::info!(name: "grounded.cancelled", attempts, "Caller cancelled grounded chat");
                return Err(GroundedChatError::Cancelled {
                    step: Step::PollRun,
                });
            }
        }

        // 5. Answer
        let entries = self
            .step(Step::ListEntries, &cancel, self.provider.list_entries(&context))
            .await?;
        let text = latest_assistant_text(&entries).map_or_else(
            || {
                tracing::warn!(
                    name: "grounded.answer.missing",
                    entry_count = entries.len(),
                    "Run completed without assistant text"
                );
                NO_RESPONSE_SENTINEL.to_string()
            },
            ToString::to_string,
        );

        Ok(GroundedAnswer {
            text,
            file_references,
            generated_at: Utc::now(),
        })
    }

    /// Await a provider call unless the caller cancels first.
    async fn step<T>(
        &self,
        step: Step,
        cancel: &CancellationToken,
        call: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, GroundedChatError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(GroundedChatError::Cancelled { step }),
            result = call => result.map_err(|e| {
                tracing::error!(name: "grounded.step.failed", step = %step, error = %e, "Provider call failed");
                GroundedChatError::at_step(step, e)
            }),
        }
    }
}

/// Text of the most recent assistant entry, if it has any.
fn latest_assistant_text(entries: &[Entry]) -> Option<&str> {
    entries
        .iter()
        .rev()
        .find(|e| e.role == EntryRole::Assistant)
        .map(|e| e.content.as_str())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grounded::{ContextId, Run, RunId};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted provider recording every call.
    #[derive(Debug, Default)]
    struct ScriptedProvider {
        initial_status: Mutex<Option<RunStatus>>,
        statuses: Mutex<VecDeque<RunStatus>>,
        entries: Mutex<Vec<Entry>>,
        fail_append: bool,
        fail_start_run: bool,
        stall_start_run: bool,
        calls: Mutex<Vec<String>>,
        appended: Mutex<Vec<(String, Vec<FileReference>)>>,
    }

    impl ScriptedProvider {
        fn with_statuses(statuses: &[RunStatus], entries: Vec<Entry>) -> Self {
            Self {
                statuses: Mutex::new(statuses.iter().cloned().collect()),
                entries: Mutex::new(entries),
                ..Self::default()
            }
        }

        fn count(&self, call: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
        }
    }

    #[async_trait]
    impl AssistantProvider for ScriptedProvider {
        async fn create_context(&self) -> Result<ContextId, ProviderError> {
            let mut calls = self.calls.lock().unwrap();
            calls.push("create_context".to_string());
            Ok(ContextId::new(format!("thread_{}", calls.len())))
        }

        async fn append_entry(
            &self,
            _context: &ContextId,
            _role: EntryRole,
            content: &str,
            file_references: &[FileReference],
        ) -> Result<(), ProviderError> {
            self.calls.lock().unwrap().push("append_entry".to_string());
            if self.fail_append {
                return Err(ProviderError::Rejected {
                    status: 400,
                    message: "No file with id 'file-missing'".to_string(),
                });
            }
            self.appended
                .lock()
                .unwrap()
                .push((content.to_string(), file_references.to_vec()));
            Ok(())
        }

        async fn start_run(&self, context: &ContextId) -> Result<Run, ProviderError> {
            self.calls.lock().unwrap().push("start_run".to_string());
            if self.stall_start_run {
                std::future::pending::<()>().await;
            }
            if self.fail_start_run {
                return Err(ProviderError::Malformed("run response has no id".to_string()));
            }
            Ok(Run {
                id: RunId::new("run_1"),
                context_id: context.clone(),
                status: self
                    .initial_status
                    .lock()
                    .unwrap()
                    .clone()
                    .unwrap_or(RunStatus::Queued),
            })
        }

        async fn get_run_status(
            &self,
            _context: &ContextId,
            _run: &RunId,
        ) -> Result<RunStatusReport, ProviderError> {
            self.calls.lock().unwrap().push("get_run_status".to_string());
            let status = self
                .statuses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RunStatus::InProgress);
            let last_error = (status == RunStatus::Failed).then(|| "rate limited".to_string());
            Ok(RunStatusReport { status, last_error })
        }

        async fn list_entries(&self, _context: &ContextId) -> Result<Vec<Entry>, ProviderError> {
            self.calls.lock().unwrap().push("list_entries".to_string());
            Ok(self.entries.lock().unwrap().clone())
        }
    }

    #[derive(Debug, Default)]
    struct InstantSleeper;

    #[async_trait]
    impl Sleeper for InstantSleeper {
        async fn sleep(&self, _duration: Duration) {}
    }

    fn orchestrator(provider: &Arc<ScriptedProvider>) -> GroundedChatOrchestrator {
        GroundedChatOrchestrator::with_sleeper(
            Arc::clone(provider) as Arc<dyn AssistantProvider>,
            PollPolicy::default(),
            Arc::new(InstantSleeper),
        )
    }

    fn files() -> Vec<FileReference> {
        vec![FileReference::new("file-a"), FileReference::new("file-b")]
    }

    #[tokio::test]
    async fn test_returns_latest_assistant_entry() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[RunStatus::InProgress, RunStatus::Completed],
            vec![
                Entry::assistant("earlier answer"),
                Entry::user("question", files()),
                Entry::assistant("latest answer"),
            ],
        ));

        let answer = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.text, "latest answer");
        assert_eq!(answer.file_references, files());
        assert_eq!(provider.count("get_run_status"), 2);
        assert_eq!(provider.count("start_run"), 1);
        assert_eq!(
            provider.appended.lock().unwrap()[0],
            ("question".to_string(), files())
        );
    }

    #[tokio::test]
    async fn test_no_assistant_entry_returns_sentinel() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[RunStatus::Completed],
            vec![Entry::user("question", files())],
        ));

        let answer = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.text, NO_RESPONSE_SENTINEL);
    }

    #[tokio::test]
    async fn test_empty_assistant_text_returns_sentinel() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[RunStatus::Completed],
            vec![Entry::assistant("")],
        ));

        let answer = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.text, NO_RESPONSE_SENTINEL);
    }

    #[tokio::test]
    async fn test_failed_run_returns_run_failed() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[RunStatus::Queued, RunStatus::Failed],
            vec![Entry::assistant("should not be read")],
        ));

        let err = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            GroundedChatError::RunFailed { status, detail } => {
                assert_eq!(status, RunStatus::Failed);
                assert_eq!(detail.as_deref(), Some("rate limited"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(provider.count("list_entries"), 0);
    }

    #[tokio::test]
    async fn test_never_terminal_times_out_after_budget() {
        let provider = Arc::new(ScriptedProvider::default());

        let err = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GroundedChatError::RunTimeout {
                last_status: RunStatus::InProgress,
                attempts: 30
            }
        ));
        assert_eq!(provider.count("get_run_status"), 30);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_takes_about_sixty_seconds() {
        let provider = Arc::new(ScriptedProvider::default());
        let orchestrator = GroundedChatOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn AssistantProvider>,
            PollPolicy::default(),
        );
        let start = tokio::time::Instant::now();

        let err = orchestrator
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GroundedChatError::RunTimeout { .. }));
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(60));
        assert!(elapsed < Duration::from_secs(62));
    }

    #[tokio::test]
    async fn test_terminal_status_at_start_skips_polling() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[],
            vec![Entry::assistant("instant")],
        ));
        *provider.initial_status.lock().unwrap() = Some(RunStatus::Completed);

        let answer = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(answer.text, "instant");
        assert_eq!(provider.count("get_run_status"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_poll_stops_within_one_tick() {
        let provider = Arc::new(ScriptedProvider::default());
        let orchestrator = GroundedChatOrchestrator::new(
            Arc::clone(&provider) as Arc<dyn AssistantProvider>,
            PollPolicy::default(),
        );
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_grounded_chat("question", files(), cancel)
                    .await
            })
        };

        // Between the fifth and sixth poll.
        tokio::time::sleep(Duration::from_secs(11)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            GroundedChatError::Cancelled {
                step: Step::PollRun
            }
        ));
        let polls = provider.count("get_run_status");
        assert!((5..=6).contains(&polls), "polled {polls} times");
        assert_eq!(provider.count("list_entries"), 0);
    }

    #[tokio::test]
    async fn test_precancelled_makes_no_calls() {
        let provider = Arc::new(ScriptedProvider::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = orchestrator(&provider)
            .run_grounded_chat("question", files(), cancel)
            .await
            .unwrap_err();

        assert_eq!(err.step(), Step::CreateContext);
        assert!(matches!(err, GroundedChatError::Cancelled { .. }));
        assert!(provider.calls.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_start_run_names_step() {
        let provider = Arc::new(ScriptedProvider {
            stall_start_run: true,
            ..ScriptedProvider::default()
        });
        let orchestrator = orchestrator(&provider);
        let cancel = CancellationToken::new();

        let task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                orchestrator
                    .run_grounded_chat("question", files(), cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        cancel.cancel();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            GroundedChatError::Cancelled {
                step: Step::StartRun
            }
        ));
        assert_eq!(provider.count("get_run_status"), 0);
    }

    #[tokio::test]
    async fn test_missing_run_id_is_run_start_error() {
        let provider = Arc::new(ScriptedProvider {
            fail_start_run: true,
            ..ScriptedProvider::default()
        });

        let err = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GroundedChatError::RunStart { .. }));
        assert_eq!(err.step(), Step::StartRun);
        assert_eq!(provider.count("get_run_status"), 0);
    }

    #[tokio::test]
    async fn test_append_rejection_is_not_retried() {
        let provider = Arc::new(ScriptedProvider {
            fail_append: true,
            ..ScriptedProvider::default()
        });

        let err = orchestrator(&provider)
            .run_grounded_chat("question", files(), CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, GroundedChatError::EntryAppend { .. }));
        assert_eq!(err.step(), Step::AppendEntry);
        assert_eq!(provider.count("append_entry"), 1);
        assert_eq!(provider.count("start_run"), 0);
    }

    #[tokio::test]
    async fn test_replay_creates_independent_contexts() {
        let provider = Arc::new(ScriptedProvider::with_statuses(
            &[RunStatus::Completed, RunStatus::Completed],
            vec![Entry::assistant("answer")],
        ));
        let orchestrator = orchestrator(&provider);

        for _ in 0..2 {
            orchestrator
                .run_grounded_chat("question", files(), CancellationToken::new())
                .await
                .unwrap();
        }

        assert_eq!(provider.count("create_context"), 2);
        assert_eq!(provider.count("start_run"), 2);
    }

    #[tokio::test]
    async fn test_rejects_empty_input_without_calls() {
        let provider = Arc::new(ScriptedProvider::default());
        let orchestrator = orchestrator(&provider);

        let err = orchestrator
            .run_grounded_chat("   ", files(), CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.step(), Step::Validate);

        let err = orchestrator
            .run_grounded_chat("question", Vec::new(), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, GroundedChatError::InvalidRequest(_)));
        assert!(provider.calls.lock().unwrap().is_empty());
    }
}
