//! Read-only mapping of stored task records to public task status.

use deckflow_core::types::{ContractViolation, TaskResultContract};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use uuid::Uuid;

use crate::{ErrorKind, Result};
use crate::broker::{Stage, TaskBroker, TaskRecord, TaskState};

/// Tracing target for status polling.
const TRACING_TARGET: &str = "deckflow_server::service::poller";

/// Error reported for failed tasks that stored no error text.
const DEFAULT_FAILURE: &str = "task failed";

/// Task state as seen by API clients.
///
/// Moves forward only: `pending`, `progress`, then `success` or `failure`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, AsRefStr, Display
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PublicTaskState {
    /// Queued, or not known to the store.
    Pending,
    /// A stage is running.
    Progress,
    /// The task completed with a valid result.
    Success,
    /// The task failed, was lost, or produced an invalid result.
    Failure,
}

impl PublicTaskState {
    /// Returns true for `success` and `failure`.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }
}

/// Public status of a task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskStatus {
    /// Task id exactly as polled.
    pub task_id: String,
    /// Public state.
    pub state: PublicTaskState,
    /// Running stage, while in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Validated result, on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResultContract>,
    /// Failure description, on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskStatus {
    fn new(task_id: &str, state: PublicTaskState) -> Self {
        Self {
            task_id: task_id.to_owned(),
            state,
            stage: None,
            result: None,
            error: None,
        }
    }

    fn failure(task_id: &str, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(task_id, PublicTaskState::Failure)
        }
    }

    /// Maps a stored record, or its absence, to the public status.
    ///
    /// A completed record only counts as a success if its raw result
    /// satisfies [`TaskResultContract`].
    pub fn from_record(task_id: &str, record: Option<&TaskRecord>) -> Self {
        let Some(record) = record else {
            return Self::new(task_id, PublicTaskState::Pending);
        };

        match record.state {
            TaskState::Queued => Self::new(task_id, PublicTaskState::Pending),
            TaskState::Executing => Self {
                stage: record.stage,
                ..Self::new(task_id, PublicTaskState::Progress)
            },
            TaskState::Completed => {
                let raw = record.result.clone().unwrap_or_default();
                match TaskResultContract::validate(&raw) {
                    Ok(contract) => Self {
                        result: Some(contract),
                        ..Self::new(task_id, PublicTaskState::Success)
                    },
                    Err(violation) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            task_id = %task_id,
                            detail = violation.detail(),
                            "Stored result violates the result contract"
                        );
                        Self::failure(task_id, violation.to_string())
                    }
                }
            }
            TaskState::Errored | TaskState::WorkerLost | TaskState::Cancelled => Self::failure(
                task_id,
                record.error.as_deref().unwrap_or(DEFAULT_FAILURE),
            ),
        }
    }
}

/// Status poller reading task records.
///
/// Never writes to the store.
#[derive(Debug, Clone)]
pub struct StatusPoller {
    broker: TaskBroker,
}

impl StatusPoller {
    /// Creates a new poller over the broker's store.
    pub fn new(broker: TaskBroker) -> Self {
        Self { broker }
    }

    /// Returns the public status of a task.
    ///
    /// Ids that are not valid task ids are reported as `pending`, like any
    /// other unknown id. A stored record that cannot be decoded is reported
    /// as a `failure`. Fails only if the store cannot be read.
    #[tracing::instrument(skip(self), target = TRACING_TARGET)]
    pub async fn get_status(&self, task_id: &str) -> Result<TaskStatus> {
        let Ok(id) = Uuid::parse_str(task_id) else {
            return Ok(TaskStatus::from_record(task_id, None));
        };

        match self.broker.load(id).await {
            Ok(record) => Ok(TaskStatus::from_record(task_id, record.as_ref())),
            Err(error) if error.kind() == ErrorKind::Serialization => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    task_id = %task_id,
                    error = %error,
                    "Stored task record could not be decoded"
                );
                let violation = ContractViolation::new(error.message());
                Ok(TaskStatus::failure(task_id, violation.to_string()))
            }
            Err(error) => Err(error),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::broker::{
        BrokerBackend, MemoryQueue, RequestKind, TaskStore, Transition, TransitionOutcome,
    };

    fn record(transitions: &[Transition]) -> TaskRecord {
        let mut record = TaskRecord::queued(Uuid::now_v7(), RequestKind::Generate);
        for transition in transitions {
            record.apply(transition);
        }
        record
    }

    fn completed(result: serde_json::Value) -> TaskRecord {
        record(&[Transition::Completed { result }])
    }

    #[test]
    fn unknown_and_queued_are_pending() {
        let status = TaskStatus::from_record("missing", None);
        assert_eq!(status.state, PublicTaskState::Pending);

        let queued = record(&[]);
        let status = TaskStatus::from_record("t", Some(&queued));
        assert_eq!(status.state, PublicTaskState::Pending);
        assert_eq!(status.stage, None);
    }

    #[test]
    fn executing_is_progress_with_stage() {
        let executing = record(&[Transition::Executing {
            stage: Stage::Content,
            attempt: 1,
        }]);
        let status = TaskStatus::from_record("t", Some(&executing));
        assert_eq!(status.state, PublicTaskState::Progress);
        assert_eq!(status.stage, Some(Stage::Content));
    }

    #[test]
    fn valid_result_is_success() {
        let record = completed(json!({
            "status": "success",
            "artifact_path": "/srv/out/deck.pptx",
            "message": "Export completed",
        }));
        let status = TaskStatus::from_record("t", Some(&record));
        assert_eq!(status.state, PublicTaskState::Success);
        assert_eq!(
            status.result.and_then(|r| r.artifact_path).as_deref(),
            Some("/srv/out/deck.pptx")
        );
    }

    #[test]
    fn contract_violations_are_failures() {
        for raw in [
            json!({"status": "success", "artifact_path": "/a.pptx", "extra": 1}),
            json!({"artifact_path": "/a.pptx"}),
            json!({"status": "error", "error": "boom"}),
            serde_json::Value::Null,
        ] {
            let record = completed(raw.clone());
            let status = TaskStatus::from_record("t", Some(&record));
            assert_eq!(status.state, PublicTaskState::Failure, "{raw}");
            assert!(
                status
                    .error
                    .as_deref()
                    .is_some_and(|e| e.starts_with("result contract mismatch: ")),
                "{raw}"
            );
        }
    }

    #[test]
    fn failures_carry_stored_error() {
        let errored = record(&[Transition::Errored {
            error: "content stage failed: boom".into(),
        }]);
        let status = TaskStatus::from_record("t", Some(&errored));
        assert_eq!(status.state, PublicTaskState::Failure);
        assert_eq!(status.error.as_deref(), Some("content stage failed: boom"));

        let mut cancelled = record(&[]);
        cancelled.state = TaskState::Cancelled;
        let status = TaskStatus::from_record("t", Some(&cancelled));
        assert_eq!(status.error.as_deref(), Some(DEFAULT_FAILURE));
    }

    #[test]
    fn public_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(PublicTaskState::Progress).unwrap(),
            json!("progress")
        );
    }

    #[tokio::test]
    async fn polling_is_stable_after_terminal_state() -> anyhow::Result<()> {
        let broker = TaskBroker::memory();
        let poller = StatusPoller::new(broker.clone());

        let handle = broker
            .submit(crate::pipeline::WorkflowRequest::Generate {
                prompt: "Rust".into(),
            })
            .await?;
        let task_id = handle.task_id.to_string();
        assert_eq!(
            poller.get_status(&task_id).await?.state,
            PublicTaskState::Pending
        );

        broker
            .transition(
                handle.task_id,
                Transition::Errored {
                    error: "outline stage failed: refused".into(),
                },
            )
            .await?;
        let first = poller.get_status(&task_id).await?;
        let second = poller.get_status(&task_id).await?;
        assert_eq!(first.state, PublicTaskState::Failure);
        assert_eq!(first, second);
        Ok(())
    }

    #[tokio::test]
    async fn malformed_ids_are_pending() -> anyhow::Result<()> {
        let poller = StatusPoller::new(TaskBroker::memory());
        let status = poller.get_status("not-a-task-id").await?;
        assert_eq!(status.task_id, "not-a-task-id");
        assert_eq!(status.state, PublicTaskState::Pending);
        Ok(())
    }

    /// Store whose reads fail with the given error.
    struct FailingStore(fn() -> crate::Error);

    #[async_trait::async_trait]
    impl TaskStore for FailingStore {
        async fn create(&self, _record: &TaskRecord) -> Result<()> {
            Ok(())
        }

        async fn load(&self, _task_id: Uuid) -> Result<Option<TaskRecord>> {
            Err((self.0)())
        }

        async fn transition(
            &self,
            _task_id: Uuid,
            _transition: Transition,
        ) -> Result<TransitionOutcome> {
            Ok(TransitionOutcome::Missing)
        }

        async fn remove(&self, _task_id: Uuid) -> Result<()> {
            Ok(())
        }

        async fn ping(&self) -> Result<()> {
            Ok(())
        }
    }

    fn poller_over(store: FailingStore) -> StatusPoller {
        StatusPoller::new(TaskBroker::new(
            BrokerBackend::Memory,
            std::sync::Arc::new(store),
            std::sync::Arc::new(MemoryQueue::new()),
        ))
    }

    fn undecodable() -> crate::Error {
        let source = serde_json::from_str::<TaskRecord>(r#"{"task_id": 7}"#).unwrap_err();
        crate::Error::from(deckflow_nats::Error::Serialization(source))
    }

    #[tokio::test]
    async fn undecodable_record_is_failure() -> anyhow::Result<()> {
        let poller = poller_over(FailingStore(undecodable));
        let task_id = Uuid::now_v7().to_string();

        let status = poller.get_status(&task_id).await?;
        assert_eq!(status.state, PublicTaskState::Failure);
        assert!(
            status
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("result contract mismatch: ")),
            "{:?}",
            status.error
        );
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_store_is_an_error() {
        let poller = poller_over(FailingStore(|| crate::Error::unavailable("kv down")));
        let error = poller
            .get_status(&Uuid::now_v7().to_string())
            .await
            .unwrap_err();
        assert!(error.is_unavailable());
    }
}
