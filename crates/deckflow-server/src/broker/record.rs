//! Stored task records and their state machine.

use jiff::Timestamp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};
use uuid::Uuid;

/// Internal lifecycle state of a task.
///
/// `completed`, `errored`, `worker_lost` and `cancelled` are terminal: a
/// record in one of them is never modified again.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
    IntoStaticStr
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskState {
    /// Recorded and published, not yet picked up.
    Queued,
    /// A worker is running one of the stages.
    Executing,
    /// The last stage stored its result.
    Completed,
    /// A stage failed, panicked or timed out.
    Errored,
    /// The job was redelivered more often than allowed.
    WorkerLost,
    /// The task was withdrawn before completing.
    Cancelled,
}

impl TaskState {
    /// Returns true if no further transition is allowed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Errored | Self::WorkerLost | Self::Cancelled
        )
    }
}

/// Pipeline stage a task is executing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    AsRefStr,
    Display,
    EnumString
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    /// Outline generation from the prompt.
    Outline,
    /// Slide content generation from the outline.
    Content,
    /// Rendering and writing the document.
    Export,
}

/// Which workflow a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    /// All three stages, starting from a prompt.
    Generate,
    /// The outline stage only.
    Outline,
    /// The content stage only, from a given outline.
    Content,
    /// The export stage only, from ready-made slides.
    Export,
}

/// A state change requested by the orchestrator or a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// A stage started on the given delivery attempt.
    Executing { stage: Stage, attempt: u64 },
    /// The workflow finished with a raw result payload.
    Completed { result: serde_json::Value },
    /// The workflow failed.
    Errored { error: String },
    /// The job exhausted its deliveries.
    WorkerLost { error: String },
}

/// Result of asking a store to apply a [`Transition`].
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    /// The record was updated.
    Applied(TaskRecord),
    /// The record was already terminal and stays as it was.
    AlreadyTerminal(TaskRecord),
    /// No record exists for the task.
    Missing,
}

/// Stored state of a single task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub task_id: Uuid,
    pub kind: RequestKind,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage: Option<Stage>,
    /// Raw worker output; untrusted until validated by the poller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Delivery attempt that last started a stage.
    #[serde(default)]
    pub attempts: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TaskRecord {
    /// Creates the record written on submission.
    pub fn queued(task_id: Uuid, kind: RequestKind) -> Self {
        let now = Timestamp::now();
        Self {
            task_id,
            kind,
            state: TaskState::Queued,
            stage: None,
            result: None,
            error: None,
            attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns true if the record can no longer change.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Applies a transition in place.
    ///
    /// Returns `false` and leaves the record untouched if it is terminal.
    pub fn apply(&mut self, transition: &Transition) -> bool {
        if self.is_terminal() {
            return false;
        }

        match transition {
            Transition::Executing { stage, attempt } => {
                self.state = TaskState::Executing;
                self.stage = Some(*stage);
                self.attempts = self.attempts.max(*attempt);
            }
            Transition::Completed { result } => {
                self.state = TaskState::Completed;
                self.result = Some(result.clone());
                self.error = None;
            }
            Transition::Errored { error } => {
                self.state = TaskState::Errored;
                self.error = Some(error.clone());
            }
            Transition::WorkerLost { error } => {
                self.state = TaskState::WorkerLost;
                self.error = Some(error.clone());
            }
        }

        self.updated_at = Timestamp::now();
        true
    }
}
