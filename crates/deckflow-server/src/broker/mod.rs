//! Task records and the work queue.
//!
//! The broker pairs a [`TaskStore`], which holds one [`TaskRecord`] per task,
//! with a [`TaskQueue`] carrying [`WorkflowJob`]s to workers. Deliveries are
//! acknowledged late: a job is only settled after its record reached a
//! terminal state, so a crashed worker leads to redelivery.
//!
//! Two backends are provided:
//!
//! - [`MemoryStore`] and [`MemoryQueue`] keep everything in process, for
//!   single-node deployments and tests
//! - [`NatsTaskStore`] and [`NatsTaskQueue`] use a NATS KV bucket and a
//!   JetStream work queue

mod memory;
mod nats;
mod record;

use std::sync::Arc;
use std::time::Duration;

use deckflow_nats::NatsClient;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

pub use self::memory::{MemoryDelivery, MemoryQueue, MemoryStore};
pub use self::nats::{NatsBrokerOptions, NatsDelivery, NatsTaskQueue, NatsTaskStore};
pub use self::record::{
    RequestKind, Stage, TaskRecord, TaskState, Transition, TransitionOutcome,
};
use crate::pipeline::{WorkflowJob, WorkflowRequest};
use crate::{Error, Result};

/// Tracing target for broker operations.
pub const TRACING_TARGET: &str = "deckflow_server::broker";

/// Storage of task records.
#[async_trait::async_trait]
pub trait TaskStore: Send + Sync {
    /// Writes a new record; fails if one already exists for the task.
    async fn create(&self, record: &TaskRecord) -> Result<()>;

    /// Reads the record of a task.
    async fn load(&self, task_id: Uuid) -> Result<Option<TaskRecord>>;

    /// Applies a transition unless the record is terminal.
    async fn transition(&self, task_id: Uuid, transition: Transition)
    -> Result<TransitionOutcome>;

    /// Deletes the record of a task.
    async fn remove(&self, task_id: Uuid) -> Result<()>;

    /// Checks that the store can be reached.
    async fn ping(&self) -> Result<()>;
}

/// Queue of workflow jobs with at-least-once delivery.
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    /// Publishes a job.
    async fn publish(&self, job: &WorkflowJob) -> Result<()>;

    /// Waits up to `wait` for the next job.
    async fn fetch(&self, wait: Duration) -> Result<Option<Box<dyn Delivery>>>;

    /// Checks that the queue can be reached.
    async fn ping(&self) -> Result<()>;
}

/// A job handed to a worker, settled exactly once.
///
/// A delivery dropped without being settled is delivered again.
#[async_trait::async_trait]
pub trait Delivery: Send {
    /// Returns the job.
    fn job(&self) -> &WorkflowJob;

    /// Returns the 1-based delivery count.
    fn attempt(&self) -> u64;

    /// Marks the job as processed.
    async fn ack(&mut self) -> Result<()>;

    /// Asks for the job to be delivered again.
    async fn nak(&mut self) -> Result<()>;

    /// Drops the job without processing it again.
    async fn term(&mut self) -> Result<()>;
}

/// Storage backend selection.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    AsRefStr,
    Display,
    EnumString
)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BrokerBackend {
    /// In-process queue and store.
    #[default]
    Memory,
    /// NATS JetStream queue and KV store.
    Nats,
}

/// Handle returned on submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: Uuid,
}

/// Task queue client shared by handlers and workers.
///
/// Cheap to clone; clones share the same backends.
#[derive(Clone)]
pub struct TaskBroker {
    backend: BrokerBackend,
    store: Arc<dyn TaskStore>,
    queue: Arc<dyn TaskQueue>,
}

impl std::fmt::Debug for TaskBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskBroker")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

impl TaskBroker {
    /// Creates a broker over the given store and queue.
    pub fn new(
        backend: BrokerBackend,
        store: Arc<dyn TaskStore>,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            backend,
            store,
            queue,
        }
    }

    /// Creates an in-process broker.
    pub fn memory() -> Self {
        Self::new(
            BrokerBackend::Memory,
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryQueue::new()),
        )
    }

    /// Creates a broker backed by a NATS KV bucket and JetStream queue.
    pub async fn nats(client: &NatsClient, options: &NatsBrokerOptions) -> Result<Self> {
        let store = NatsTaskStore::new(client, options.record_ttl).await?;
        let queue = NatsTaskQueue::new(client, options).await?;
        Ok(Self::new(
            BrokerBackend::Nats,
            Arc::new(store),
            Arc::new(queue),
        ))
    }

    /// Returns the configured backend.
    #[inline]
    pub fn backend(&self) -> BrokerBackend {
        self.backend
    }

    /// Records a new task and enqueues its job.
    ///
    /// Any failure is reported as [`ErrorKind::Unavailable`]: the task was
    /// not accepted and the client may retry. A record written for a job that
    /// could not be published is removed again.
    ///
    /// [`ErrorKind::Unavailable`]: crate::ErrorKind::Unavailable
    #[tracing::instrument(skip_all, target = TRACING_TARGET, fields(kind = %request.kind()))]
    pub async fn submit(&self, request: WorkflowRequest) -> Result<TaskHandle> {
        let task_id = Uuid::now_v7();
        let record = TaskRecord::queued(task_id, request.kind());

        self.store
            .create(&record)
            .await
            .map_err(|e| unavailable("failed to record task", e))?;

        let job = WorkflowJob::new(task_id, request);
        if let Err(error) = self.queue.publish(&job).await {
            if let Err(cleanup) = self.store.remove(task_id).await {
                tracing::warn!(
                    target: TRACING_TARGET,
                    task_id = %task_id,
                    error = %cleanup,
                    "Failed to remove record of unpublished task"
                );
            }
            return Err(unavailable("failed to enqueue task", error));
        }

        tracing::info!(
            target: TRACING_TARGET,
            task_id = %task_id,
            "Task submitted"
        );

        Ok(TaskHandle { task_id })
    }

    /// Reads the record of a task.
    pub async fn load(&self, task_id: Uuid) -> Result<Option<TaskRecord>> {
        self.store.load(task_id).await
    }

    /// Applies a transition to the record of a task.
    pub async fn transition(
        &self,
        task_id: Uuid,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        self.store.transition(task_id, transition).await
    }

    /// Waits up to `wait` for the next job.
    pub async fn fetch(&self, wait: Duration) -> Result<Option<Box<dyn Delivery>>> {
        self.queue.fetch(wait).await
    }

    /// Checks that both the store and the queue can be reached.
    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await?;
        self.queue.ping().await
    }
}

fn unavailable(context: &'static str, error: Error) -> Error {
    if error.is_unavailable() {
        error
    } else {
        Error::unavailable(format!("{context}: {}", error.message())).with_source(error)
    }
}
