//! NATS JetStream broker backend.

use std::time::Duration;

use deckflow_nats::NatsClient;
use deckflow_nats::kv::{KvStore, TaskKey, TaskRecordsBucket};
use deckflow_nats::queue::{JobConsumer, JobDelivery, JobQueue};
use uuid::Uuid;

use super::{
    Delivery, TRACING_TARGET, TaskQueue, TaskRecord, TaskStore, Transition, TransitionOutcome,
};
use crate::pipeline::WorkflowJob;
use crate::{Error, Result};

/// Attempts at an optimistic update before giving up.
const MAX_UPDATE_ATTEMPTS: usize = 8;

/// Settings of the JetStream queue and KV bucket.
#[derive(Debug, Clone)]
pub struct NatsBrokerOptions {
    /// Queue name; the stream is `JOBS_<QUEUE>`.
    pub queue_name: String,
    /// Durable consumer shared by every worker.
    pub consumer_name: String,
    /// Time a delivery may stay unacknowledged before it is resent.
    pub ack_wait: Duration,
    /// Deliveries per job, including the first one.
    pub max_deliver: i64,
    /// Retention of task records.
    pub record_ttl: Duration,
}

/// Task records in the `task_records` KV bucket.
pub struct NatsTaskStore {
    client: NatsClient,
    records: KvStore<TaskKey, TaskRecord, TaskRecordsBucket>,
}

impl NatsTaskStore {
    /// Opens or creates the bucket.
    pub async fn new(client: &NatsClient, record_ttl: Duration) -> Result<Self> {
        let records = client.kv_store_with_ttl(record_ttl).await?;
        Ok(Self {
            client: client.clone(),
            records,
        })
    }
}

#[async_trait::async_trait]
impl TaskStore for NatsTaskStore {
    async fn create(&self, record: &TaskRecord) -> Result<()> {
        self.records
            .create(&TaskKey(record.task_id), record)
            .await?;
        Ok(())
    }

    async fn load(&self, task_id: Uuid) -> Result<Option<TaskRecord>> {
        Ok(self.records.get_value(&TaskKey(task_id)).await?)
    }

    async fn transition(
        &self,
        task_id: Uuid,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let key = TaskKey(task_id);

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            let Some(entry) = self.records.get(&key).await? else {
                return Ok(TransitionOutcome::Missing);
            };

            let mut record = entry.value;
            if !record.apply(&transition) {
                return Ok(TransitionOutcome::AlreadyTerminal(record));
            }

            match self.records.update(&key, &record, entry.revision).await {
                Ok(_) => return Ok(TransitionOutcome::Applied(record)),
                Err(deckflow_nats::Error::KvRevisionMismatch { .. }) => {
                    tracing::debug!(
                        target: TRACING_TARGET,
                        task_id = %task_id,
                        "Task record changed concurrently, retrying"
                    );
                }
                Err(deckflow_nats::Error::KvKeyNotFound { .. }) => {
                    return Ok(TransitionOutcome::Missing);
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(Error::internal(
            "nats_store",
            format!("task {task_id} kept changing during update"),
        ))
    }

    async fn remove(&self, task_id: Uuid) -> Result<()> {
        self.records.delete(&TaskKey(task_id)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await?;
        Ok(())
    }
}

/// Workflow jobs on a JetStream work queue.
pub struct NatsTaskQueue {
    client: NatsClient,
    queue: JobQueue<WorkflowJob>,
    consumer: JobConsumer<WorkflowJob>,
}

impl NatsTaskQueue {
    /// Opens or creates the stream and the shared durable consumer.
    pub async fn new(client: &NatsClient, options: &NatsBrokerOptions) -> Result<Self> {
        let queue = client.job_queue(&options.queue_name).await?;
        let consumer = queue
            .consumer(&options.consumer_name, options.ack_wait, options.max_deliver)
            .await?;

        tracing::info!(
            target: TRACING_TARGET,
            queue = %options.queue_name,
            consumer = %options.consumer_name,
            ack_wait_secs = options.ack_wait.as_secs(),
            max_deliver = options.max_deliver,
            "NATS task queue ready"
        );

        Ok(Self {
            client: client.clone(),
            queue,
            consumer,
        })
    }
}

#[async_trait::async_trait]
impl TaskQueue for NatsTaskQueue {
    async fn publish(&self, job: &WorkflowJob) -> Result<()> {
        let job_id = job.task_id.hyphenated().to_string();
        self.queue.submit(&job_id, job).await?;
        Ok(())
    }

    async fn fetch(&self, wait: Duration) -> Result<Option<Box<dyn Delivery>>> {
        let delivery = self.consumer.fetch(wait).await?;
        Ok(delivery.map(|inner| {
            Box::new(NatsDelivery {
                attempt: inner.attempt(),
                job: inner.job().clone(),
                inner: Some(inner),
            }) as Box<dyn Delivery>
        }))
    }

    async fn ping(&self) -> Result<()> {
        self.client.ping().await?;
        Ok(())
    }
}

/// A job fetched from a [`NatsTaskQueue`].
pub struct NatsDelivery {
    job: WorkflowJob,
    attempt: u64,
    inner: Option<JobDelivery<WorkflowJob>>,
}

impl NatsDelivery {
    fn take(&mut self) -> Result<JobDelivery<WorkflowJob>> {
        self.inner
            .take()
            .ok_or_else(|| Error::internal("nats_queue", "delivery already settled"))
    }
}

#[async_trait::async_trait]
impl Delivery for NatsDelivery {
    fn job(&self) -> &WorkflowJob {
        &self.job
    }

    fn attempt(&self) -> u64 {
        self.attempt
    }

    async fn ack(&mut self) -> Result<()> {
        self.take()?.ack().await?;
        Ok(())
    }

    async fn nak(&mut self) -> Result<()> {
        self.take()?.nak(None).await?;
        Ok(())
    }

    async fn term(&mut self) -> Result<()> {
        self.take()?.term().await?;
        Ok(())
    }
}
