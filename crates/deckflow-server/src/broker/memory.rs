//! In-process broker backend.
//!
//! Records live in a [`DashMap`] for the lifetime of the process and jobs in
//! an unbounded channel. A delivery dropped without being settled puts its
//! job back on the channel with an increased attempt count, which mirrors a
//! JetStream redelivery after `ack_wait`.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{Mutex, mpsc};
use uuid::Uuid;

use super::{
    Delivery, TRACING_TARGET, TaskQueue, TaskRecord, TaskStore, Transition, TransitionOutcome,
};
use crate::pipeline::WorkflowJob;
use crate::{Error, Result};

/// Task records held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<Uuid, TaskRecord>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Overwrites a record, bypassing the state machine.
    #[doc(hidden)]
    pub fn insert(&self, record: TaskRecord) {
        self.records.insert(record.task_id, record);
    }
}

#[async_trait::async_trait]
impl TaskStore for MemoryStore {
    async fn create(&self, record: &TaskRecord) -> Result<()> {
        match self.records.entry(record.task_id) {
            Entry::Occupied(_) => Err(Error::internal(
                "memory_store",
                format!("task {} already exists", record.task_id),
            )),
            Entry::Vacant(entry) => {
                entry.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn load(&self, task_id: Uuid) -> Result<Option<TaskRecord>> {
        Ok(self.records.get(&task_id).map(|record| record.value().clone()))
    }

    async fn transition(
        &self,
        task_id: Uuid,
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let Some(mut record) = self.records.get_mut(&task_id) else {
            return Ok(TransitionOutcome::Missing);
        };

        if record.apply(&transition) {
            Ok(TransitionOutcome::Applied(record.value().clone()))
        } else {
            Ok(TransitionOutcome::AlreadyTerminal(record.value().clone()))
        }
    }

    async fn remove(&self, task_id: Uuid) -> Result<()> {
        self.records.remove(&task_id);
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct QueuedJob {
    job: WorkflowJob,
    attempt: u64,
}

/// Job queue held in memory.
#[derive(Debug)]
pub struct MemoryQueue {
    sender: mpsc::UnboundedSender<QueuedJob>,
    receiver: Mutex<mpsc::UnboundedReceiver<QueuedJob>>,
    closed: Arc<AtomicBool>,
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            sender,
            receiver: Mutex::new(receiver),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stops accepting new jobs; publishing fails afterwards.
    ///
    /// Jobs already queued can still be fetched.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TaskQueue for MemoryQueue {
    async fn publish(&self, job: &WorkflowJob) -> Result<()> {
        if self.is_closed() {
            return Err(Error::unavailable("memory queue is closed"));
        }

        self.sender
            .send(QueuedJob {
                job: job.clone(),
                attempt: 1,
            })
            .map_err(|_| Error::unavailable("memory queue is closed"))
    }

    async fn fetch(&self, wait: Duration) -> Result<Option<Box<dyn Delivery>>> {
        let mut receiver = self.receiver.lock().await;
        let Ok(next) = tokio::time::timeout(wait, receiver.recv()).await else {
            return Ok(None);
        };

        Ok(next.map(|queued| {
            Box::new(MemoryDelivery {
                job: queued.job,
                attempt: queued.attempt,
                requeue: self.sender.clone(),
                settled: false,
            }) as Box<dyn Delivery>
        }))
    }

    async fn ping(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::unavailable("memory queue is closed"));
        }
        Ok(())
    }
}

/// A job fetched from a [`MemoryQueue`].
#[derive(Debug)]
pub struct MemoryDelivery {
    job: WorkflowJob,
    attempt: u64,
    requeue: mpsc::UnboundedSender<QueuedJob>,
    settled: bool,
}

impl MemoryDelivery {
    fn redeliver(&mut self) {
        self.settled = true;
        let queued = QueuedJob {
            job: self.job.clone(),
            attempt: self.attempt + 1,
        };
        if self.requeue.send(queued).is_err() {
            tracing::warn!(
                target: TRACING_TARGET,
                task_id = %self.job.task_id,
                "Memory queue dropped, job not redelivered"
            );
        }
    }
}

#[async_trait::async_trait]
impl Delivery for MemoryDelivery {
    fn job(&self) -> &WorkflowJob {
        &self.job
    }

    fn attempt(&self) -> u64 {
        self.attempt
    }

    async fn ack(&mut self) -> Result<()> {
        self.settled = true;
        Ok(())
    }

    async fn nak(&mut self) -> Result<()> {
        if !self.settled {
            self.redeliver();
        }
        Ok(())
    }

    async fn term(&mut self) -> Result<()> {
        self.settled = true;
        Ok(())
    }
}

impl Drop for MemoryDelivery {
    fn drop(&mut self) {
        if !self.settled {
            self.redeliver();
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::broker::{RequestKind, Stage, TaskState};
    use crate::pipeline::WorkflowRequest;

    const WAIT: Duration = Duration::from_millis(50);

    fn job() -> WorkflowJob {
        WorkflowJob::new(
            Uuid::now_v7(),
            WorkflowRequest::Generate {
                prompt: "Rust".into(),
            },
        )
    }

    #[tokio::test]
    async fn store_rejects_duplicate_create() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let record = TaskRecord::queued(Uuid::now_v7(), RequestKind::Generate);

        store.create(&record).await?;
        assert!(store.create(&record).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn store_keeps_terminal_records() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let record = TaskRecord::queued(Uuid::now_v7(), RequestKind::Generate);
        store.create(&record).await?;

        let completed = Transition::Completed {
            result: json!({"status": "success"}),
        };
        assert!(matches!(
            store.transition(record.task_id, completed).await?,
            TransitionOutcome::Applied(_)
        ));

        let late = Transition::Executing {
            stage: Stage::Outline,
            attempt: 2,
        };
        let TransitionOutcome::AlreadyTerminal(current) =
            store.transition(record.task_id, late).await?
        else {
            panic!("terminal record was modified");
        };
        assert_eq!(current.state, TaskState::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn store_reports_missing_records() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let outcome = store
            .transition(
                Uuid::now_v7(),
                Transition::Errored {
                    error: "boom".into(),
                },
            )
            .await?;
        assert!(matches!(outcome, TransitionOutcome::Missing));
        Ok(())
    }

    #[tokio::test]
    async fn fetch_times_out_when_empty() -> anyhow::Result<()> {
        let queue = MemoryQueue::new();
        assert!(queue.fetch(WAIT).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn dropped_delivery_is_redelivered() -> anyhow::Result<()> {
        let queue = MemoryQueue::new();
        let job = job();
        queue.publish(&job).await?;

        let first = queue.fetch(WAIT).await?.expect("first delivery");
        assert_eq!(first.attempt(), 1);
        drop(first);

        let second = queue.fetch(WAIT).await?.expect("redelivery");
        assert_eq!(second.job(), &job);
        assert_eq!(second.attempt(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn settled_delivery_is_gone() -> anyhow::Result<()> {
        let queue = MemoryQueue::new();
        queue.publish(&job()).await?;

        let mut delivery = queue.fetch(WAIT).await?.expect("delivery");
        delivery.ack().await?;
        drop(delivery);

        assert!(queue.fetch(WAIT).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn nak_requeues_once() -> anyhow::Result<()> {
        let queue = MemoryQueue::new();
        queue.publish(&job()).await?;

        let mut delivery = queue.fetch(WAIT).await?.expect("delivery");
        delivery.nak().await?;
        drop(delivery);

        let mut again = queue.fetch(WAIT).await?.expect("redelivery");
        assert_eq!(again.attempt(), 2);
        again.term().await?;
        drop(again);
        assert!(queue.fetch(WAIT).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn closed_queue_rejects_publish() {
        let queue = MemoryQueue::new();
        queue.close();

        let error = queue.publish(&job()).await.unwrap_err();
        assert!(error.is_unavailable());
        assert!(queue.ping().await.is_err());
    }
}
