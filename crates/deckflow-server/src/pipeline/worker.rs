//! Queue consumer running workflow jobs.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{Orchestrator, PipelineState, TRACING_TARGET, WorkflowJob};
use crate::Result;
use crate::broker::{Delivery, Transition, TransitionOutcome};

/// Pause after a failed fetch before asking the queue again.
const FETCH_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// How a delivery is settled once handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The job is done; remove it from the queue.
    Ack,
    /// The job could not be handled now; deliver it again.
    Nak,
    /// The job must never run again.
    Term,
}

/// Workflow worker.
///
/// Fetches one job at a time once a semaphore permit is available and runs
/// it on its own task, so the number of jobs in flight never exceeds the
/// permits. Jobs are settled after their outcome was stored.
pub struct Worker {
    state: PipelineState,
    name: String,
    cancel_token: CancellationToken,
    semaphore: Arc<Semaphore>,
}

impl Worker {
    /// Creates a new worker.
    pub fn new(
        state: PipelineState,
        name: impl Into<String>,
        cancel_token: CancellationToken,
        semaphore: Arc<Semaphore>,
    ) -> Self {
        Self {
            state,
            name: name.into(),
            cancel_token,
            semaphore,
        }
    }

    /// Spawns the worker as a background task.
    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(async move { self.run().await })
    }

    /// Runs the worker loop until cancelled.
    async fn run(self) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET,
            worker = %self.name,
            backend = %self.state.broker.backend(),
            "Starting worker"
        );

        let fetch_wait = self.state.config.fetch_wait();

        loop {
            let permit = tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => {
                        tracing::error!(
                            target: TRACING_TARGET,
                            worker = %self.name,
                            "Semaphore closed, stopping worker"
                        );
                        break;
                    }
                },
            };

            let fetched = tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => break,

                fetched = self.state.broker.fetch(fetch_wait) => fetched,
            };

            let delivery = match fetched {
                Ok(Some(delivery)) => delivery,
                Ok(None) => {
                    tracing::trace!(target: TRACING_TARGET, "No jobs available");
                    continue;
                }
                Err(err) => {
                    tracing::error!(
                        target: TRACING_TARGET,
                        worker = %self.name,
                        error = %err,
                        "Failed to fetch job"
                    );
                    drop(permit);
                    tokio::select! {
                        biased;
                        () = self.cancel_token.cancelled() => break,
                        () = tokio::time::sleep(FETCH_ERROR_BACKOFF) => continue,
                    }
                }
            };

            let state = self.state.clone();
            tokio::spawn(async move {
                // Hold permit until the job is settled
                let _permit = permit;
                process(&state, delivery).await;
            });
        }

        tracing::info!(
            target: TRACING_TARGET,
            worker = %self.name,
            "Shutdown requested, stopping worker"
        );

        Ok(())
    }
}

/// Handles one delivery and settles it.
pub async fn process(state: &PipelineState, mut delivery: Box<dyn Delivery>) {
    let job = delivery.job().clone();
    let task_id = job.task_id;
    let settlement = handle(state, &job, delivery.attempt()).await;

    let settled = match settlement {
        Settlement::Ack => delivery.ack().await,
        Settlement::Nak => delivery.nak().await,
        Settlement::Term => delivery.term().await,
    };

    if let Err(err) = settled {
        tracing::error!(
            target: TRACING_TARGET,
            task_id = %task_id,
            settlement = ?settlement,
            error = %err,
            "Failed to settle job"
        );
    }
}

/// Decides what to do with a delivered job and runs the workflow if needed.
pub async fn handle(state: &PipelineState, job: &WorkflowJob, attempt: u64) -> Settlement {
    let task_id = job.task_id;

    if attempt > state.config.max_attempts {
        let transition = Transition::WorkerLost {
            error: format!("worker lost after {} attempts", attempt - 1),
        };

        return match state.broker.transition(task_id, transition).await {
            Ok(TransitionOutcome::Applied(_)) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    task_id = %task_id,
                    attempt,
                    "Job exhausted its deliveries, task marked as lost"
                );
                Settlement::Term
            }
            Ok(TransitionOutcome::AlreadyTerminal(_) | TransitionOutcome::Missing) => {
                Settlement::Term
            }
            Err(err) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    task_id = %task_id,
                    error = %err,
                    "Failed to mark task as lost"
                );
                Settlement::Nak
            }
        };
    }

    match state.broker.load(task_id).await {
        Ok(Some(record)) if record.is_terminal() => {
            tracing::debug!(
                target: TRACING_TARGET,
                task_id = %task_id,
                state = %record.state,
                "Redelivered job of a finished task"
            );
            return Settlement::Ack;
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            tracing::warn!(
                target: TRACING_TARGET,
                task_id = %task_id,
                "Job without a task record, dropping"
            );
            return Settlement::Term;
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                task_id = %task_id,
                error = %err,
                "Failed to load task record"
            );
            return Settlement::Nak;
        }
    }

    tracing::info!(
        target: TRACING_TARGET,
        task_id = %task_id,
        kind = %job.request.kind(),
        attempt,
        "Processing job"
    );

    match Orchestrator::new(state, task_id, attempt)
        .run(job.request.clone())
        .await
    {
        Ok(outcome) => {
            tracing::debug!(
                target: TRACING_TARGET,
                task_id = %task_id,
                outcome = ?outcome,
                "Job handled"
            );
            Settlement::Ack
        }
        Err(err) => {
            tracing::error!(
                target: TRACING_TARGET,
                task_id = %task_id,
                error = %err,
                "Failed to store workflow outcome"
            );
            Settlement::Nak
        }
    }
}

#[cfg(test)]
mod tests {
    use deckflow_core::generate::ProducerService;
    use deckflow_core::mock::{MockProducer, MockRenderer};
    use deckflow_core::render::RenderService;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::broker::{MemoryQueue, TaskBroker, TaskQueue, TaskState};
    use crate::pipeline::{PipelineConfig, WorkerHandles, WorkflowRequest};
    use crate::service::ServiceState;

    const WAIT: Duration = Duration::from_millis(100);

    fn state(producer: MockProducer, config: PipelineConfig) -> PipelineState {
        PipelineState::new(
            &ServiceState::new(TaskBroker::memory()),
            ProducerService::new(producer),
            RenderService::new(MockRenderer::new()),
            config,
        )
    }

    fn generate() -> WorkflowRequest {
        WorkflowRequest::Generate {
            prompt: "Rust".into(),
        }
    }

    #[tokio::test]
    async fn exhausted_job_marks_task_lost() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let config = PipelineConfig::default()
            .with_output_dir(dir.path())
            .with_max_attempts(1);
        let state = state(producer.clone(), config);

        let handle = state.broker.submit(generate()).await?;
        drop(state.broker.fetch(WAIT).await?.expect("first delivery"));

        let delivery = state.broker.fetch(WAIT).await?.expect("redelivery");
        assert_eq!(delivery.attempt(), 2);
        assert_eq!(handle_ref(&state, delivery).await, Settlement::Term);

        let record = state.broker.load(handle.task_id).await?.expect("record");
        assert_eq!(record.state, TaskState::WorkerLost);
        assert_eq!(record.error.as_deref(), Some("worker lost after 1 attempts"));
        assert_eq!(producer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn redelivered_finished_job_is_acked_without_rerun() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let state = state(producer.clone(), PipelineConfig::default().with_output_dir(dir.path()));

        let handle = state.broker.submit(generate()).await?;
        let first = state.broker.fetch(WAIT).await?.expect("delivery");
        assert_eq!(handle_ref(&state, first).await, Settlement::Ack);
        let calls = producer.calls();

        // The first delivery was dropped unsettled, so it comes back.
        let again = state.broker.fetch(WAIT).await?.expect("redelivery");
        assert_eq!(handle_ref(&state, again).await, Settlement::Ack);
        assert_eq!(producer.calls(), calls);

        let record = state.broker.load(handle.task_id).await?.expect("record");
        assert_eq!(record.state, TaskState::Completed);
        Ok(())
    }

    #[tokio::test]
    async fn job_without_record_is_terminated() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let state = state(
            MockProducer::default(),
            PipelineConfig::default().with_output_dir(dir.path()),
        );

        let queue = MemoryQueue::new();
        queue
            .publish(&WorkflowJob::new(Uuid::now_v7(), generate()))
            .await?;

        let delivery = queue.fetch(WAIT).await?.expect("delivery");
        assert_eq!(handle_ref(&state, delivery).await, Settlement::Term);
        Ok(())
    }

    #[tokio::test]
    async fn worker_completes_submitted_tasks() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let config = PipelineConfig::default()
            .with_output_dir(dir.path())
            .with_max_concurrent_jobs(2)
            .with_fetch_wait(Duration::from_millis(20));
        let state = state(MockProducer::default(), config);

        let first = state.broker.submit(generate()).await?;
        let second = state.broker.submit(generate()).await?;

        let workers = WorkerHandles::spawn(&state);
        for task in [first, second] {
            let mut finished = false;
            for _ in 0..200 {
                let record = state.broker.load(task.task_id).await?.expect("record");
                if record.is_terminal() {
                    assert_eq!(record.state, TaskState::Completed);
                    finished = true;
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            assert!(finished, "task {} did not finish", task.task_id);
        }

        workers.shutdown();
        workers.wait_all().await?;
        Ok(())
    }

    /// Handles a delivery and drops it unsettled, like a worker that died
    /// before acknowledging.
    async fn handle_ref(state: &PipelineState, delivery: Box<dyn Delivery>) -> Settlement {
        handle(state, delivery.job(), delivery.attempt()).await
    }
}
