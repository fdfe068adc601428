//! Slide-deck generation pipeline.
//!
//! ## Architecture
//!
//! - [`nodes`] - the three work nodes, each returning a [`StageResult`]
//! - [`Orchestrator`] - runs the nodes of one task in order and stores the
//!   outcome
//! - [`Worker`] - pulls jobs from the broker with semaphore-bounded
//!   concurrency and settles them after the outcome is stored
//! - [`WorkerHandles`] - starts and stops the workers
//!
//! ## Stages
//!
//! - **Outline**: prompt to structured outline
//! - **Content**: outline to slides
//! - **Export**: slides to a `.pptx` file in the output directory
//!
//! [`StageResult`]: deckflow_core::types::StageResult

/// Tracing target for pipeline events.
pub const TRACING_TARGET: &str = "deckflow_server::pipeline";

use std::sync::Arc;

mod job;
pub mod nodes;
mod orchestrator;
mod state;
mod worker;

pub use job::{WorkflowJob, WorkflowRequest};
pub use orchestrator::{Orchestrator, RunOutcome};
pub use state::{DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_CONCURRENT_JOBS, PipelineConfig, PipelineState};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
pub use worker::{Settlement, Worker, handle, process};

use crate::{Error, Result};

/// Handles for background workers.
///
/// Holds the join handle of the worker loop and the semaphore bounding its
/// jobs, allowing graceful shutdown that waits for jobs in flight.
pub struct WorkerHandles {
    worker: JoinHandle<Result<()>>,
    semaphore: Arc<Semaphore>,
    permits: usize,
    cancel_token: CancellationToken,
}

impl WorkerHandles {
    /// Spawns the workflow worker.
    ///
    /// The worker gets a unique name in the format `{uuid}-workflow`.
    pub fn spawn(state: &PipelineState) -> Self {
        let cancel_token = CancellationToken::new();
        let instance_id = Uuid::now_v7();
        let semaphore = state.config.create_semaphore();

        tracing::info!(
            target: TRACING_TARGET,
            instance_id = %instance_id,
            max_concurrent_jobs = state.config.max_concurrent_jobs,
            max_attempts = state.config.max_attempts,
            "Starting workflow workers"
        );

        let worker = Worker::new(
            state.clone(),
            format!("{instance_id}-workflow"),
            cancel_token.clone(),
            semaphore.clone(),
        )
        .spawn();

        Self {
            worker,
            semaphore,
            permits: state.config.max_concurrent_jobs,
            cancel_token,
        }
    }

    /// Requests graceful shutdown.
    ///
    /// The worker stops fetching; jobs already running finish and are
    /// settled. Use [`abort_all`](Self::abort_all) for immediate
    /// cancellation.
    pub fn shutdown(&self) {
        tracing::info!(
            target: TRACING_TARGET,
            "Initiating graceful shutdown of workflow workers"
        );
        self.cancel_token.cancel();
    }

    /// Aborts the worker loop immediately.
    ///
    /// Jobs in flight are left unsettled and will be delivered again.
    pub fn abort_all(&self) {
        tracing::warn!(
            target: TRACING_TARGET,
            "Aborting workflow workers immediately"
        );
        self.cancel_token.cancel();
        self.worker.abort();
    }

    /// Checks if the worker loop is still running.
    pub fn is_running(&self) -> bool {
        !self.worker.is_finished()
    }

    /// Waits for the worker loop to stop and for every job in flight to be
    /// settled.
    pub async fn wait_all(self) -> Result<()> {
        tracing::debug!(
            target: TRACING_TARGET,
            "Waiting for workflow workers to complete"
        );

        self.worker
            .await
            .map_err(|e| Error::internal("pipeline", e.to_string()))??;

        let permits = u32::try_from(self.permits).unwrap_or(u32::MAX);
        let _drained = self
            .semaphore
            .acquire_many(permits)
            .await
            .map_err(|e| Error::internal("pipeline", e.to_string()))?;

        tracing::info!(
            target: TRACING_TARGET,
            "Workflow workers stopped"
        );

        Ok(())
    }
}
