//! Worker lifecycle around the HTTP server.

use std::time::Duration;

use deckflow_server::pipeline::WorkerHandles;

use crate::TRACING_TARGET_SERVER_SHUTDOWN;
use crate::server::{Result, ServerError};

/// Stops the workers and waits up to `timeout` for jobs in flight to settle.
///
/// Jobs still running when the timeout passes are left unsettled; the
/// broker delivers them again to the next worker.
pub async fn drain_workers(workers: WorkerHandles, timeout: Duration) -> Result<()> {
    workers.shutdown();

    match tokio::time::timeout(timeout, workers.wait_all()).await {
        Ok(Ok(())) => {
            tracing::info!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                "Workflow workers stopped"
            );
            Ok(())
        }
        Ok(Err(err)) => Err(ServerError::Workers(err)),
        Err(_) => {
            tracing::warn!(
                target: TRACING_TARGET_SERVER_SHUTDOWN,
                timeout_secs = timeout.as_secs(),
                "Jobs in flight did not settle before the shutdown timeout"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use deckflow_core::generate::ProducerService;
    use deckflow_core::mock::{MockProducer, MockRenderer};
    use deckflow_core::render::RenderService;
    use deckflow_server::broker::TaskBroker;
    use deckflow_server::pipeline::{PipelineConfig, PipelineState};
    use deckflow_server::service::ServiceState;

    use super::*;

    #[tokio::test]
    async fn idle_workers_drain_quickly() -> anyhow::Result<()> {
        let output = tempfile::TempDir::new()?;
        let state = ServiceState::new(TaskBroker::memory());
        let pipeline = PipelineState::new(
            &state,
            ProducerService::new(MockProducer::default()),
            RenderService::new(MockRenderer::new()),
            PipelineConfig::default()
                .with_output_dir(output.path())
                .with_fetch_wait(Duration::from_millis(50)),
        );

        let workers = WorkerHandles::spawn(&pipeline);
        drain_workers(workers, Duration::from_secs(5)).await?;
        Ok(())
    }
}
