//! Sequential execution of the workflow stages for one task.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use deckflow_core::types::{DeckDraft, OutlineDraft, StageResult};
use futures::FutureExt;
use serde::Serialize;
use uuid::Uuid;

use super::{PipelineState, TRACING_TARGET, WorkflowRequest, nodes};
use crate::broker::{Stage, Transition, TransitionOutcome};
use crate::{Error, Result};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The final stage result was stored.
    Completed,
    /// A stage failed and the error was stored.
    Failed,
    /// The record was terminal or gone, nothing was written.
    Superseded,
}

/// Reason a run stops before the last stage.
enum Halt {
    Failed(String),
    Superseded,
    Store(Error),
}

impl From<Error> for Halt {
    fn from(error: Error) -> Self {
        Self::Store(error)
    }
}

/// Runs the stages of one task in process, in order.
///
/// Stage outputs are passed along as values; only state labels and the final
/// outcome go through the store. There is no retry: the first failing stage
/// ends the run.
pub struct Orchestrator<'a> {
    state: &'a PipelineState,
    task_id: Uuid,
    attempt: u64,
}

impl<'a> Orchestrator<'a> {
    /// Creates an orchestrator for a task on the given delivery attempt.
    pub fn new(state: &'a PipelineState, task_id: Uuid, attempt: u64) -> Self {
        Self {
            state,
            task_id,
            attempt,
        }
    }

    /// Runs the workflow and stores its terminal state.
    ///
    /// Returns an error only if the store could not be written, in which case
    /// the job should be delivered again.
    #[tracing::instrument(skip_all, target = TRACING_TARGET, fields(task_id = %self.task_id, attempt = self.attempt))]
    pub async fn run(&self, request: WorkflowRequest) -> Result<RunOutcome> {
        let started = Instant::now();

        let transition = match self.execute(request).await {
            Ok(result) => Transition::Completed { result },
            Err(Halt::Failed(error)) => Transition::Errored { error },
            Err(Halt::Superseded) => return Ok(RunOutcome::Superseded),
            Err(Halt::Store(error)) => return Err(error),
        };

        let outcome = match &transition {
            Transition::Completed { .. } => RunOutcome::Completed,
            _ => RunOutcome::Failed,
        };

        match self.state.broker.transition(self.task_id, transition).await? {
            TransitionOutcome::Applied(record) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    task_id = %self.task_id,
                    state = %record.state,
                    error = record.error.as_deref(),
                    elapsed_ms = started.elapsed().as_millis(),
                    "Workflow finished"
                );
                Ok(outcome)
            }
            TransitionOutcome::AlreadyTerminal(_) | TransitionOutcome::Missing => {
                Ok(RunOutcome::Superseded)
            }
        }
    }

    /// Runs the stages the request asks for and returns the stored result.
    async fn execute(&self, request: WorkflowRequest) -> Result<serde_json::Value, Halt> {
        match request {
            WorkflowRequest::Generate { prompt } => {
                let outline = self
                    .stage(Stage::Outline, nodes::produce_outline(self.state, &prompt))
                    .await?;
                let deck = self
                    .stage(
                        Stage::Content,
                        nodes::produce_content(self.state, &outline, &prompt),
                    )
                    .await?;
                let artifact = self
                    .stage(
                        Stage::Export,
                        nodes::export_document(self.state, self.task_id, &deck.title, &deck.slides),
                    )
                    .await?;
                success(artifact)
            }
            WorkflowRequest::Outline { prompt } => {
                let outline = self
                    .stage(Stage::Outline, nodes::produce_outline(self.state, &prompt))
                    .await?;
                success(OutlineDraft {
                    outline,
                    message: nodes::OUTLINE_COMPLETED.to_owned(),
                })
            }
            WorkflowRequest::Content { prompt, outline } => {
                let deck = self
                    .stage(
                        Stage::Content,
                        nodes::produce_content(self.state, &outline, &prompt),
                    )
                    .await?;
                success(DeckDraft {
                    title: deck.title,
                    slides: deck.slides,
                    message: nodes::CONTENT_COMPLETED.to_owned(),
                })
            }
            WorkflowRequest::Export { title, slides } => {
                let artifact = self
                    .stage(
                        Stage::Export,
                        nodes::export_document(self.state, self.task_id, &title, &slides),
                    )
                    .await?;
                success(artifact)
            }
        }
    }

    /// Marks the stage as executing, then runs its node under the stage
    /// timeout with panics caught.
    async fn stage<T, F>(&self, stage: Stage, node: F) -> Result<T, Halt>
    where
        F: Future<Output = StageResult<T>>,
    {
        self.mark_executing(stage).await?;

        let limit = self.state.config.stage_timeout(stage);
        let started = Instant::now();
        let outcome = tokio::time::timeout(limit, AssertUnwindSafe(node).catch_unwind()).await;

        let error = match outcome {
            Ok(Ok(StageResult::Success(payload))) => {
                tracing::debug!(
                    target: TRACING_TARGET,
                    task_id = %self.task_id,
                    stage = %stage,
                    elapsed_ms = started.elapsed().as_millis(),
                    "Stage completed"
                );
                return Ok(payload);
            }
            Ok(Ok(StageResult::Error { error })) => format!("{stage} stage failed: {error}"),
            Ok(Err(panic)) => {
                format!("{stage} stage failed: panicked: {}", panic_message(panic.as_ref()))
            }
            Err(_) => format!("{stage} stage timed out after {}s", limit.as_secs()),
        };

        tracing::warn!(
            target: TRACING_TARGET,
            task_id = %self.task_id,
            stage = %stage,
            error = %error,
            elapsed_ms = started.elapsed().as_millis(),
            "Stage failed"
        );
        Err(Halt::Failed(error))
    }

    async fn mark_executing(&self, stage: Stage) -> Result<(), Halt> {
        let transition = Transition::Executing {
            stage,
            attempt: self.attempt,
        };

        match self.state.broker.transition(self.task_id, transition).await? {
            TransitionOutcome::Applied(_) => Ok(()),
            TransitionOutcome::AlreadyTerminal(record) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    task_id = %self.task_id,
                    state = %record.state,
                    "Task already finished, stopping"
                );
                Err(Halt::Superseded)
            }
            TransitionOutcome::Missing => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    task_id = %self.task_id,
                    "Task record disappeared, stopping"
                );
                Err(Halt::Superseded)
            }
        }
    }
}

/// Serializes a final payload as a successful stage result.
fn success<T: Serialize>(payload: T) -> Result<serde_json::Value, Halt> {
    serde_json::to_value(StageResult::Success(payload))
        .map_err(|e| Halt::Store(Error::internal("orchestrator", e.to_string())))
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use deckflow_core::generate::ProducerService;
    use deckflow_core::mock::{MockConfig, MockProducer, MockRenderer};
    use deckflow_core::render::RenderService;
    use deckflow_core::types::{Outline, OutlineItem, Slide, TaskResultContract};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::broker::{TaskBroker, TaskRecord, TaskState};
    use crate::pipeline::PipelineConfig;
    use crate::service::ServiceState;

    fn state(producer: MockProducer, config: PipelineConfig) -> PipelineState {
        PipelineState::new(
            &ServiceState::new(TaskBroker::memory()),
            ProducerService::new(producer),
            RenderService::new(MockRenderer::new()),
            config,
        )
    }

    fn config(output_dir: &Path) -> PipelineConfig {
        PipelineConfig::default().with_output_dir(output_dir)
    }

    fn generate(prompt: &str) -> WorkflowRequest {
        WorkflowRequest::Generate {
            prompt: prompt.to_owned(),
        }
    }

    async fn run(state: &PipelineState, request: WorkflowRequest) -> anyhow::Result<TaskRecord> {
        let handle = state.broker.submit(request.clone()).await?;
        Orchestrator::new(state, handle.task_id, 1)
            .run(request)
            .await?;
        Ok(state.broker.load(handle.task_id).await?.expect("record"))
    }

    #[tokio::test]
    async fn generate_runs_every_stage() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let state = state(MockProducer::default(), config(dir.path()));

        let record = run(&state, generate("Rust in production")).await?;
        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.stage, Some(Stage::Export));
        assert_eq!(record.attempts, 1);

        let contract = TaskResultContract::validate(record.result.as_ref().expect("result"))?;
        assert_eq!(contract.status, "success");
        let path = contract.artifact_path.expect("artifact path");
        assert!(Path::new(&path).is_absolute());
        assert!(path.ends_with(&format!("Rust_in_production_{}.pptx", record.task_id)));
        Ok(())
    }

    #[tokio::test]
    async fn export_request_skips_generation() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let state = state(producer.clone(), config(dir.path()));

        let request = WorkflowRequest::Export {
            title: "Roadmap".into(),
            slides: vec![Slide::content("Goals", "Ship it")],
        };
        let record = run(&state, request).await?;

        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(producer.calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn outline_request_stops_after_outline() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let state = state(producer.clone(), config(dir.path()));

        let request = WorkflowRequest::Outline {
            prompt: "Rust in production".into(),
        };
        let record = run(&state, request).await?;
        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.stage, Some(Stage::Outline));
        assert_eq!(producer.calls(), 1);

        let contract = TaskResultContract::validate(record.result.as_ref().expect("result"))?;
        assert_eq!(contract.artifact_path, None);
        assert_eq!(contract.message.as_deref(), Some(nodes::OUTLINE_COMPLETED));
        assert!(contract.outline.is_some_and(|outline| !outline.is_empty()));
        assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn content_request_uses_given_outline() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let state = state(producer.clone(), config(dir.path()));

        let outline = Outline {
            main_topic: "Q3 sales".into(),
            outline_items: vec![OutlineItem {
                sub_topic: "Revenue".into(),
                topic1: "EMEA".into(),
                topic2: "APAC".into(),
            }],
            summary_topic: "Next steps".into(),
        };
        let request = WorkflowRequest::Content {
            prompt: "Q3 sales".into(),
            outline,
        };
        let record = run(&state, request).await?;
        assert_eq!(record.state, TaskState::Completed);
        assert_eq!(record.stage, Some(Stage::Content));
        assert_eq!(producer.calls(), 1);

        let contract = TaskResultContract::validate(record.result.as_ref().expect("result"))?;
        assert_eq!(contract.artifact_path, None);
        assert_eq!(contract.title.as_deref(), Some("Q3 sales"));
        assert_eq!(contract.slides.map(|slides| slides.len()), Some(3));
        Ok(())
    }

    #[tokio::test]
    async fn content_failure_names_the_stage() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default().fail_content("model overloaded");
        let state = state(producer, config(dir.path()));

        let record = run(&state, generate("Rust")).await?;
        assert_eq!(record.state, TaskState::Errored);
        assert_eq!(record.stage, Some(Stage::Content));
        let error = record.error.expect("error");
        assert!(error.starts_with("content stage failed: "), "{error}");
        assert!(error.contains("model overloaded"));
        Ok(())
    }

    #[tokio::test]
    async fn content_panic_is_caught() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let state = state(MockProducer::default().panic_content(), config(dir.path()));

        let record = run(&state, generate("Rust")).await?;
        assert_eq!(record.state, TaskState::Errored);
        let error = record.error.expect("error");
        assert!(error.contains("content"), "{error}");
        assert!(error.contains("mock produce_content panicked"), "{error}");
        Ok(())
    }

    #[tokio::test]
    async fn slow_stage_times_out() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default().with_delay(Duration::from_millis(1_500));
        let config =
            config(dir.path()).with_stage_timeout(Stage::Outline, Duration::from_secs(1));
        let state = state(producer, config);

        let record = run(&state, generate("Rust")).await?;
        assert_eq!(record.state, TaskState::Errored);
        assert_eq!(
            record.error.as_deref(),
            Some("outline stage timed out after 1s")
        );
        Ok(())
    }

    #[tokio::test]
    async fn terminal_record_is_not_rerun() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let producer = MockProducer::default();
        let state = state(producer.clone(), config(dir.path()));

        let request = generate("Rust");
        let handle = state.broker.submit(request.clone()).await?;
        let result = json!({"status": "success", "artifact_path": "/tmp/x.pptx", "message": "done"});
        state
            .broker
            .transition(handle.task_id, Transition::Completed { result: result.clone() })
            .await?;

        let outcome = Orchestrator::new(&state, handle.task_id, 2)
            .run(request)
            .await?;
        assert_eq!(outcome, RunOutcome::Superseded);
        assert_eq!(producer.calls(), 0);

        let record = state.broker.load(handle.task_id).await?.expect("record");
        assert_eq!(record.result, Some(result));
        Ok(())
    }
}
