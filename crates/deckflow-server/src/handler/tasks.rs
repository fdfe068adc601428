//! Task submission, status and file retrieval handlers.
//!
//! Submissions return as soon as the task record exists and the job is
//! queued. Clients then poll the status until it reports `success` or
//! `failure`, and download the exported document once it is `success`.
//! Outline and content tasks carry their draft in the status result and have
//! no file.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;

use crate::broker::TaskBroker;
use crate::extract::{Json, Path, ValidateJson};
use crate::handler::request::{
    ContentTask, ExportTask, GenerateTask, OutlineTask, TaskPathParams,
};
use crate::handler::response::{ArtifactDownload, ErrorResponse, TaskAccepted};
use crate::handler::Result;
use crate::pipeline::WorkflowRequest;
use crate::service::{ArtifactGate, ServiceState, StatusPoller, TaskStatus};

/// Tracing target for task operations.
const TRACING_TARGET: &str = "deckflow_server::handler::tasks";

async fn submit(broker: &TaskBroker, request: WorkflowRequest) -> Result<TaskAccepted> {
    let kind = request.kind();
    let handle = broker.submit(request).await?;

    tracing::info!(
        target: TRACING_TARGET,
        task_id = %handle.task_id,
        kind = %kind,
        "Task submitted"
    );

    Ok(handle.into())
}

/// Submits a deck generation task.
#[tracing::instrument(skip_all)]
async fn generate_task(
    State(broker): State<TaskBroker>,
    ValidateJson(request): ValidateJson<GenerateTask>,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let accepted = submit(&broker, request.into_request()).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

fn generate_task_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Generate deck")
        .description(
            "Queues a task that drafts an outline from the prompt, fills in the slides and \
             exports them as a presentation file.",
        )
        .response::<202, Json<TaskAccepted>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<422, Json<ErrorResponse>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Submits an outline-only task.
#[tracing::instrument(skip_all)]
async fn outline_task(
    State(broker): State<TaskBroker>,
    ValidateJson(request): ValidateJson<OutlineTask>,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let accepted = submit(&broker, request.into_request()).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

fn outline_task_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Draft outline")
        .description(
            "Queues a task that only drafts an outline from the prompt. The outline is returned \
             in the task result; no file is produced.",
        )
        .response::<202, Json<TaskAccepted>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<422, Json<ErrorResponse>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Submits a content-only task for an existing outline.
#[tracing::instrument(skip_all, fields(sections = request.outline.outline_items.len()))]
async fn content_task(
    State(broker): State<TaskBroker>,
    ValidateJson(request): ValidateJson<ContentTask>,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let accepted = submit(&broker, request.into_request()).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

fn content_task_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Draft slides")
        .description(
            "Queues a task that fills in slides for the given outline. The title and slides are \
             returned in the task result and can be passed to the export endpoint.",
        )
        .response::<202, Json<TaskAccepted>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<422, Json<ErrorResponse>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Submits an export of ready-made slides.
#[tracing::instrument(skip_all, fields(slides = request.slides.len()))]
async fn export_task(
    State(broker): State<TaskBroker>,
    ValidateJson(request): ValidateJson<ExportTask>,
) -> Result<(StatusCode, Json<TaskAccepted>)> {
    let accepted = submit(&broker, request.into_request()).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

fn export_task_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Export slides")
        .description("Queues a task that only exports the given slides as a presentation file.")
        .response::<202, Json<TaskAccepted>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<422, Json<ErrorResponse>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Returns the public status of a task.
///
/// Unknown ids are reported as `pending`.
#[tracing::instrument(skip_all, fields(task_id = %path_params.task_id))]
async fn read_task(
    State(poller): State<StatusPoller>,
    Path(path_params): Path<TaskPathParams>,
) -> Result<(StatusCode, Json<TaskStatus>)> {
    let status = poller.get_status(&path_params.task_id).await?;

    tracing::debug!(
        target: TRACING_TARGET,
        state = %status.state,
        "Task status read"
    );

    Ok((StatusCode::OK, Json(status)))
}

fn read_task_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get task status")
        .description(
            "Returns the task state: pending, progress, success or failure. Unknown ids are \
             pending. A successful task carries its validated result, a failed one its error.",
        )
        .response::<200, Json<TaskStatus>>()
        .response::<503, Json<ErrorResponse>>()
}

/// Downloads the exported document of a successful task.
#[tracing::instrument(skip_all, fields(task_id = %path_params.task_id))]
async fn download_task_file(
    State(gate): State<ArtifactGate>,
    Path(path_params): Path<TaskPathParams>,
) -> Result<ArtifactDownload> {
    let artifact = gate.get_artifact(&path_params.task_id).await?;

    tracing::info!(
        target: TRACING_TARGET,
        filename = %artifact.filename,
        size_bytes = artifact.bytes.len(),
        "Task file downloaded"
    );

    Ok(artifact.into())
}

fn download_task_file_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Download task file")
        .description(
            "Streams the exported presentation as an attachment. Returns 404 while the task is \
             not finished, when it produced no file or when the file is gone, and 500 when the \
             task failed.",
        )
        .response::<200, ArtifactDownload>()
        .response::<404, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Returns a [`Router`] with all task routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route("/tasks", post_with(generate_task, generate_task_docs))
        .api_route("/tasks/outline", post_with(outline_task, outline_task_docs))
        .api_route("/tasks/content", post_with(content_task, content_task_docs))
        .api_route("/tasks/export", post_with(export_task, export_task_docs))
        .api_route("/tasks/{task_id}", get_with(read_task, read_task_docs))
        .api_route(
            "/tasks/{task_id}/file",
            get_with(download_task_file, download_task_file_docs),
        )
        .with_path_items(|item| item.tag("Tasks"))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::header;
    use deckflow_core::generate::ProducerService;
    use deckflow_core::mock::{MockProducer, MockRenderer};
    use deckflow_core::render::{PRESENTATION_MEDIA_TYPE, RenderService};
    use serde_json::json;
    use tempfile::TempDir;
    use uuid::Uuid;

    use super::*;
    use crate::broker::{BrokerBackend, MemoryQueue, MemoryStore, Transition};
    use crate::handler::test::create_test_server_with_state;
    use crate::pipeline::{PipelineConfig, PipelineState, WorkerHandles};
    use crate::service::PublicTaskState;

    #[tokio::test]
    async fn generate_returns_pending_task() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;

        let response = server.post("/tasks").json(&json!({"prompt": "Rust"})).await;
        response.assert_status(StatusCode::ACCEPTED);

        let accepted = response.json::<TaskAccepted>();
        assert_eq!(accepted.state, PublicTaskState::Pending);

        let status = server
            .get(&format!("/tasks/{}", accepted.task_id))
            .await
            .json::<TaskStatus>();
        assert_eq!(status.state, PublicTaskState::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn same_prompt_gives_distinct_tasks() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;

        let body = json!({"prompt": "Rust in production"});
        let first = server.post("/tasks").json(&body).await.json::<TaskAccepted>();
        let second = server.post("/tasks").json(&body).await.json::<TaskAccepted>();
        assert_ne!(first.task_id, second.task_id);
        Ok(())
    }

    #[tokio::test]
    async fn blank_prompt_is_unprocessable() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;

        for body in [json!({"prompt": ""}), json!({"prompt": "  \t"}), json!({})] {
            let response = server.post("/tasks").json(&body).await;
            response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
        }

        let response = server
            .post("/tasks")
            .content_type("application/json")
            .bytes("{\"prompt\":".into())
            .await;
        response.assert_status_bad_request();
        Ok(())
    }

    #[tokio::test]
    async fn export_validates_slides() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;

        let response = server
            .post("/tasks/export")
            .json(&json!({"title": "Roadmap", "slides": []}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        let response = server
            .post("/tasks/export")
            .json(&json!({"title": "Roadmap", "slides": [{"title": "Goals"}]}))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        Ok(())
    }

    #[tokio::test]
    async fn unavailable_broker_is_service_unavailable() -> anyhow::Result<()> {
        let queue = std::sync::Arc::new(MemoryQueue::new());
        queue.close();
        let broker = TaskBroker::new(
            BrokerBackend::Memory,
            std::sync::Arc::new(MemoryStore::new()),
            queue,
        );
        let server = create_test_server_with_state(ServiceState::new(broker))?;

        let response = server.post("/tasks").json(&json!({"prompt": "Rust"})).await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);

        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "service_unavailable");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_task_is_pending_without_file() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;
        let task_id = Uuid::now_v7();

        let status = server
            .get(&format!("/tasks/{task_id}"))
            .await
            .json::<TaskStatus>();
        assert_eq!(status.state, PublicTaskState::Pending);

        server
            .get(&format!("/tasks/{task_id}/file"))
            .await
            .assert_status_not_found();
        Ok(())
    }

    #[tokio::test]
    async fn failed_task_file_is_server_error() -> anyhow::Result<()> {
        let broker = TaskBroker::memory();
        let server = create_test_server_with_state(ServiceState::new(broker.clone()))?;

        let handle = broker
            .submit(WorkflowRequest::Generate {
                prompt: "Rust".into(),
            })
            .await?;
        broker
            .transition(
                handle.task_id,
                Transition::Errored {
                    error: "content stage failed: boom".into(),
                },
            )
            .await?;

        let response = server.get(&format!("/tasks/{}/file", handle.task_id)).await;
        response.assert_status_internal_server_error();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["context"], "content stage failed: boom");
        Ok(())
    }

    #[tokio::test]
    async fn generated_deck_can_be_downloaded() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let broker = TaskBroker::memory();
        let service_state = ServiceState::new(broker);
        let pipeline_state = PipelineState::new(
            &service_state,
            ProducerService::new(MockProducer::default().with_delay(Duration::from_millis(50))),
            RenderService::new(MockRenderer::new()),
            PipelineConfig::default()
                .with_output_dir(dir.path())
                .with_fetch_wait(Duration::from_millis(50)),
        );
        let server = create_test_server_with_state(service_state)?;

        let accepted = server
            .post("/tasks")
            .json(&json!({"prompt": "Rust in production"}))
            .await
            .json::<TaskAccepted>();

        let workers = WorkerHandles::spawn(&pipeline_state);

        let mut seen = vec![PublicTaskState::Pending];
        let status = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let status = server
                    .get(&format!("/tasks/{}", accepted.task_id))
                    .await
                    .json::<TaskStatus>();
                if seen.last() != Some(&status.state) {
                    seen.push(status.state);
                }
                if status.state.is_terminal() {
                    break status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;

        assert_eq!(
            seen,
            [
                PublicTaskState::Pending,
                PublicTaskState::Progress,
                PublicTaskState::Success
            ]
        );

        let artifact_path = status
            .result
            .and_then(|result| result.artifact_path)
            .unwrap_or_default();
        assert!(std::path::Path::new(&artifact_path).is_absolute());
        assert!(artifact_path.ends_with(".pptx"));

        let response = server
            .get(&format!("/tasks/{}/file", accepted.task_id))
            .await;
        response.assert_status_ok();
        assert_eq!(response.header(header::CONTENT_TYPE), PRESENTATION_MEDIA_TYPE);
        assert_eq!(response.as_bytes().as_ref(), std::fs::read(&artifact_path)?);

        workers.shutdown();
        workers.wait_all().await?;
        Ok(())
    }

    async fn completed_task(
        broker: &TaskBroker,
        result: serde_json::Value,
    ) -> anyhow::Result<Uuid> {
        let handle = broker
            .submit(WorkflowRequest::Generate {
                prompt: "Rust".into(),
            })
            .await?;
        broker
            .transition(handle.task_id, Transition::Completed { result })
            .await?;
        Ok(handle.task_id)
    }

    #[tokio::test]
    async fn relative_artifact_path_is_server_error() -> anyhow::Result<()> {
        let broker = TaskBroker::memory();
        let server = create_test_server_with_state(ServiceState::new(broker.clone()))?;
        let task_id = completed_task(
            &broker,
            json!({"status": "success", "artifact_path": "output/deck.pptx"}),
        )
        .await?;

        let response = server.get(&format!("/tasks/{task_id}/file")).await;
        response.assert_status_internal_server_error();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["message"], "Invalid artifact path");
        Ok(())
    }

    #[tokio::test]
    async fn missing_artifact_file_is_not_found() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("Roadmap_gone.pptx");
        let broker = TaskBroker::memory();
        let server = create_test_server_with_state(ServiceState::new(broker.clone()))?;
        let task_id = completed_task(
            &broker,
            json!({"status": "success", "artifact_path": path.to_string_lossy()}),
        )
        .await?;

        let response = server.get(&format!("/tasks/{task_id}/file")).await;
        response.assert_status_not_found();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "not_found");
        assert_eq!(body["message"], "File missing");
        Ok(())
    }

    #[tokio::test]
    async fn content_task_needs_outline_sections() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(TaskBroker::memory()))?;

        let mut outline = json!({"main_topic": "Q3", "outline_items": [], "summary_topic": "Wrap"});
        let response = server
            .post("/tasks/content")
            .json(&json!({"prompt": "Q3", "outline": outline.clone()}))
            .await;
        response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

        outline["outline_items"] = json!([{"sub_topic": "Revenue"}]);
        let response = server
            .post("/tasks/content")
            .json(&json!({"prompt": "Q3", "outline": outline}))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        Ok(())
    }

    #[tokio::test]
    async fn outline_task_has_result_but_no_file() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let service_state = ServiceState::new(TaskBroker::memory());
        let pipeline_state = PipelineState::new(
            &service_state,
            ProducerService::new(MockProducer::default()),
            RenderService::new(MockRenderer::new()),
            PipelineConfig::default()
                .with_output_dir(dir.path())
                .with_fetch_wait(Duration::from_millis(50)),
        );
        let server = create_test_server_with_state(service_state)?;
        let workers = WorkerHandles::spawn(&pipeline_state);

        let response = server
            .post("/tasks/outline")
            .json(&json!({"prompt": "Rust in production"}))
            .await;
        response.assert_status(StatusCode::ACCEPTED);
        let accepted = response.json::<TaskAccepted>();

        let status = tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let status = server
                    .get(&format!("/tasks/{}", accepted.task_id))
                    .await
                    .json::<TaskStatus>();
                if status.state.is_terminal() {
                    break status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await?;

        assert_eq!(status.state, PublicTaskState::Success);
        let result = status.result.expect("result");
        assert_eq!(result.artifact_path, None);
        assert_eq!(
            result.outline.map(|outline| outline.main_topic).as_deref(),
            Some("Rust in production")
        );

        let response = server
            .get(&format!("/tasks/{}/file", accepted.task_id))
            .await;
        response.assert_status_not_found();
        let body = response.json::<serde_json::Value>();
        assert_eq!(body["name"], "not_found");
        assert_eq!(body["message"], "No file for this task");

        workers.shutdown();
        workers.wait_all().await?;
        Ok(())
    }
}
