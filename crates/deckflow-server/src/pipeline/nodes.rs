//! Work nodes of the generation workflow.
//!
//! Every node converts collaborator failures into [`StageResult::Error`] and
//! never returns an `Err`, so the orchestrator only has one failure shape to
//! deal with.

use std::path::Path;

use deckflow_core::render::{PRESENTATION_EXTENSION, filename_stem};
use deckflow_core::types::{Deck, ExportArtifact, Outline, Slide, StageResult};
use uuid::Uuid;

use super::{PipelineState, TRACING_TARGET};

/// Message stored with every successful export.
pub const EXPORT_COMPLETED: &str = "Export completed";

/// Message stored with a finished outline-only task.
pub const OUTLINE_COMPLETED: &str = "Outline completed";

/// Message stored with a finished content-only task.
pub const CONTENT_COMPLETED: &str = "Content completed";

/// Produces the outline for a prompt.
#[tracing::instrument(skip_all, target = TRACING_TARGET)]
pub async fn produce_outline(state: &PipelineState, prompt: &str) -> StageResult<Outline> {
    state.producer.produce_outline(prompt).await.into()
}

/// Expands an outline into slides.
#[tracing::instrument(skip_all, target = TRACING_TARGET, fields(main_topic = %outline.main_topic))]
pub async fn produce_content(
    state: &PipelineState,
    outline: &Outline,
    prompt: &str,
) -> StageResult<Deck> {
    state.producer.produce_content(outline, prompt).await.into()
}

/// Renders the slides and writes the document into the output directory.
///
/// The file is named `<stem>_<task_id>.pptx`, with the stem derived from the
/// title rather than from the renderer's suggestion, so running the node again
/// for the same task overwrites the same file.
#[tracing::instrument(skip_all, target = TRACING_TARGET, fields(task_id = %task_id, slides = slides.len()))]
pub async fn export_document(
    state: &PipelineState,
    task_id: Uuid,
    title: &str,
    slides: &[Slide],
) -> StageResult<ExportArtifact> {
    let renderer = state.renderer.clone();
    let owned_title = title.to_owned();
    let owned_slides = slides.to_vec();

    let rendered =
        tokio::task::spawn_blocking(move || renderer.render(&owned_title, &owned_slides)).await;

    let document = match rendered {
        Ok(Ok(document)) => document,
        Ok(Err(error)) => return StageResult::error(error),
        Err(join_error) => {
            tracing::error!(
                target: TRACING_TARGET,
                task_id = %task_id,
                error = %join_error,
                "Renderer did not complete"
            );
            return StageResult::error(format!("renderer aborted: {join_error}"));
        }
    };

    let filename = format!("{}_{}.{}", filename_stem(title), task_id, PRESENTATION_EXTENSION);
    match write_document(&state.config.output_dir, &filename, &document.buffer).await {
        Ok(path) => {
            tracing::info!(
                target: TRACING_TARGET,
                task_id = %task_id,
                path = %path,
                size_bytes = document.buffer.len(),
                "Document exported"
            );
            StageResult::Success(ExportArtifact {
                artifact_path: path,
                message: EXPORT_COMPLETED.to_owned(),
            })
        }
        Err(error) => StageResult::error(format!("failed to write {filename}: {error}")),
    }
}

/// Writes the buffer and returns the absolute path of the file.
async fn write_document(output_dir: &Path, filename: &str, buffer: &[u8]) -> std::io::Result<String> {
    tokio::fs::create_dir_all(output_dir).await?;
    let directory = tokio::fs::canonicalize(output_dir).await?;
    let path = directory.join(filename);
    tokio::fs::write(&path, buffer).await?;
    Ok(path.to_string_lossy().into_owned())
}
