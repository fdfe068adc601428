//! Guarded retrieval of exported documents.

use std::path::{Path, PathBuf};

use bytes::Bytes;
use deckflow_core::render::PRESENTATION_MEDIA_TYPE;

use super::{PublicTaskState, StatusPoller};
use crate::Error;

/// Tracing target for artifact retrieval.
const TRACING_TARGET: &str = "deckflow_server::service::gate";

/// Reasons the gate refuses to serve an artifact.
///
/// Checks run in declaration order; the first that applies wins.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The task has not reached a terminal state.
    #[error("task not ready")]
    NotReady,
    /// The task failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// The task succeeded without producing a file.
    #[error("no artifact for this task")]
    NoArtifact,
    /// The stored path is relative and is not resolved against anything.
    #[error("artifact path is not absolute: {0}")]
    RelativePath(String),
    /// The file is gone.
    #[error("artifact missing")]
    Missing,
    /// The file exists but could not be read.
    #[error("failed to read artifact: {0}")]
    Unreadable(#[source] std::io::Error),
    /// The result store could not be read.
    #[error(transparent)]
    Store(#[from] Error),
}

/// A document ready to be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Absolute path of the file.
    pub path: PathBuf,
    /// Basename used in the download.
    pub filename: String,
    /// Media type of the document.
    pub media_type: &'static str,
    /// File contents.
    pub bytes: Bytes,
}

/// File retrieval gate.
///
/// Only serves the file of a task whose status is `success` and whose
/// validated result points at an existing absolute path.
#[derive(Debug, Clone)]
pub struct ArtifactGate {
    poller: StatusPoller,
}

impl ArtifactGate {
    /// Creates a new gate reading task status through the poller.
    pub fn new(poller: StatusPoller) -> Self {
        Self { poller }
    }

    /// Returns the artifact of a task or the reason it cannot be served.
    #[tracing::instrument(skip(self), target = TRACING_TARGET)]
    pub async fn get_artifact(&self, task_id: &str) -> Result<Artifact, GateError> {
        let status = self.poller.get_status(task_id).await?;

        match status.state {
            PublicTaskState::Pending | PublicTaskState::Progress => {
                return Err(GateError::NotReady);
            }
            PublicTaskState::Failure => {
                let error = status.error.unwrap_or_else(|| "task failed".to_owned());
                return Err(GateError::ExecutionFailed(error));
            }
            PublicTaskState::Success => {}
        }

        let Some(artifact_path) = status.result.and_then(|result| result.artifact_path) else {
            return Err(GateError::NoArtifact);
        };

        let path = PathBuf::from(&artifact_path);
        if !path.is_absolute() {
            tracing::error!(
                target: TRACING_TARGET,
                task_id = %task_id,
                path = %artifact_path,
                "Stored artifact path is relative"
            );
            return Err(GateError::RelativePath(artifact_path));
        }

        if !is_file(&path).await {
            tracing::warn!(
                target: TRACING_TARGET,
                task_id = %task_id,
                path = %artifact_path,
                "Artifact file is missing"
            );
            return Err(GateError::Missing);
        }

        let bytes = tokio::fs::read(&path).await.map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => GateError::Missing,
            _ => GateError::Unreadable(err),
        })?;

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        tracing::debug!(
            target: TRACING_TARGET,
            task_id = %task_id,
            filename = %filename,
            size_bytes = bytes.len(),
            "Serving artifact"
        );

        Ok(Artifact {
            path,
            filename,
            media_type: PRESENTATION_MEDIA_TYPE,
            bytes: Bytes::from(bytes),
        })
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .is_ok_and(|metadata| metadata.is_file())
}
