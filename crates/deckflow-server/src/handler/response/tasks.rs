//! Task response types.

use aide::generate::GenContext;
use aide::openapi::{Operation, Response as OpenApiResponse};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::TaskHandle;
use crate::service::{Artifact, PublicTaskState};

/// Response returned when a task is accepted.
#[must_use]
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TaskAccepted {
    /// Identifier to poll.
    pub task_id: Uuid,
    /// Always `pending` at submission.
    pub state: PublicTaskState,
}

impl From<TaskHandle> for TaskAccepted {
    fn from(handle: TaskHandle) -> Self {
        Self {
            task_id: handle.task_id,
            state: PublicTaskState::Pending,
        }
    }
}

/// Exported document sent as an attachment.
#[must_use]
#[derive(Debug, Clone)]
pub struct ArtifactDownload {
    filename: String,
    media_type: &'static str,
    bytes: Bytes,
}

impl ArtifactDownload {
    /// Returns the `content-disposition` value of this download.
    pub fn content_disposition(&self) -> String {
        let filename = self.filename.replace(['"', '\\', '\r', '\n'], "_");
        format!("attachment; filename=\"{filename}\"")
    }
}

impl From<Artifact> for ArtifactDownload {
    fn from(artifact: Artifact) -> Self {
        Self {
            filename: artifact.filename,
            media_type: artifact.media_type,
            bytes: artifact.bytes,
        }
    }
}

impl IntoResponse for ArtifactDownload {
    fn into_response(self) -> Response {
        let disposition = HeaderValue::try_from(self.content_disposition())
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

        let headers = [
            (header::CONTENT_TYPE, HeaderValue::from_static(self.media_type)),
            (header::CONTENT_DISPOSITION, disposition),
            (header::CONTENT_LENGTH, HeaderValue::from(self.bytes.len())),
        ];

        (StatusCode::OK, headers, self.bytes).into_response()
    }
}

impl aide::OperationOutput for ArtifactDownload {
    type Inner = Bytes;

    fn operation_response(
        ctx: &mut GenContext,
        operation: &mut Operation,
    ) -> Option<OpenApiResponse> {
        Bytes::operation_response(ctx, operation)
    }

    fn inferred_responses(
        ctx: &mut GenContext,
        operation: &mut Operation,
    ) -> Vec<(Option<u16>, OpenApiResponse)> {
        Bytes::inferred_responses(ctx, operation)
    }
}
