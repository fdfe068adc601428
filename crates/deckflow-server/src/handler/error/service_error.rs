//! Service and gate error to HTTP error conversion.

use super::http_error::{Error as HttpError, ErrorKind};
use crate::ErrorKind as ServiceErrorKind;
use crate::service::GateError;

/// Tracing target for service error conversions.
const TRACING_TARGET: &str = "deckflow_server::handler::service";

impl From<crate::Error> for HttpError<'static> {
    fn from(error: crate::Error) -> Self {
        match error.kind() {
            ServiceErrorKind::Unavailable | ServiceErrorKind::External => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Task broker unavailable"
                );

                ErrorKind::ServiceUnavailable
                    .with_message("Task broker is unavailable")
                    .with_suggestion("Retry the request later")
            }
            ServiceErrorKind::Config
            | ServiceErrorKind::Serialization
            | ServiceErrorKind::FileSystem
            | ServiceErrorKind::Internal => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %error,
                    error_kind = %error.kind(),
                    "Service operation failed"
                );

                ErrorKind::InternalServerError.into_error()
            }
        }
    }
}

impl From<GateError> for HttpError<'static> {
    fn from(error: GateError) -> Self {
        match error {
            GateError::NotReady => ErrorKind::NotFound
                .with_message("Task not ready")
                .with_resource("task")
                .with_suggestion("Poll the task status until it reports success"),

            GateError::NoArtifact => ErrorKind::NotFound
                .with_message("No file for this task")
                .with_resource("file"),

            GateError::Missing => ErrorKind::NotFound
                .with_message("File missing")
                .with_resource("file"),

            GateError::ExecutionFailed(reason) => ErrorKind::InternalServerError
                .with_message("Task execution failed")
                .with_resource("task")
                .with_context(reason),

            GateError::RelativePath(path) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    path = %path,
                    "Refusing to serve a relative artifact path"
                );

                ErrorKind::InternalServerError
                    .with_message("Invalid artifact path")
                    .with_resource("file")
            }

            GateError::Unreadable(source) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    error = %source,
                    "Failed to read artifact"
                );

                ErrorKind::InternalServerError
                    .with_message("File could not be read")
                    .with_resource("file")
            }

            GateError::Store(error) => error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    fn status(error: HttpError<'static>) -> StatusCode {
        error.kind().status_code()
    }

    #[test]
    fn service_errors() {
        assert_eq!(
            status(crate::Error::unavailable("broker down").into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status(crate::Error::config("bad queue").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn gate_refusals() {
        assert_eq!(status(GateError::NotReady.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(GateError::NoArtifact.into()), StatusCode::NOT_FOUND);
        assert_eq!(status(GateError::Missing.into()), StatusCode::NOT_FOUND);
        assert_eq!(
            status(GateError::ExecutionFailed("outline stage failed: x".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(GateError::RelativePath("out/deck.pptx".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status(GateError::Store(crate::Error::unavailable("kv down")).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn execution_failure_keeps_reason() {
        let error: HttpError<'static> =
            GateError::ExecutionFailed("content stage failed: boom".into()).into();
        assert_eq!(error.context(), Some("content stage failed: boom"));
    }
}
