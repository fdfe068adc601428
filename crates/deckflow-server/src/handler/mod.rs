//! All `axum::`[`Router`]s with related `axum::`[`Handler`]s.
//!
//! [`Router`]: axum::routing::Router
//! [`Handler`]: axum::handler::Handler

mod error;
mod monitors;
mod request;
mod response;
mod tasks;

use aide::axum::ApiRouter;
use axum::response::{IntoResponse, Response};

pub use crate::handler::error::{Error, ErrorKind, Result};
pub use crate::handler::request::{ExportTask, GenerateTask, TaskPathParams};
pub use crate::handler::response::{
    ArtifactDownload, ErrorResponse, HealthStatus, ServiceHealth, TaskAccepted,
    ValidationErrorDetail,
};
use crate::service::ServiceState;

#[inline]
async fn handler() -> Response {
    ErrorKind::NotFound.into_response()
}

/// Returns an [`ApiRouter`] with all routes.
///
/// Unmatched paths answer with a `not_found` error body.
pub fn routes() -> ApiRouter<ServiceState> {
    ApiRouter::new()
        .merge(tasks::routes())
        .merge(monitors::routes())
        .fallback(handler)
}

#[cfg(test)]
pub(crate) mod test {
    use aide::openapi::OpenApi;
    use axum_test::TestServer;

    use crate::handler::routes;
    use crate::service::ServiceState;

    /// Returns a new [`TestServer`] with all routes and the given state.
    pub fn create_test_server_with_state(state: ServiceState) -> anyhow::Result<TestServer> {
        let mut api = OpenApi::default();
        let app = routes().finish_api(&mut api).with_state(state);
        let server = TestServer::new(app)?;
        Ok(server)
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() -> anyhow::Result<()> {
        let server = create_test_server_with_state(ServiceState::new(
            crate::broker::TaskBroker::memory(),
        ))?;

        let response = server.get("/unknown").await;
        response.assert_status_not_found();
        assert_eq!(response.json::<serde_json::Value>()["name"], "not_found");
        Ok(())
    }
}
