//! Service health handler.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use axum::http::StatusCode;

use crate::broker::TaskBroker;
use crate::extract::Json;
use crate::handler::Result;
use crate::handler::response::HealthStatus;
use crate::service::ServiceState;

/// Tracing target for monitor operations.
const TRACING_TARGET: &str = "deckflow_server::handler::monitors";

/// Reports whether the broker can be reached.
#[tracing::instrument(skip_all)]
async fn health_status(
    State(broker): State<TaskBroker>,
) -> Result<(StatusCode, Json<HealthStatus>)> {
    let reachable = match broker.ping().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(
                target: TRACING_TARGET,
                error = %error,
                backend = %broker.backend(),
                "Broker health check failed"
            );
            false
        }
    };

    Ok((
        StatusCode::OK,
        Json(HealthStatus::new(broker.backend(), reachable)),
    ))
}

fn health_status_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get service health")
        .description("Returns `healthy` when the broker answers and `degraded` otherwise.")
        .response::<200, Json<HealthStatus>>()
}

/// Returns a [`Router`] with all health monitoring routes.
///
/// [`Router`]: axum::routing::Router
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        .api_route("/health", get_with(health_status, health_status_docs))
        .with_path_items(|item| item.tag("Monitors"))
}
