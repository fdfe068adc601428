//! OpenAPI specification middleware with Scalar UI integration.
//!
//! The document is generated from the routes of an aide [`ApiRouter`] and
//! served as JSON next to a Scalar API reference.
//!
//! [`ApiRouter`]: aide::axum::ApiRouter

use aide::axum::ApiRouter;
use aide::openapi::{Info, OpenApi};
use aide::scalar::Scalar;
use axum::routing::{Router, get};
use axum::{Extension, Json};
#[cfg(feature = "config")]
use clap::Args;
use serde::{Deserialize, Serialize};

/// OpenAPI configuration for aide integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct OpenApiConfig {
    /// Path which exposes the OpenAPI JSON specification.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_JSON_PATH", default_value = "/api/openapi.json")
    )]
    pub open_api_json: String,

    /// Path which exposes the Scalar API reference UI.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "OPENAPI_SCALAR_PATH", default_value = "/api/scalar")
    )]
    pub scalar_ui: String,
}

impl Default for OpenApiConfig {
    fn default() -> Self {
        Self {
            open_api_json: "/api/openapi.json".to_owned(),
            scalar_ui: "/api/scalar".to_owned(),
        }
    }
}

impl OpenApiConfig {
    /// Validates that both paths are absolute and distinct.
    pub fn validate(&self) -> Result<(), String> {
        if !self.open_api_json.starts_with('/') || !self.scalar_ui.starts_with('/') {
            return Err("OpenAPI paths must start with '/'".to_string());
        }
        if self.open_api_json == self.scalar_ui {
            return Err("OpenAPI JSON and Scalar UI paths must differ".to_string());
        }
        Ok(())
    }
}

/// Extension trait for [`ApiRouter`] to add OpenAPI documentation with Scalar UI.
///
/// [`ApiRouter`]: aide::axum::ApiRouter
pub trait RouterOpenApiExt<S> {
    /// Adds the OpenAPI JSON and Scalar UI routes with the default API info.
    fn with_open_api(self, config: OpenApiConfig) -> Router<S>;

    /// Adds the OpenAPI JSON and Scalar UI routes with custom API info.
    fn with_open_api_info(self, config: OpenApiConfig, info: Info) -> Router<S>;
}

impl<S> RouterOpenApiExt<S> for ApiRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_open_api(self, config: OpenApiConfig) -> Router<S> {
        let info = Info {
            title: "Deckflow API".to_owned(),
            summary: Some("Asynchronous slide deck generation".to_owned()),
            description: Some(
                "Submit a prompt or ready-made slides, poll the task until it finishes, then \
                download the exported presentation."
                    .to_owned(),
            ),
            version: env!("CARGO_PKG_VERSION").to_owned(),
            ..Info::default()
        };

        self.with_open_api_info(config, info)
    }

    fn with_open_api_info(self, config: OpenApiConfig, info: Info) -> Router<S> {
        async fn serve_openapi(Extension(api): Extension<OpenApi>) -> Json<OpenApi> {
            Json(api)
        }

        let mut api = OpenApi {
            info,
            ..OpenApi::default()
        };

        let scalar = Scalar::new(&config.open_api_json);
        let router = self
            .route(&config.scalar_ui, scalar.axum_route())
            .route(&config.open_api_json, get(serve_openapi));

        router.finish_api(&mut api).layer(Extension(api))
    }
}

#[cfg(test)]
mod tests {
    use axum_test::TestServer;

    use super::*;
    use crate::broker::TaskBroker;
    use crate::handler::routes;
    use crate::service::ServiceState;

    #[tokio::test]
    async fn serves_generated_document() -> anyhow::Result<()> {
        let app = routes()
            .with_open_api(OpenApiConfig::default())
            .with_state(ServiceState::new(TaskBroker::memory()));
        let server = TestServer::new(app)?;

        let response = server.get("/api/openapi.json").await;
        response.assert_status_ok();

        let document = response.json::<serde_json::Value>();
        assert_eq!(document["info"]["title"], "Deckflow API");
        assert!(document["paths"]["/tasks"]["post"].is_object());
        assert!(document["paths"]["/tasks/{task_id}/file"]["get"].is_object());
        assert!(document["paths"]["/health"]["get"].is_object());

        server.get("/api/scalar").await.assert_status_ok();
        Ok(())
    }

    #[test]
    fn paths_must_be_absolute() {
        let config = OpenApiConfig {
            open_api_json: "api/openapi.json".into(),
            ..OpenApiConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(OpenApiConfig::default().validate().is_ok());
    }
}
