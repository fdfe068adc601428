//! Middleware for `axum::Router` and HTTP request processing.
//!
//! - Recovery: handler panics, request timeouts and tower errors
//! - Observability: request ids and request tracing
//! - Security: request body limits
//! - OpenAPI: generated document and Scalar UI
//!
//! ```rust,no_run
//! use deckflow_server::handler::routes;
//! use deckflow_server::middleware::{
//!     OpenApiConfig, RecoveryConfig, RouterObservabilityExt, RouterOpenApiExt,
//!     RouterRecoveryExt, RouterSecurityExt,
//! };
//! use deckflow_server::service::ServiceState;
//!
//! # fn app(state: ServiceState) -> axum::Router {
//! routes()
//!     .with_open_api(OpenApiConfig::default())
//!     .with_default_security()
//!     .with_recovery(&RecoveryConfig::default())
//!     .with_observability()
//!     .with_state(state)
//! # }
//! ```

mod observability;
mod recovery;
mod security;
mod specification;

pub use observability::RouterObservabilityExt;
pub use recovery::{RecoveryConfig, RouterRecoveryExt};
pub use security::{DEFAULT_MAX_BODY_SIZE, RouterSecurityExt};
pub use specification::{OpenApiConfig, RouterOpenApiExt};
