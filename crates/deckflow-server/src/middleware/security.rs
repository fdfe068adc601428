//! Request body limits.

use axum::Router;
use axum::extract::DefaultBodyLimit;
use tower_http::limit::RequestBodyLimitLayer;

pub use crate::extract::reject::enhanced_json::MAX_JSON_PAYLOAD_SIZE as DEFAULT_MAX_BODY_SIZE;

/// Extension trait for `axum::`[`Router`] to apply security middleware.
pub trait RouterSecurityExt<S> {
    /// Limits request bodies to `max_body_size` bytes.
    fn with_security(self, max_body_size: usize) -> Self;

    /// Limits request bodies to [`DEFAULT_MAX_BODY_SIZE`].
    fn with_default_security(self) -> Self;
}

impl<S> RouterSecurityExt<S> for Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_security(self, max_body_size: usize) -> Self {
        self.layer(DefaultBodyLimit::max(max_body_size))
            .layer(RequestBodyLimitLayer::new(max_body_size))
    }

    fn with_default_security(self) -> Self {
        self.with_security(DEFAULT_MAX_BODY_SIZE)
    }
}
