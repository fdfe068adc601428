//! Middleware configuration for the HTTP server.
//!
//! Both groups are re-exported from `deckflow-server` and accept CLI
//! arguments or environment variables.
//!
//! ```bash
//! deckflow --request-timeout 60 --open-api-json /openapi.json
//! ```

use anyhow::anyhow;
use clap::Args;
use deckflow_server::middleware::{OpenApiConfig, RecoveryConfig};
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Longest accepted request timeout, in seconds.
const MAX_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Middleware configuration combining OpenAPI and recovery settings.
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Paths of the OpenAPI document and the Scalar UI.
    #[clap(flatten)]
    pub openapi: OpenApiConfig,

    /// Request timeout and panic recovery.
    #[clap(flatten)]
    pub recovery: RecoveryConfig,
}

impl MiddlewareConfig {
    /// Validates both groups.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.openapi.validate().map_err(|e| anyhow!(e))?;
        self.recovery.validate().map_err(|e| anyhow!(e))?;

        if self.recovery.request_timeout > MAX_REQUEST_TIMEOUT_SECS {
            return Err(anyhow!(
                "Request timeout {} seconds is invalid. Must be between 1 and {} seconds.",
                self.recovery.request_timeout,
                MAX_REQUEST_TIMEOUT_SECS
            ));
        }

        Ok(())
    }

    /// Logs middleware configuration at info level.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            openapi_path = %self.openapi.open_api_json,
            scalar_path = %self.openapi.scalar_ui,
            "OpenAPI configuration"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            request_timeout_secs = self.recovery.request_timeout,
            "Recovery configuration"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(request_timeout: u64) -> MiddlewareConfig {
        MiddlewareConfig {
            openapi: OpenApiConfig::default(),
            recovery: RecoveryConfig::with_timeout_secs(request_timeout),
        }
    }

    #[test]
    fn request_timeout_bounds() {
        assert!(config(30).validate().is_ok());
        assert!(config(0).validate().is_err());
        assert!(config(301).validate().is_err());
    }
}
