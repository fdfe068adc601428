//! Monitor response types.

use jiff::Timestamp;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::broker::BrokerBackend;

/// Overall service health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ServiceHealth {
    /// The broker answers.
    Healthy,
    /// The broker cannot be reached; submissions fail with 503.
    Degraded,
}

/// System monitoring status response.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct HealthStatus {
    /// Overall system health status.
    pub status: ServiceHealth,
    /// Configured broker backend.
    pub broker: BrokerBackend,
    /// Application version.
    pub version: String,
    /// Timestamp when this status was generated.
    pub checked_at: Timestamp,
}

impl HealthStatus {
    /// Creates a status for the given broker backend.
    pub fn new(broker: BrokerBackend, broker_reachable: bool) -> Self {
        let status = if broker_reachable {
            ServiceHealth::Healthy
        } else {
            ServiceHealth::Degraded
        };

        Self {
            status,
            broker,
            version: env!("CARGO_PKG_VERSION").to_string(),
            checked_at: Timestamp::now(),
        }
    }
}
