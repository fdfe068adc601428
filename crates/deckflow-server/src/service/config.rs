use std::time::Duration;

use deckflow_nats::{NatsClient, NatsConfig};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::broker::{BrokerBackend, NatsBrokerOptions, TaskBroker};
use crate::service::{Error, Result};

/// Default values for configuration options.
mod defaults {
    /// Default work queue name; the stream is `JOBS_WORKFLOW`.
    pub const QUEUE_NAME: &str = "workflow";

    /// Default durable consumer shared by all workers.
    pub const CONSUMER_NAME: &str = "deckflow-workers";

    /// Default retention of task records in seconds (24 hours).
    pub const RECORD_TTL_SECS: u64 = 24 * 60 * 60;

    /// Default time a delivery may stay unacknowledged, in seconds.
    pub const ACK_WAIT_SECS: u64 = 1_260;

    /// Default deliveries per job, including the first one.
    pub const MAX_DELIVER: i64 = 4;
}

/// App [`state`] configuration.
///
/// [`state`]: crate::service::ServiceState
#[derive(Debug, Clone, Serialize, Deserialize, Builder)]
#[must_use = "config does nothing unless you use it"]
#[builder(
    pattern = "owned",
    setter(into, strip_option, prefix = "with"),
    build_fn(validate = "Self::validate")
)]
pub struct ServiceConfig {
    /// Which broker holds task records and jobs.
    #[builder(default)]
    pub broker_backend: BrokerBackend,

    /// NATS connection settings, used by the NATS backend.
    #[builder(default)]
    pub nats_config: NatsConfig,

    /// Work queue name.
    #[builder(default = "defaults::QUEUE_NAME.to_string()")]
    pub queue_name: String,

    /// Durable consumer name.
    #[builder(default = "defaults::CONSUMER_NAME.to_string()")]
    pub consumer_name: String,

    /// Retention of task records in seconds.
    #[builder(default = "defaults::RECORD_TTL_SECS")]
    pub record_ttl_secs: u64,

    /// Time a delivery may stay unacknowledged before it is resent, in seconds.
    #[builder(default = "defaults::ACK_WAIT_SECS")]
    pub ack_wait_secs: u64,

    /// Deliveries per job, including the first one.
    #[builder(default = "defaults::MAX_DELIVER")]
    pub max_deliver: i64,
}

impl ServiceConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    /// Returns the options of the NATS broker backend.
    pub fn nats_broker_options(&self) -> NatsBrokerOptions {
        NatsBrokerOptions {
            queue_name: self.queue_name.clone(),
            consumer_name: self.consumer_name.clone(),
            ack_wait: Duration::from_secs(self.ack_wait_secs),
            max_deliver: self.max_deliver,
            record_ttl: Duration::from_secs(self.record_ttl_secs),
        }
    }

    /// Creates the task broker for the configured backend.
    pub async fn connect_broker(&self) -> Result<TaskBroker> {
        match self.broker_backend {
            BrokerBackend::Memory => Ok(TaskBroker::memory()),
            BrokerBackend::Nats => {
                let client = self.connect_nats().await?;
                TaskBroker::nats(&client, &self.nats_broker_options()).await
            }
        }
    }

    /// Connects to NATS server.
    pub async fn connect_nats(&self) -> Result<NatsClient> {
        NatsClient::connect(self.nats_config.clone())
            .await
            .map_err(|e| Error::external("NATS", "Failed to connect to NATS").with_source(e))
    }
}

impl ServiceConfigBuilder {
    /// Wrapper for builder validation that returns String errors.
    fn validate(builder: &ServiceConfigBuilder) -> Result<(), String> {
        if let Some(nats_config) = &builder.nats_config {
            nats_config.validate()?;
        }

        if let Some(queue_name) = &builder.queue_name {
            if queue_name.is_empty() {
                return Err("Queue name cannot be empty".to_string());
            }
            if !queue_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                return Err(
                    "Queue name may only contain letters, digits, '-' and '_'".to_string(),
                );
            }
        }

        if let Some(consumer_name) = &builder.consumer_name
            && consumer_name.is_empty()
        {
            return Err("Consumer name cannot be empty".to_string());
        }

        if let Some(record_ttl_secs) = &builder.record_ttl_secs
            && *record_ttl_secs == 0
        {
            return Err("Task record TTL must be greater than 0".to_string());
        }

        if let Some(ack_wait_secs) = &builder.ack_wait_secs
            && *ack_wait_secs == 0
        {
            return Err("Ack wait must be greater than 0".to_string());
        }

        if let Some(max_deliver) = &builder.max_deliver
            && *max_deliver < 2
        {
            return Err("Max deliver must be at least 2".to_string());
        }

        Ok(())
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            broker_backend: BrokerBackend::default(),
            nats_config: NatsConfig::default(),
            queue_name: defaults::QUEUE_NAME.to_string(),
            consumer_name: defaults::CONSUMER_NAME.to_string(),
            record_ttl_secs: defaults::RECORD_TTL_SECS,
            ack_wait_secs: defaults::ACK_WAIT_SECS,
            max_deliver: defaults::MAX_DELIVER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = ServiceConfig::builder().build().unwrap();
        assert_eq!(config.broker_backend, BrokerBackend::Memory);
        assert_eq!(config.queue_name, "workflow");

        let options = config.nats_broker_options();
        assert_eq!(options.record_ttl, Duration::from_secs(86_400));
        assert_eq!(options.max_deliver, 4);
    }

    #[test]
    fn builder_rejects_invalid_values() {
        assert!(ServiceConfig::builder().with_queue_name("").build().is_err());
        assert!(
            ServiceConfig::builder()
                .with_queue_name("jobs.workflow")
                .build()
                .is_err()
        );
        assert!(ServiceConfig::builder().with_max_deliver(1).build().is_err());
    }

    #[tokio::test]
    async fn memory_backend_needs_no_connection() -> anyhow::Result<()> {
        let broker = ServiceConfig::default().connect_broker().await?;
        assert_eq!(broker.backend(), BrokerBackend::Memory);
        broker.ping().await?;
        Ok(())
    }
}
