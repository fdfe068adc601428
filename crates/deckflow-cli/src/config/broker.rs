//! Task broker configuration.

use anyhow::Context;
use clap::Args;
use deckflow_nats::NatsConfig;
use deckflow_server::broker::BrokerBackend;
use deckflow_server::pipeline::PipelineConfig;
use deckflow_server::service::ServiceConfig;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET_CONFIG;

/// Where task records and queued jobs live.
///
/// ```bash
/// # Single process, nothing to run next to it
/// deckflow --broker memory
///
/// # Several processes sharing a NATS server
/// deckflow --broker nats --nats-url nats://nats:4222
/// ```
#[derive(Debug, Clone, Args, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// Broker backend.
    #[arg(long = "broker", env = "BROKER_BACKEND", value_enum, default_value = "memory")]
    pub broker_backend: BrokerBackend,

    /// NATS connection settings, used by the `nats` backend.
    #[clap(flatten)]
    pub nats: NatsConfig,

    /// Work queue name; the JetStream stream is `JOBS_{NAME}`.
    #[arg(long = "queue-name", env = "BROKER_QUEUE_NAME", default_value = "workflow")]
    pub queue_name: String,

    /// Durable consumer shared by all workers.
    #[arg(
        long = "consumer-name",
        env = "BROKER_CONSUMER_NAME",
        default_value = "deckflow-workers"
    )]
    pub consumer_name: String,

    /// How long task records are kept, in seconds.
    #[arg(long = "record-ttl", env = "TASK_RECORD_TTL_SECS", default_value_t = 86_400)]
    pub record_ttl_secs: u64,
}

impl BrokerConfig {
    /// Builds the service configuration.
    ///
    /// Redelivery settings come from the pipeline so that a delivery is only
    /// resent once every stage had its full time budget.
    pub fn service_config(&self, pipeline: &PipelineConfig) -> anyhow::Result<ServiceConfig> {
        ServiceConfig::builder()
            .with_broker_backend(self.broker_backend)
            .with_nats_config(self.nats.clone())
            .with_queue_name(self.queue_name.clone())
            .with_consumer_name(self.consumer_name.clone())
            .with_record_ttl_secs(self.record_ttl_secs)
            .with_ack_wait_secs(pipeline.ack_wait().as_secs())
            .with_max_deliver(pipeline.max_deliver())
            .build()
            .context("invalid broker configuration")
    }

    /// Logs broker configuration (no credentials).
    pub fn log(&self) {
        match self.broker_backend {
            BrokerBackend::Memory => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                backend = %self.broker_backend,
                record_ttl_secs = self.record_ttl_secs,
                "Broker configuration"
            ),
            BrokerBackend::Nats => tracing::info!(
                target: TRACING_TARGET_CONFIG,
                backend = %self.broker_backend,
                nats_url = %self.nats.nats_url,
                queue_name = %self.queue_name,
                consumer_name = %self.consumer_name,
                record_ttl_secs = self.record_ttl_secs,
                "Broker configuration"
            ),
        }
    }
}
