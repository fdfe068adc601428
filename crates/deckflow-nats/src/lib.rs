#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for NATS client operations.
///
/// Use this target for logging client initialization, configuration, and client-level errors.
pub const TRACING_TARGET_CLIENT: &str = "deckflow_nats::client";

/// Tracing target for NATS key-value store operations.
pub const TRACING_TARGET_KV: &str = "deckflow_nats::kv";

/// Tracing target for JetStream work queue operations.
///
/// Use this target for logging publishes, consumer setup, fetches and acknowledgements.
pub const TRACING_TARGET_QUEUE: &str = "deckflow_nats::queue";

/// Tracing target for NATS connection operations.
pub const TRACING_TARGET_CONNECTION: &str = "deckflow_nats::connection";

mod client;
mod error;
pub mod kv;
pub mod queue;

// Re-export async_nats types needed by consumers
pub use async_nats::jetstream;
pub use client::{NatsClient, NatsConfig};
pub use error::{Error, Result};
