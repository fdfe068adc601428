//! Key-value bucket configuration traits.

/// Marker trait for KV bucket configuration.
///
/// Entry retention is chosen when the store is opened, see
/// [`NatsClient::kv_store_with_ttl`].
///
/// [`NatsClient::kv_store_with_ttl`]: crate::NatsClient::kv_store_with_ttl
pub trait KvBucket: Clone + Send + Sync + 'static {
    /// Bucket name used in NATS KV.
    const NAME: &'static str;

    /// Human-readable description for the bucket.
    const DESCRIPTION: &'static str;
}

/// Bucket for workflow task records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TaskRecordsBucket;

impl KvBucket for TaskRecordsBucket {
    const NAME: &'static str = "task_records";
    const DESCRIPTION: &'static str = "Workflow task states and results";
}
