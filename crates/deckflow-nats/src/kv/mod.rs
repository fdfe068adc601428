//! NATS Key-Value store operations.
//!
//! This module provides type-safe abstractions over NATS KV:
//! - `KvStore<K, V, B>`: Generic type-safe key-value operations
//! - `KvKey`: Trait for key types
//! - `KvBucket`: Trait for bucket configuration
//!
//! # Example
//!
//! ```ignore
//! let store: KvStore<TaskKey, TaskRecord, TaskRecordsBucket> =
//!     nats_client.kv_store_with_ttl(Duration::from_secs(3600)).await?;
//!
//! let key = TaskKey::from(Uuid::now_v7());
//! store.create(&key, &record).await?;
//!
//! if let Some(current) = store.get(&key).await? {
//!     store.update(&key, &next, current.revision).await?;
//! }
//! ```

mod kv_bucket;
mod kv_key;
mod kv_store;

pub use kv_bucket::{KvBucket, TaskRecordsBucket};
pub use kv_key::{KvKey, TaskKey};
pub use kv_store::{KvEntry, KvStore, KvValue};
