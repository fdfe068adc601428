//! Type-safe NATS KV store wrapper.

use std::marker::PhantomData;
use std::time::Duration;

use async_nats::jetstream::{self, kv};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{KvBucket, KvKey};
use crate::{Error, Result, TRACING_TARGET_KV};

/// Type-safe NATS KV store wrapper.
///
/// This store is generic over:
/// - `K`: The key type
/// - `V`: The value type to store (must be serializable)
/// - `B`: The bucket configuration (determines name and description)
#[derive(Clone)]
pub struct KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    store: kv::Store,
    _key: PhantomData<K>,
    _value: PhantomData<V>,
    _bucket: PhantomData<B>,
}

impl<K, V, B> KvStore<K, V, B>
where
    K: KvKey,
    V: Serialize + DeserializeOwned + Send + Sync + 'static,
    B: KvBucket,
{
    /// Create or get a KV bucket whose entries expire after `ttl`.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_KV)]
    pub(crate) async fn with_ttl(jetstream: &jetstream::Context, ttl: Duration) -> Result<Self> {
        let store = match jetstream.get_key_value(B::NAME).await {
            Ok(store) => {
                tracing::debug!(
                    target: TRACING_TARGET_KV,
                    bucket = %B::NAME,
                    "Using existing KV bucket"
                );
                store
            }
            Err(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_KV,
                    bucket = %B::NAME,
                    ttl_secs = ttl.as_secs(),
                    "Creating new KV bucket"
                );
                let config = kv::Config {
                    bucket: B::NAME.to_string(),
                    description: B::DESCRIPTION.to_string(),
                    max_age: ttl,
                    history: 1,
                    ..Default::default()
                };
                jetstream
                    .create_key_value(config)
                    .await
                    .map_err(|e| Error::operation("kv_create_bucket", e.to_string()))?
            }
        };

        Ok(Self {
            store,
            _key: PhantomData,
            _value: PhantomData,
            _bucket: PhantomData,
        })
    }

    /// Put a value only if the key has no current value.
    #[tracing::instrument(skip(self, value), target = TRACING_TARGET_KV)]
    pub async fn create(&self, key: &K, value: &V) -> Result<KvEntry> {
        let key_str = key.to_string();
        let json = serde_json::to_vec(value)?;
        let size = json.len();
        let revision = self
            .store
            .create(&key_str, json.into())
            .await
            .map_err(|e| match e.kind() {
                kv::CreateErrorKind::AlreadyExists => Error::kv_key_exists(B::NAME, &key_str),
                _ => Error::operation("kv_create", e.to_string()),
            })?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            key = %key_str,
            revision = revision,
            size_bytes = size,
            "Created value in KV store"
        );

        Ok(KvEntry {
            key: key_str,
            revision,
            size: size as u64,
        })
    }

    /// Get a value together with its revision.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn get(&self, key: &K) -> Result<Option<KvValue<V>>> {
        let key_str = key.to_string();
        let entry = self
            .store
            .entry(&key_str)
            .await
            .map_err(|e| Error::operation("kv_get", e.to_string()))?;

        // Deleted and purged keys surface as tombstone entries.
        let Some(entry) = entry.filter(|entry| matches!(entry.operation, kv::Operation::Put)) else {
            tracing::debug!(
                target: TRACING_TARGET_KV,
                key = %key_str,
                "Key not found in KV store"
            );
            return Ok(None);
        };

        let size = entry.value.len();
        let value = serde_json::from_slice(&entry.value)?;
        tracing::debug!(
            target: TRACING_TARGET_KV,
            key = %key_str,
            size_bytes = size,
            revision = entry.revision,
            "Retrieved value from KV store"
        );

        Ok(Some(KvValue {
            key: key_str,
            value,
            revision: entry.revision,
            size: size as u64,
            created: entry.created.into(),
        }))
    }

    /// Get a value, returning just the data.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn get_value(&self, key: &K) -> Result<Option<V>> {
        Ok(self.get(key).await?.map(|kv| kv.value))
    }

    /// Delete a key from the store.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_KV)]
    pub async fn delete(&self, key: &K) -> Result<()> {
        let key_str = key.to_string();
        self.store
            .purge(&key_str)
            .await
            .map_err(|e| Error::operation("kv_delete", e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_KV,
            key = %key_str,
            "Deleted key from KV store"
        );
        Ok(())
    }

    /// Update a value only if the revision matches (optimistic concurrency).
    #[tracing::instrument(skip(self, value), target = TRACING_TARGET_KV)]
    pub async fn update(&self, key: &K, value: &V, revision: u64) -> Result<KvEntry> {
        let key_str = key.to_string();
        let json = serde_json::to_vec(value)?;
        let size = json.len();

        let new_revision = match self.store.update(&key_str, json.into(), revision).await {
            Ok(new_revision) => new_revision,
            Err(e) => return Err(self.classify_update_error(key, revision, e.to_string()).await),
        };

        tracing::debug!(
            target: TRACING_TARGET_KV,
            key = %key_str,
            old_revision = revision,
            new_revision = new_revision,
            size_bytes = size,
            "Updated value in KV store"
        );

        Ok(KvEntry {
            key: key_str,
            revision: new_revision,
            size: size as u64,
        })
    }

    /// Tells a lost optimistic-concurrency race apart from a failed round trip.
    async fn classify_update_error(&self, key: &K, expected: u64, reason: String) -> Error {
        let key_str = key.to_string();
        match self.store.entry(&key_str).await {
            Ok(Some(entry)) if entry.revision != expected => {
                Error::kv_revision_mismatch(key_str, expected, entry.revision)
            }
            Ok(None) => Error::kv_key_not_found(B::NAME, key_str),
            _ => Error::operation("kv_update", reason),
        }
    }
}

/// KV entry metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvEntry {
    pub key: String,
    pub revision: u64,
    pub size: u64,
}

/// KV value with metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KvValue<V> {
    pub key: String,
    pub value: V,
    pub revision: u64,
    pub size: u64,
    pub created: std::time::SystemTime,
}
