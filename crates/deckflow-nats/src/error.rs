//! Error types and utilities for NATS operations.

use std::time::Duration;

/// Result type for all NATS operations in this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Unified error type for NATS operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// NATS client/connection errors
    #[error("NATS connection error: {0}")]
    Connection(#[from] async_nats::Error),

    /// Serialization errors when sending or receiving messages
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Operation timeout
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// Message delivery failed
    #[error("Message delivery failed to subject '{subject}': {reason}")]
    DeliveryFailed { subject: String, reason: String },

    /// Stream operation failed
    #[error("Stream operation failed on '{stream}': {error}")]
    StreamError { stream: String, error: String },

    /// Consumer operation failed
    #[error("Consumer '{consumer}' error: {reason}")]
    ConsumerError { consumer: String, reason: String },

    /// Acknowledgement of a delivered message failed
    #[error("Acknowledgement error: {0}")]
    Ack(String),

    /// KV key already present on create
    #[error("Key '{key}' already exists in bucket '{bucket}'")]
    KvKeyExists { bucket: String, key: String },

    /// KV key not found
    #[error("Key '{key}' not found in bucket '{bucket}'")]
    KvKeyNotFound { bucket: String, key: String },

    /// KV revision mismatch (optimistic concurrency failure)
    #[error("Revision mismatch for key '{key}': expected {expected}, got {actual}")]
    KvRevisionMismatch {
        key: String,
        expected: u64,
        actual: u64,
    },

    /// Invalid configuration
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Generic operation error with context
    #[error("NATS operation failed: {operation} - {details}")]
    Operation { operation: String, details: String },
}

impl Error {
    /// Create a delivery failed error
    pub fn delivery_failed(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DeliveryFailed {
            subject: subject.into(),
            reason: reason.into(),
        }
    }

    /// Create a stream error
    pub fn stream_error(stream: impl Into<String>, error: impl Into<String>) -> Self {
        Self::StreamError {
            stream: stream.into(),
            error: error.into(),
        }
    }

    /// Create a consumer error
    pub fn consumer_error(consumer: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConsumerError {
            consumer: consumer.into(),
            reason: reason.into(),
        }
    }

    /// Create an operation error with context
    pub fn operation(op: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Operation {
            operation: op.into(),
            details: details.into(),
        }
    }

    /// Create a KV key exists error
    pub fn kv_key_exists(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KvKeyExists {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a KV key not found error
    pub fn kv_key_not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::KvKeyNotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Create a KV revision mismatch error
    pub fn kv_revision_mismatch(key: impl Into<String>, expected: u64, actual: u64) -> Self {
        Self::KvRevisionMismatch {
            key: key.into(),
            expected,
            actual,
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Create a timeout error with the given duration
    pub fn timeout(duration: Duration) -> Self {
        Self::Timeout { timeout: duration }
    }

    /// Returns `true` if the error means the server could not be reached or
    /// did not answer, as opposed to a rejected or malformed request.
    pub fn is_connectivity(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Timeout { .. }
                | Self::DeliveryFailed { .. }
                | Self::StreamError { .. }
                | Self::ConsumerError { .. }
                | Self::Ack(_)
                | Self::Operation { .. }
        )
    }

    /// Get a user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            Error::Connection(_) => {
                "Connection to NATS server failed. Please check your connection.".to_string()
            }
            Error::Timeout { timeout } => {
                format!("Operation timed out after {:?}. Please try again.", timeout)
            }
            Error::KvKeyNotFound { key, .. } => format!("Key '{}' not found.", key),
            Error::Serialization(_) => "Data format error. Please check your input.".to_string(),
            Error::InvalidConfig { reason } => format!("Configuration error: {}", reason),
            _ => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}
