//! A single job handed to a worker.

use std::fmt;
use std::time::Duration;

use async_nats::jetstream::{AckKind, Message};

use crate::{Error, Result, TRACING_TARGET_QUEUE};

/// A deserialized job together with the message it arrived in.
///
/// Dropping a delivery without settling it leaves the message pending; the
/// server redelivers it once the consumer's `ack_wait` elapses.
pub struct JobDelivery<T> {
    job: T,
    attempt: u64,
    message: Message,
}

impl<T> JobDelivery<T> {
    pub(crate) fn new(job: T, attempt: u64, message: Message) -> Self {
        Self {
            job,
            attempt,
            message,
        }
    }

    /// Returns the job payload.
    pub fn job(&self) -> &T {
        &self.job
    }

    /// Returns the 1-based delivery count of this message.
    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Returns the subject the job was published on.
    pub fn subject(&self) -> &str {
        self.message.subject.as_str()
    }

    /// Acknowledges the job, removing it from the queue.
    pub async fn ack(self) -> Result<()> {
        self.settle(AckKind::Ack, "ack").await
    }

    /// Asks for redelivery, optionally after `delay`.
    pub async fn nak(self, delay: Option<Duration>) -> Result<()> {
        self.settle(AckKind::Nak(delay), "nak").await
    }

    /// Stops redelivery of the job without marking it processed.
    pub async fn term(self) -> Result<()> {
        self.settle(AckKind::Term, "term").await
    }

    async fn settle(self, kind: AckKind, label: &'static str) -> Result<()> {
        self.message
            .ack_with(kind)
            .await
            .map_err(|e| Error::Ack(e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            subject = %self.message.subject,
            attempt = self.attempt,
            kind = label,
            "Settled job delivery"
        );
        Ok(())
    }
}

impl<T: fmt::Debug> fmt::Debug for JobDelivery<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobDelivery")
            .field("subject", &self.message.subject)
            .field("attempt", &self.attempt)
            .field("job", &self.job)
            .finish()
    }
}
