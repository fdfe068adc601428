//! Typed work queue over a JetStream stream.

use std::marker::PhantomData;
use std::time::Duration;

use async_nats::jetstream::consumer::{AckPolicy, PullConsumer, pull};
use async_nats::jetstream::{self, AckKind, stream};
use futures::StreamExt;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::JobDelivery;
use crate::{Error, Result, TRACING_TARGET_QUEUE};

/// Work queue of `T` jobs.
///
/// Jobs are published on `jobs.<queue>.<job_id>` into the `JOBS_<QUEUE>`
/// stream.
pub struct JobQueue<T> {
    jetstream: jetstream::Context,
    queue_name: String,
    stream_name: String,
    _job: PhantomData<fn() -> T>,
}

impl<T> JobQueue<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// Create or get the stream backing the queue.
    #[tracing::instrument(skip(jetstream), target = TRACING_TARGET_QUEUE)]
    pub(crate) async fn new(jetstream: &jetstream::Context, queue_name: &str) -> Result<Self> {
        let stream_name = stream_name(queue_name);

        match jetstream.get_stream(&stream_name).await {
            Ok(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    "Using existing job stream"
                );
            }
            Err(_) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    stream = %stream_name,
                    queue_name = %queue_name,
                    "Creating new job stream"
                );
                let stream_config = stream::Config {
                    name: stream_name.clone(),
                    description: Some(format!("Job queue: {queue_name}")),
                    subjects: vec![format!("jobs.{queue_name}.>")],
                    retention: stream::RetentionPolicy::WorkQueue,
                    ..Default::default()
                };
                jetstream
                    .create_stream(stream_config)
                    .await
                    .map_err(|e| Error::stream_error(&stream_name, e.to_string()))?;
            }
        }

        Ok(Self {
            jetstream: jetstream.clone(),
            queue_name: queue_name.to_owned(),
            stream_name,
            _job: PhantomData,
        })
    }

    /// Returns the queue name.
    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Publishes a job and waits for the server to persist it.
    #[tracing::instrument(skip(self, job), target = TRACING_TARGET_QUEUE)]
    pub async fn submit(&self, job_id: &str, job: &T) -> Result<()> {
        let subject = job_subject(&self.queue_name, job_id);
        let payload = serde_json::to_vec(job)?;
        let size = payload.len();

        self.jetstream
            .publish(subject.clone(), payload.into())
            .await
            .map_err(|e| Error::delivery_failed(&subject, e.to_string()))?
            .await
            .map_err(|e| Error::delivery_failed(&subject, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            job_id = %job_id,
            subject = %subject,
            size_bytes = size,
            "Submitted job to queue"
        );
        Ok(())
    }

    /// Create or get a durable pull consumer shared by all workers.
    ///
    /// A job is delivered at most `max_deliver` times; an unacknowledged
    /// delivery is resent after `ack_wait`.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn consumer(
        &self,
        durable_name: &str,
        ack_wait: Duration,
        max_deliver: i64,
    ) -> Result<JobConsumer<T>> {
        let consumer_config = pull::Config {
            durable_name: Some(durable_name.to_owned()),
            description: Some(format!("Workers of queue {}", self.queue_name)),
            ack_policy: AckPolicy::Explicit,
            ack_wait,
            max_deliver,
            ..Default::default()
        };

        let stream = self
            .jetstream
            .get_stream(&self.stream_name)
            .await
            .map_err(|e| Error::stream_error(&self.stream_name, e.to_string()))?;

        let consumer = stream
            .get_or_create_consumer(durable_name, consumer_config)
            .await
            .map_err(|e| Error::consumer_error(durable_name, e.to_string()))?;

        tracing::debug!(
            target: TRACING_TARGET_QUEUE,
            consumer = %durable_name,
            stream = %self.stream_name,
            ack_wait_secs = ack_wait.as_secs(),
            max_deliver = max_deliver,
            "Created job consumer"
        );

        Ok(JobConsumer {
            consumer,
            name: durable_name.to_owned(),
            _job: PhantomData,
        })
    }
}

/// Durable pull consumer yielding typed deliveries.
pub struct JobConsumer<T> {
    consumer: PullConsumer,
    name: String,
    _job: PhantomData<fn() -> T>,
}

impl<T> JobConsumer<T>
where
    T: DeserializeOwned + Send + Sync + 'static,
{
    /// Pulls at most one job, waiting up to `wait` for one to arrive.
    ///
    /// Messages whose payload does not decode are terminated and skipped.
    #[tracing::instrument(skip(self), target = TRACING_TARGET_QUEUE)]
    pub async fn fetch(&self, wait: Duration) -> Result<Option<JobDelivery<T>>> {
        let mut messages = self
            .consumer
            .batch()
            .max_messages(1)
            .expires(wait)
            .messages()
            .await
            .map_err(|e| Error::consumer_error(&self.name, e.to_string()))?;

        let Some(next) = messages.next().await else {
            return Ok(None);
        };
        let message = next.map_err(|e| Error::consumer_error(&self.name, e.to_string()))?;

        let attempt = message
            .info()
            .ok()
            .and_then(|info| u64::try_from(info.delivered).ok())
            .unwrap_or(1)
            .max(1);

        match serde_json::from_slice::<T>(&message.payload) {
            Ok(job) => {
                tracing::debug!(
                    target: TRACING_TARGET_QUEUE,
                    subject = %message.subject,
                    attempt = attempt,
                    "Fetched job"
                );
                Ok(Some(JobDelivery::new(job, attempt, message)))
            }
            Err(e) => {
                tracing::error!(
                    target: TRACING_TARGET_QUEUE,
                    subject = %message.subject,
                    error = %e,
                    "Failed to deserialize job, terminating message"
                );
                message
                    .ack_with(AckKind::Term)
                    .await
                    .map_err(|e| Error::Ack(e.to_string()))?;
                Ok(None)
            }
        }
    }
}

fn stream_name(queue_name: &str) -> String {
    format!("JOBS_{}", queue_name.to_uppercase())
}

fn job_subject(queue_name: &str, job_id: &str) -> String {
    format!("jobs.{queue_name}.{job_id}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_name() {
        assert_eq!(stream_name("tasks"), "JOBS_TASKS");
    }

    #[test]
    fn test_job_subject() {
        assert_eq!(
            job_subject("tasks", "0190f1c2-0000-7000-8000-000000000000"),
            "jobs.tasks.0190f1c2-0000-7000-8000-000000000000"
        );
    }
}
