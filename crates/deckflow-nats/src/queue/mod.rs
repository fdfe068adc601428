//! Work queues carrying jobs from submitters to workers.
//!
//! A [`JobQueue`] owns a JetStream stream with work-queue retention: every
//! published job is delivered to exactly one consumer and removed once it is
//! acknowledged. Workers pull through a durable [`JobConsumer`], one
//! [`JobDelivery`] at a time, and acknowledge only after the job's outcome is
//! recorded, so a crashed worker's job is redelivered after `ack_wait`.

mod delivery;
mod job_queue;

pub use delivery::JobDelivery;
pub use job_queue::{JobConsumer, JobQueue};
