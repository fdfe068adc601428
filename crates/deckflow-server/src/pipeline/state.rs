//! Pipeline state and configuration.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "config")]
use clap::Args;
use deckflow_core::generate::ProducerService;
use deckflow_core::render::RenderService;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::broker::{Stage, TaskBroker};
use crate::service::ServiceState;
use crate::{Error, Result};

/// Default maximum concurrent jobs.
pub const DEFAULT_MAX_CONCURRENT_JOBS: usize = 10;

/// Default number of deliveries a job may consume before it is given up.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 3;

const DEFAULT_OUTLINE_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONTENT_TIMEOUT_SECS: u64 = 600;
const DEFAULT_EXPORT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_FETCH_WAIT_MS: u64 = 1_000;
const DEFAULT_OUTPUT_DIR: &str = "./output";

/// Slack added on top of the stage timeouts before a delivery is resent.
const ACK_WAIT_MARGIN: Duration = Duration::from_secs(60);

/// Configuration for the workflow pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
#[must_use = "config does nothing unless you use it"]
pub struct PipelineConfig {
    /// Maximum concurrent jobs workers can process simultaneously.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_MAX_CONCURRENT_JOBS", default_value_t = DEFAULT_MAX_CONCURRENT_JOBS)
    )]
    pub max_concurrent_jobs: usize,

    /// Outline stage timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_OUTLINE_TIMEOUT_SECS", default_value_t = DEFAULT_OUTLINE_TIMEOUT_SECS)
    )]
    pub outline_timeout_secs: u64,

    /// Content stage timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_CONTENT_TIMEOUT_SECS", default_value_t = DEFAULT_CONTENT_TIMEOUT_SECS)
    )]
    pub content_timeout_secs: u64,

    /// Export stage timeout in seconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_EXPORT_TIMEOUT_SECS", default_value_t = DEFAULT_EXPORT_TIMEOUT_SECS)
    )]
    pub export_timeout_secs: u64,

    /// Directory receiving exported documents.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)
    )]
    pub output_dir: PathBuf,

    /// Deliveries a job may consume before its task is marked lost.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_MAX_ATTEMPTS", default_value_t = DEFAULT_MAX_ATTEMPTS)
    )]
    pub max_attempts: u64,

    /// How long a worker waits for a job per fetch, in milliseconds.
    #[cfg_attr(
        feature = "config",
        arg(long, env = "PIPELINE_FETCH_WAIT_MS", default_value_t = DEFAULT_FETCH_WAIT_MS)
    )]
    pub fetch_wait_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: DEFAULT_MAX_CONCURRENT_JOBS,
            outline_timeout_secs: DEFAULT_OUTLINE_TIMEOUT_SECS,
            content_timeout_secs: DEFAULT_CONTENT_TIMEOUT_SECS,
            export_timeout_secs: DEFAULT_EXPORT_TIMEOUT_SECS,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            fetch_wait_ms: DEFAULT_FETCH_WAIT_MS,
        }
    }
}

impl PipelineConfig {
    /// Creates a new pipeline configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum concurrent jobs.
    pub fn with_max_concurrent_jobs(mut self, max_concurrent_jobs: usize) -> Self {
        self.max_concurrent_jobs = max_concurrent_jobs;
        self
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Sets the number of deliveries a job may consume.
    pub fn with_max_attempts(mut self, max_attempts: u64) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Sets the timeout of one stage.
    pub fn with_stage_timeout(mut self, stage: Stage, timeout: Duration) -> Self {
        let secs = timeout.as_secs();
        match stage {
            Stage::Outline => self.outline_timeout_secs = secs,
            Stage::Content => self.content_timeout_secs = secs,
            Stage::Export => self.export_timeout_secs = secs,
        }
        self
    }

    /// Sets the fetch wait.
    pub fn with_fetch_wait(mut self, wait: Duration) -> Self {
        self.fetch_wait_ms = u64::try_from(wait.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the timeout of a stage.
    pub fn stage_timeout(&self, stage: Stage) -> Duration {
        Duration::from_secs(match stage {
            Stage::Outline => self.outline_timeout_secs,
            Stage::Content => self.content_timeout_secs,
            Stage::Export => self.export_timeout_secs,
        })
    }

    /// Returns how long a delivery may stay unacknowledged.
    ///
    /// Covers a full run of all stages, so a live worker never has its job
    /// redelivered underneath it.
    pub fn ack_wait(&self) -> Duration {
        self.stage_timeout(Stage::Outline)
            + self.stage_timeout(Stage::Content)
            + self.stage_timeout(Stage::Export)
            + ACK_WAIT_MARGIN
    }

    /// Returns the broker's delivery bound.
    ///
    /// One delivery beyond `max_attempts` is allowed so that a worker can
    /// observe the exhausted job and record it as lost.
    pub fn max_deliver(&self) -> i64 {
        i64::try_from(self.max_attempts.saturating_add(1)).unwrap_or(i64::MAX)
    }

    /// Returns the fetch wait as a Duration.
    pub fn fetch_wait(&self) -> Duration {
        Duration::from_millis(self.fetch_wait_ms)
    }

    /// Creates a semaphore for limiting concurrent job processing.
    pub fn create_semaphore(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.max_concurrent_jobs))
    }

    /// Checks the configuration for values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(Error::config("max concurrent jobs must be greater than 0"));
        }
        if self.max_attempts == 0 {
            return Err(Error::config("max attempts must be greater than 0"));
        }
        if [Stage::Outline, Stage::Content, Stage::Export]
            .into_iter()
            .any(|stage| self.stage_timeout(stage).is_zero())
        {
            return Err(Error::config("stage timeouts must be greater than 0"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(Error::config("output directory cannot be empty"));
        }
        Ok(())
    }
}

/// Application state for pipeline workers.
#[derive(Debug, Clone)]
pub struct PipelineState {
    /// Task queue and record store.
    pub broker: TaskBroker,
    /// Outline and content producer.
    pub producer: ProducerService,
    /// Document renderer.
    pub renderer: RenderService,
    /// Pipeline configuration.
    pub config: PipelineConfig,
}

impl PipelineState {
    /// Creates a new pipeline state from service state and configuration.
    pub fn new(
        state: &ServiceState,
        producer: ProducerService,
        renderer: RenderService,
        config: PipelineConfig,
    ) -> Self {
        Self {
            broker: state.broker.clone(),
            producer,
            renderer,
            config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_stage_timeouts() {
        let config = PipelineConfig::default();
        assert_eq!(config.stage_timeout(Stage::Outline), Duration::from_secs(300));
        assert_eq!(config.stage_timeout(Stage::Content), Duration::from_secs(600));
        assert_eq!(config.stage_timeout(Stage::Export), Duration::from_secs(300));
    }

    #[test]
    fn ack_wait_covers_every_stage() {
        let config = PipelineConfig::default();
        assert_eq!(config.ack_wait(), Duration::from_secs(1_260));
    }

    #[test]
    fn max_deliver_leaves_room_for_the_lost_mark() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_deliver(), 4);
    }

    #[test]
    fn validation() {
        assert!(PipelineConfig::default().validate().is_ok());
        assert!(
            PipelineConfig::default()
                .with_max_concurrent_jobs(0)
                .validate()
                .is_err()
        );
        assert!(
            PipelineConfig::default()
                .with_stage_timeout(Stage::Content, Duration::ZERO)
                .validate()
                .is_err()
        );
    }
}
