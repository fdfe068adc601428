//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── server: ServerConfig          # Host, port, shutdown
//! ├── middleware: MiddlewareConfig  # OpenAPI, request timeout
//! ├── broker: BrokerConfig          # memory or NATS, record TTL
//! ├── pipeline: PipelineConfig      # Concurrency, stage timeouts, output dir
//! └── provider: ProviderConfig      # openai or mock
//! ```
//!
//! All configuration can be provided via CLI arguments or environment variables.
//! Use `--help` to see all available options.
//!
//! ```bash
//! deckflow --provider mock --max-concurrent-jobs 4 --port 8080
//!
//! LLM_PROVIDER=mock PIPELINE_MAX_CONCURRENT_JOBS=4 PORT=8080 deckflow
//! ```

mod broker;
mod middleware;
mod provider;
mod server;

use std::process;

use anyhow::Context;
pub use broker::BrokerConfig;
use clap::Parser;
use deckflow_server::pipeline::PipelineConfig;
pub use middleware::MiddlewareConfig;
pub use provider::{ProviderConfig, ProviderKind};
use serde::{Deserialize, Serialize};
pub use server::ServerConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_SERVER_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser, Serialize, Deserialize)]
#[command(name = "deckflow")]
#[command(about = "Asynchronous slide deck generation server")]
#[command(version)]
pub struct Cli {
    /// Server network and lifecycle configuration.
    #[clap(flatten)]
    pub server: ServerConfig,

    /// HTTP middleware configuration (OpenAPI, timeouts).
    #[clap(flatten)]
    pub middleware: MiddlewareConfig,

    /// Task broker configuration.
    #[clap(flatten)]
    pub broker: BrokerConfig,

    /// Workflow pipeline configuration.
    #[clap(flatten)]
    pub pipeline: PipelineConfig,

    /// Outline and content provider configuration.
    #[clap(flatten)]
    pub provider: ProviderConfig,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is read before clap parses arguments so its values act
    /// as `env` fallbacks.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Initializes tracing with environment-based filtering.
    ///
    /// Honors `RUST_LOG` and defaults to `info`.
    pub fn init_tracing() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    /// Validates all configuration values.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.server
            .validate()
            .context("invalid server configuration")?;
        self.middleware
            .validate()
            .context("invalid middleware configuration")?;
        self.pipeline
            .validate()
            .context("invalid pipeline configuration")?;
        self.provider.validate()?;
        self.broker.service_config(&self.pipeline)?;
        Ok(())
    }

    /// Logs configuration at info level (no sensitive information).
    pub fn log(&self) {
        Self::log_build_info();
        self.server.log();
        self.middleware.log();
        self.broker.log();
        self.provider.log();

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            max_concurrent_jobs = self.pipeline.max_concurrent_jobs,
            max_attempts = self.pipeline.max_attempts,
            output_dir = %self.pipeline.output_dir.display(),
            "Pipeline configuration"
        );
    }

    fn log_build_info() {
        tracing::debug!(
            target: TRACING_TARGET_SERVER_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "dotenv").then_some("dotenv"),
            cfg!(feature = "mock").then_some("mock"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
