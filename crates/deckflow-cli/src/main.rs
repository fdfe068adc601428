#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod server;

use std::process;

use anyhow::Context;
use axum::Router;
use deckflow_server::handler::routes;
use deckflow_server::middleware::{
    RouterObservabilityExt, RouterOpenApiExt, RouterRecoveryExt, RouterSecurityExt,
};
use deckflow_server::pipeline::{PipelineState, WorkerHandles};
use deckflow_server::service::ServiceState;

use crate::config::{Cli, MiddlewareConfig};

// Tracing target constants
pub const TRACING_TARGET_SERVER_STARTUP: &str = "deckflow_cli::server::startup";
pub const TRACING_TARGET_SERVER_SHUTDOWN: &str = "deckflow_cli::server::shutdown";
pub const TRACING_TARGET_CONFIG: &str = "deckflow_cli::config";

#[tokio::main]
async fn main() {
    let Err(error) = run().await else {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            "application terminated successfully"
        );
        process::exit(0);
    };

    if tracing::enabled!(tracing::Level::ERROR) {
        tracing::error!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            error = %error,
            "application terminated with error"
        );
    } else {
        eprintln!("Error: {error:#}");
    }

    process::exit(1);
}

/// Main application entry point.
async fn run() -> anyhow::Result<()> {
    let cli = Cli::init();
    Cli::init_tracing();

    tracing::info!(
        target: TRACING_TARGET_SERVER_STARTUP,
        version = env!("CARGO_PKG_VERSION"),
        "starting deckflow server"
    );

    cli.log();
    cli.validate()?;

    let producer = cli.provider.create_producer()?;
    let renderer = cli.provider.create_renderer();

    let service_config = cli.broker.service_config(&cli.pipeline)?;
    let state = ServiceState::from_config(&service_config)
        .await
        .context("failed to create service state")?;

    let pipeline = PipelineState::new(&state, producer, renderer, cli.pipeline.clone());
    let workers = WorkerHandles::spawn(&pipeline);

    let router = create_router(state, &cli.middleware);
    let served = server::serve(router, &cli.server, server::shutdown_signal()).await;

    if let Err(err) = &served
        && let Some(suggestion) = err.suggestion()
    {
        tracing::info!(
            target: TRACING_TARGET_SERVER_SHUTDOWN,
            suggestion = suggestion,
            "Recovery suggestion"
        );
    }

    let drained = server::drain_workers(workers, cli.server.shutdown_timeout()).await;

    served.context("http server failed")?;
    drained.context("workflow workers failed")?;
    Ok(())
}

/// Creates the router with all middleware layers applied.
///
/// Middleware is applied in reverse order (last added = outermost):
/// 1. Recovery (outermost) - catches panics and enforces timeouts
/// 2. Observability - request ids and tracing spans
/// 3. Security - request body limits
/// 4. Routes (innermost) - handlers, OpenAPI document and Scalar UI
fn create_router(state: ServiceState, middleware: &MiddlewareConfig) -> Router {
    routes()
        .with_open_api(middleware.openapi.clone())
        .with_default_security()
        .with_observability()
        .with_recovery(&middleware.recovery)
        .with_state(state)
}
