//! Application state and dependency injection.

mod config;
mod gate;
mod poller;

pub use crate::broker::TaskBroker;
pub use crate::service::config::{ServiceConfig, ServiceConfigBuilder};
pub use crate::service::gate::{Artifact, ArtifactGate, GateError};
pub use crate::service::poller::{PublicTaskState, StatusPoller, TaskStatus};
// Re-export error types from crate root for convenience
pub use crate::{Error, Result};

/// Application state.
///
/// Used for the [`State`] extraction (dependency injection).
///
/// [`State`]: axum::extract::State
#[must_use = "state does nothing unless you use it"]
#[derive(Debug, Clone)]
pub struct ServiceState {
    // External services:
    pub broker: TaskBroker,

    // Internal services:
    pub poller: StatusPoller,
    pub gate: ArtifactGate,
}

impl ServiceState {
    /// Initializes application state from configuration.
    ///
    /// Connects to the configured broker backend.
    pub async fn from_config(service_config: &ServiceConfig) -> Result<Self> {
        let broker = service_config.connect_broker().await?;
        Ok(Self::new(broker))
    }

    /// Creates application state around an existing broker.
    pub fn new(broker: TaskBroker) -> Self {
        let poller = StatusPoller::new(broker.clone());
        let gate = ArtifactGate::new(poller.clone());

        Self {
            broker,
            poller,
            gate,
        }
    }
}

macro_rules! impl_di {
    ($($f:ident: $t:ty),+) => {$(
        impl axum::extract::FromRef<ServiceState> for $t {
            fn from_ref(state: &ServiceState) -> Self {
                state.$f.clone()
            }
        }
    )+};
}

// External services:
impl_di!(broker: TaskBroker);

// Internal services:
impl_di!(poller: StatusPoller);
impl_di!(gate: ArtifactGate);
