//! HTTP server startup, shutdown and worker lifecycle.

mod error;
mod http_server;
mod lifecycle;
mod shutdown;

pub use error::{Result, ServerError};
pub use http_server::serve;
pub use lifecycle::drain_workers;
pub use shutdown::shutdown_signal;
