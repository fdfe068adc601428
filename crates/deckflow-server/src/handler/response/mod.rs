//! Response types for HTTP handlers.

mod errors;
mod monitors;
mod tasks;

pub use errors::*;
pub use monitors::*;
pub use tasks::*;
