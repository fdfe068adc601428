//! Request types for HTTP handlers.

mod paths;
mod tasks;
mod validations;

pub use paths::*;
pub use tasks::*;
pub use validations::*;
