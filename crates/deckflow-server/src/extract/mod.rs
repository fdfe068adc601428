//! Request extractors with structured rejections.
//!
//! The extractors wrap their axum counterparts and turn every rejection into
//! the API's [`Error`] so that clients always receive an `ErrorResponse`.
//!
//! - [`Json`] - JSON body with descriptive syntax and data errors
//! - [`ValidateJson`] - JSON body checked with `validator`
//! - [`Path`] - path parameters
//!
//! [`Error`]: crate::handler::Error

pub mod reject;

pub use crate::extract::reject::{Json, Path, ValidateJson};
