#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

/// Tracing target for outline and content generation.
pub const TRACING_TARGET_GENERATE: &str = "deckflow_core::generate";

/// Tracing target for document rendering.
pub const TRACING_TARGET_RENDER: &str = "deckflow_core::render";

mod error;

pub mod generate;
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
pub mod mock;
pub mod render;
pub mod types;

pub use error::{BoxedError, Error, ErrorKind, Result};
