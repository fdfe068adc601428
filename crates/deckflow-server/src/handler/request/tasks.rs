//! Task submission request types.

use deckflow_core::types::{Outline, Slide};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::{is_not_blank, validation_error};
use crate::pipeline::WorkflowRequest;

/// Request payload for generating a deck from a prompt.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
pub struct GenerateTask {
    /// Topic of the presentation.
    #[validate(custom(function = "is_not_blank"))]
    pub prompt: String,
}

impl GenerateTask {
    /// Converts this request into the queued workflow input.
    #[inline]
    pub fn into_request(self) -> WorkflowRequest {
        WorkflowRequest::Generate {
            prompt: self.prompt,
        }
    }
}

/// Request payload for drafting only an outline.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
pub struct OutlineTask {
    /// Topic of the presentation.
    #[validate(custom(function = "is_not_blank"))]
    pub prompt: String,
}

impl OutlineTask {
    /// Converts this request into the queued workflow input.
    #[inline]
    pub fn into_request(self) -> WorkflowRequest {
        WorkflowRequest::Outline {
            prompt: self.prompt,
        }
    }
}

/// Request payload for drafting slides from an existing outline.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ContentTask {
    /// Topic of the presentation.
    #[validate(custom(function = "is_not_blank"))]
    pub prompt: String,
    /// Outline to expand, typically the result of an outline task.
    #[validate(custom(function = "has_sections"))]
    pub outline: Outline,
}

impl ContentTask {
    /// Converts this request into the queued workflow input.
    #[inline]
    pub fn into_request(self) -> WorkflowRequest {
        WorkflowRequest::Content {
            prompt: self.prompt,
            outline: self.outline,
        }
    }
}

fn has_sections(outline: &Outline) -> Result<(), ValidationError> {
    if outline.is_empty() {
        return Err(validation_error("empty_outline", "must have at least one section"));
    }

    Ok(())
}

/// Request payload for exporting ready-made slides.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema, Validate)]
pub struct ExportTask {
    /// Presentation title, also used for the file name.
    #[validate(custom(function = "is_not_blank"))]
    pub title: String,
    /// Slides to render, in order.
    #[validate(length(min = 1))]
    pub slides: Vec<Slide>,
}

impl ExportTask {
    /// Converts this request into the queued workflow input.
    #[inline]
    pub fn into_request(self) -> WorkflowRequest {
        WorkflowRequest::Export {
            title: self.title,
            slides: self.slides,
        }
    }
}
