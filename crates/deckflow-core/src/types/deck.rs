//! Slide deck produced by the content stage.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::Slide;

/// A titled sequence of slides ready to be rendered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Deck {
    /// Presentation title, also the stem of the exported filename.
    pub title: String,
    /// Slides in presentation order.
    #[serde(alias = "slides_data")]
    pub slides: Vec<Slide>,
}

impl Deck {
    /// Creates a new deck.
    pub fn new(title: impl Into<String>, slides: Vec<Slide>) -> Self {
        Self {
            title: title.into(),
            slides,
        }
    }
}
