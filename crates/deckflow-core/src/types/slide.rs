//! Slide definitions consumed by renderers.

use std::borrow::Cow;

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Layout family of a slide.
///
/// Unrecognised values fall back to [`SlideKind::Content`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    AsRefStr,
    Display,
    EnumString
)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SlideKind {
    /// Cover slide with a title and optional subtitle.
    Title,
    /// Title with a single body.
    #[default]
    Content,
    /// Title with two side-by-side bodies.
    TwoColumn,
}

impl<'de> Deserialize<'de> for SlideKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

/// Text placed inside a slide placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(untagged)]
pub enum SlideBody {
    /// Free text, one paragraph per line.
    Text(String),
    /// One paragraph per bullet.
    Bullets(Vec<String>),
}

impl SlideBody {
    /// Returns the paragraphs of this body.
    pub fn paragraphs(&self) -> Vec<&str> {
        match self {
            Self::Text(text) => text.lines().collect(),
            Self::Bullets(items) => items.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for SlideBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<Vec<String>> for SlideBody {
    fn from(items: Vec<String>) -> Self {
        Self::Bullets(items)
    }
}

/// A single slide.
///
/// Which body fields are read depends on [`SlideKind`]: `subtitle` for title
/// slides, `content` for content slides, and the `left_content` and
/// `right_content` pair for two-column slides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Slide {
    #[serde(default)]
    pub slide_type: SlideKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<SlideBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_content: Option<SlideBody>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_content: Option<SlideBody>,
}

impl Slide {
    /// Creates a title slide.
    pub fn title(title: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            slide_type: SlideKind::Title,
            title: Some(title.into()),
            subtitle: Some(subtitle.into()),
            ..Self::default()
        }
    }

    /// Creates a content slide.
    pub fn content(title: impl Into<String>, body: impl Into<SlideBody>) -> Self {
        Self {
            slide_type: SlideKind::Content,
            title: Some(title.into()),
            content: Some(body.into()),
            ..Self::default()
        }
    }

    /// Creates a two-column slide.
    pub fn two_column(
        title: impl Into<String>,
        left: impl Into<SlideBody>,
        right: impl Into<SlideBody>,
    ) -> Self {
        Self {
            slide_type: SlideKind::TwoColumn,
            title: Some(title.into()),
            left_content: Some(left.into()),
            right_content: Some(right.into()),
            ..Self::default()
        }
    }

    /// Returns the slide title, or `Slide N` for the zero-based `index`.
    pub fn heading(&self, index: usize) -> Cow<'_, str> {
        match self.title.as_deref() {
            Some(title) if !title.trim().is_empty() => Cow::Borrowed(title),
            _ => Cow::Owned(format!("Slide {}", index + 1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_kind_falls_back_to_content() {
        let slide: Slide = serde_json::from_str(r#"{"slide_type": "chart"}"#).unwrap();
        assert_eq!(slide.slide_type, SlideKind::Content);
    }

    #[test]
    fn missing_kind_defaults_to_content() {
        let slide: Slide = serde_json::from_str(r#"{"title": "Intro"}"#).unwrap();
        assert_eq!(slide.slide_type, SlideKind::Content);
        assert_eq!(slide.heading(0), "Intro");
    }

    #[test]
    fn missing_title_uses_position() {
        let slide = Slide::default();
        assert_eq!(slide.heading(2), "Slide 3");
    }

    #[test]
    fn body_accepts_text_or_bullets() {
        let slide: Slide = serde_json::from_str(
            r#"{"slide_type": "two_column", "left_content": "a\nb", "right_content": ["c", "d"]}"#,
        )
        .unwrap();

        assert_eq!(slide.slide_type, SlideKind::TwoColumn);
        assert_eq!(
            slide.left_content.as_ref().map(SlideBody::paragraphs),
            Some(vec!["a", "b"])
        );
        assert_eq!(
            slide.right_content.as_ref().map(SlideBody::paragraphs),
            Some(vec!["c", "d"])
        );
    }

    #[test]
    fn kind_serializes_snake_case() {
        let value = serde_json::to_value(Slide::two_column("t", "l", "r")).unwrap();
        assert_eq!(value["slide_type"], "two_column");
        assert_eq!(SlideKind::TwoColumn.as_ref(), "two_column");
    }
}
