//! Presentation outline produced by the first stage.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Structured outline of a presentation.
///
/// Language models are prompted with a schema naming the item list `outline`,
/// so that spelling is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct Outline {
    /// Main topic of the presentation.
    pub main_topic: String,
    /// Ordered sections of the presentation.
    #[serde(alias = "outline")]
    pub outline_items: Vec<OutlineItem>,
    /// Topic of the closing summary slide.
    pub summary_topic: String,
}

/// A single outline section with up to two talking points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct OutlineItem {
    /// Section heading.
    pub sub_topic: String,
    /// First talking point.
    #[serde(default)]
    pub topic1: String,
    /// Second talking point.
    #[serde(default)]
    pub topic2: String,
}

impl Outline {
    /// Returns true when the outline has no usable sections.
    pub fn is_empty(&self) -> bool {
        self.outline_items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_model_schema_spelling() {
        let outline: Outline = serde_json::from_str(
            r#"{
                "main_topic": "Q3 sales",
                "outline": [{"sub_topic": "Revenue", "topic1": "EMEA", "topic2": "APAC"}],
                "summary_topic": "Next steps"
            }"#,
        )
        .unwrap();

        assert_eq!(outline.outline_items.len(), 1);
        assert_eq!(outline.outline_items[0].topic2, "APAC");
        assert!(!outline.is_empty());
    }

    #[test]
    fn serializes_outline_items() {
        let outline = Outline {
            main_topic: "Q3".into(),
            outline_items: vec![],
            summary_topic: "Wrap".into(),
        };
        let value = serde_json::to_value(&outline).unwrap();
        assert!(value.get("outline_items").is_some());
        assert!(outline.is_empty());
    }
}
