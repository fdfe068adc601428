//! Result union returned by every work node.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Outline, Slide};

/// Outcome of a single pipeline stage.
///
/// Serialized with a `status` discriminator, so a success is
/// `{"status": "success", ...payload}` and a failure is
/// `{"status": "error", "error": "..."}`. A value is never partially
/// populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageResult<T> {
    /// The stage completed and produced its payload.
    Success(T),
    /// The stage failed.
    Error {
        /// Human-readable failure description.
        error: String,
    },
}

impl<T> StageResult<T> {
    /// Creates a failed stage result.
    pub fn error(error: impl std::fmt::Display) -> Self {
        Self::Error {
            error: error.to_string(),
        }
    }

    /// Returns true for [`StageResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Converts into a standard result, keeping the error text.
    pub fn into_result(self) -> Result<T, String> {
        match self {
            Self::Success(payload) => Ok(payload),
            Self::Error { error } => Err(error),
        }
    }
}

impl<T> From<crate::Result<T>> for StageResult<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(payload) => Self::Success(payload),
            Err(error) => Self::error(error),
        }
    }
}

/// Success payload of the export stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct ExportArtifact {
    /// Absolute path of the written document.
    pub artifact_path: String,
    /// Completion message.
    pub message: String,
}

/// Success payload of an outline-only task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct OutlineDraft {
    /// The drafted outline.
    pub outline: Outline,
    /// Completion message.
    pub message: String,
}

/// Success payload of a content-only task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DeckDraft {
    /// Presentation title.
    pub title: String,
    /// Drafted slides, ready for export.
    pub slides: Vec<Slide>,
    /// Completion message.
    pub message: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::types::{OutlineItem, TaskResultContract};

    #[test]
    fn success_is_flattened_under_status() {
        let result = StageResult::Success(ExportArtifact {
            artifact_path: "/tmp/deck.pptx".into(),
            message: "Export completed".into(),
        });

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "status": "success",
                "artifact_path": "/tmp/deck.pptx",
                "message": "Export completed",
            })
        );
        assert!(TaskResultContract::validate(&value).is_ok());
    }

    #[test]
    fn error_carries_message() {
        let result: StageResult<Outline> = StageResult::error("model refused");
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, json!({"status": "error", "error": "model refused"}));
        assert_eq!(result.into_result(), Err("model refused".to_owned()));
    }

    #[test]
    fn converts_from_core_result() {
        let failed: crate::Result<u8> = Err(crate::Error::rendering().with_message("bad zip"));
        let result = StageResult::from(failed);
        assert!(!result.is_success());
        assert_eq!(result.into_result(), Err("rendering: bad zip".to_owned()));
    }

    #[test]
    fn drafts_satisfy_the_result_contract() {
        let outline = Outline {
            main_topic: "Q3 sales".into(),
            outline_items: vec![OutlineItem {
                sub_topic: "Revenue".into(),
                topic1: "EMEA".into(),
                topic2: "APAC".into(),
            }],
            summary_topic: "Next steps".into(),
        };
        let value = serde_json::to_value(StageResult::Success(OutlineDraft {
            outline: outline.clone(),
            message: "Outline completed".into(),
        }))
        .unwrap();
        let contract = TaskResultContract::validate(&value).unwrap();
        assert_eq!(contract.outline, Some(outline));
        assert_eq!(contract.artifact_path, None);

        let value = serde_json::to_value(StageResult::Success(DeckDraft {
            title: "Q3 sales".into(),
            slides: vec![Slide::title("Q3 sales", "2026")],
            message: "Content completed".into(),
        }))
        .unwrap();
        let contract = TaskResultContract::validate(&value).unwrap();
        assert_eq!(contract.title.as_deref(), Some("Q3 sales"));
        assert_eq!(contract.slides.map(|slides| slides.len()), Some(1));
    }
}
