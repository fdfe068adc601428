//! Result contract guaranteed to API clients on success.

#[cfg(feature = "schema")]
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Outline, Slide};

/// Status value a successful stored result must carry.
const SUCCESS_STATUS: &str = "success";

/// Strict shape of a successful task result.
///
/// Worker output is untrusted: a stored result only reaches clients as a
/// success after [`TaskResultContract::validate`] accepts it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
#[serde(deny_unknown_fields)]
pub struct TaskResultContract {
    /// Internal status reported by the worker.
    pub status: String,
    /// Absolute path of the produced artifact, if the task produced one.
    #[serde(default)]
    pub artifact_path: Option<String>,
    /// Additional information.
    #[serde(default)]
    pub message: Option<String>,
    /// Presentation title, for content-only tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Drafted outline, for outline-only tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outline: Option<Outline>,
    /// Drafted slides, for content-only tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slides: Option<Vec<Slide>>,
}

/// A stored result that does not satisfy [`TaskResultContract`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("result contract mismatch: {detail}")]
pub struct ContractViolation {
    detail: String,
}

impl ContractViolation {
    /// Creates a violation with the given description.
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }

    /// Returns what was wrong with the payload.
    pub fn detail(&self) -> &str {
        &self.detail
    }
}

impl TaskResultContract {
    /// Validates a raw stored payload.
    pub fn validate(raw: &serde_json::Value) -> Result<Self, ContractViolation> {
        let contract = Self::deserialize(raw).map_err(|e| ContractViolation::new(e.to_string()))?;

        if contract.status != SUCCESS_STATUS {
            return Err(ContractViolation::new(format!(
                "status is '{}', expected '{SUCCESS_STATUS}'",
                contract.status
            )));
        }

        Ok(contract)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn accepts_export_payload() {
        let contract = TaskResultContract::validate(&json!({
            "status": "success",
            "artifact_path": "/srv/out/deck.pptx",
            "message": "Export completed",
        }))
        .unwrap();

        assert_eq!(contract.artifact_path.as_deref(), Some("/srv/out/deck.pptx"));
    }

    #[test]
    fn accepts_payload_without_artifact() {
        let contract = TaskResultContract::validate(&json!({"status": "success"})).unwrap();
        assert_eq!(contract.artifact_path, None);
        assert_eq!(contract.message, None);
    }

    #[test]
    fn accepts_outline_payload() {
        let contract = TaskResultContract::validate(&json!({
            "status": "success",
            "outline": {
                "main_topic": "Q3 sales",
                "outline_items": [{"sub_topic": "Revenue", "topic1": "EMEA", "topic2": "APAC"}],
                "summary_topic": "Next steps",
            },
            "message": "Outline completed",
        }))
        .unwrap();

        assert_eq!(contract.artifact_path, None);
        let main_topic = contract.outline.map(|outline| outline.main_topic);
        assert_eq!(main_topic.as_deref(), Some("Q3 sales"));

        let bare = TaskResultContract::validate(&json!({"status": "success"})).unwrap();
        let value = serde_json::to_value(bare).unwrap();
        assert!(value.get("outline").is_none());
        assert!(value.get("slides").is_none());
    }

    #[test]
    fn rejects_missing_status() {
        let error = TaskResultContract::validate(&json!({"artifact_path": "/a.pptx"})).unwrap_err();
        assert!(error.to_string().starts_with("result contract mismatch"));
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = TaskResultContract::validate(&json!({
            "status": "success",
            "ppt_file_path": "/a.pptx",
        }))
        .unwrap_err();
        assert!(error.detail().contains("ppt_file_path"));
    }

    #[test]
    fn rejects_non_success_status() {
        assert!(TaskResultContract::validate(&json!({"status": "error"})).is_err());
    }

    #[test]
    fn rejects_non_object() {
        assert!(TaskResultContract::validate(&json!("done")).is_err());
        assert!(TaskResultContract::validate(&serde_json::Value::Null).is_err());
    }
}
