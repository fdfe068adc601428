//! Jobs carried by the work queue.

use deckflow_core::types::{Outline, Slide};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broker::RequestKind;

/// The user input a task was submitted with.
///
/// It only lives inside the queued job and is consumed once by the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowRequest {
    /// Run outline, content and export from a prompt.
    Generate { prompt: String },
    /// Run only the outline stage.
    Outline { prompt: String },
    /// Run only the content stage on a given outline.
    Content { prompt: String, outline: Outline },
    /// Run only the export stage on ready-made slides.
    Export { title: String, slides: Vec<Slide> },
}

impl WorkflowRequest {
    /// Returns which workflow this request runs.
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Generate { .. } => RequestKind::Generate,
            Self::Outline { .. } => RequestKind::Outline,
            Self::Content { .. } => RequestKind::Content,
            Self::Export { .. } => RequestKind::Export,
        }
    }
}

/// Message published for every submitted task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowJob {
    pub task_id: Uuid,
    pub request: WorkflowRequest,
}

impl WorkflowJob {
    /// Creates a job for the given task.
    pub fn new(task_id: Uuid, request: WorkflowRequest) -> Self {
        Self { task_id, request }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_is_tagged_by_kind() {
        let job = WorkflowJob::new(
            Uuid::nil(),
            WorkflowRequest::Generate {
                prompt: "Rust in production".into(),
            },
        );

        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(
            value,
            json!({
                "task_id": "00000000-0000-0000-0000-000000000000",
                "request": {"kind": "generate", "prompt": "Rust in production"},
            })
        );
        assert_eq!(job.request.kind(), RequestKind::Generate);
    }

    #[test]
    fn export_request_accepts_loose_slides() {
        let request: WorkflowRequest = serde_json::from_value(json!({
            "kind": "export",
            "title": "Roadmap",
            "slides": [{"title": "Q1", "content": ["Ship", "Measure"]}, {}],
        }))
        .unwrap();

        let WorkflowRequest::Export { title, slides } = request else {
            panic!("expected an export request");
        };
        assert_eq!(title, "Roadmap");
        assert_eq!(slides.len(), 2);
    }

    #[test]
    fn content_request_carries_outline() {
        let request: WorkflowRequest = serde_json::from_value(json!({
            "kind": "content",
            "prompt": "Q3 sales",
            "outline": {
                "main_topic": "Q3 sales",
                "outline_items": [{"sub_topic": "Revenue"}],
                "summary_topic": "Next steps",
            },
        }))
        .unwrap();

        assert_eq!(request.kind(), RequestKind::Content);
        let WorkflowRequest::Content { outline, .. } = request else {
            panic!("expected a content request");
        };
        assert_eq!(outline.outline_items[0].sub_topic, "Revenue");
    }
}
