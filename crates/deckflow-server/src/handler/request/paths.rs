//! Path parameter types for HTTP handlers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Path parameters for task operations.
///
/// The id is kept as text: ids that do not parse are reported like any
/// other unknown task.
#[must_use]
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct TaskPathParams {
    /// Identifier returned at submission.
    pub task_id: String,
}
