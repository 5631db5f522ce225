//! Run identification.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies the workflow run a stream follows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle {
    /// Workflow identifier.
    pub workflow_id: String,
    /// Run identifier within the workflow.
    pub run_id: String,
}

impl RunHandle {
    /// Create a new run handle.
    #[must_use]
    pub fn new(workflow_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workflow_id, self.run_id)
    }
}
