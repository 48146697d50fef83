use std::time::Duration;

use crate::types::WorkflowType;

/// Per-run overrides, given once to start/resume and carried in every stage context.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ExecutionOptions {
    /// Treat SKIP/DEFER gate decisions as PASS.
    #[serde(default)]
    pub force: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl ExecutionOptions {
    pub fn max_retries_for(&self, workflow_type: &WorkflowType) -> u32 {
        self.max_retries.unwrap_or(workflow_type.max_retries)
    }

    pub fn timeout_for(&self, workflow_type: &WorkflowType) -> Duration {
        self.timeout_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| workflow_type.handler_timeout())
    }
}
