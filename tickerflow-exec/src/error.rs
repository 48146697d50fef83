use uuid::Uuid;

use tickerflow_core::{ConfigError, ParseEnumError, StageName, ValidationError};
use tickerflow_store::StoreError;

/// Failures that abort a run. Symbol-level failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(Uuid),
    #[error("cannot {action} workflow {workflow_id} in status '{status}'")]
    InvalidState {
        workflow_id: Uuid,
        status: String,
        action: &'static str,
    },
    #[error("no handler registered for stage '{0}'")]
    MissingHandler(StageName),
    #[error("checkpoint for workflow {workflow_id} is corrupt: {reason}")]
    CheckpointCorrupt { workflow_id: Uuid, reason: String },
    #[error("configuration for workflow {workflow_id} changed since it started (was {expected}, now {actual})")]
    ConfigDrift {
        workflow_id: Uuid,
        expected: String,
        actual: String,
    },
    #[error("dlq entry not found: {0}")]
    DlqEntryNotFound(i64),
    #[error("dlq entry {0} is already resolved")]
    DlqEntryAlreadyResolved(i64),
    #[error("corrupt row: {0}")]
    CorruptRow(#[from] ParseEnumError),
    #[error("internal error: {0}")]
    Internal(String),
}
