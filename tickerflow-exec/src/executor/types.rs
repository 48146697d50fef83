use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use tickerflow_core::{
    ControlRequest, ExecutionOptions, StageName, StageStatus, SymbolStatus, WorkflowStatus,
    WorkflowType,
};
use tickerflow_store::{StageCounters, StageExecution, WorkflowExecution};

/// Per-run values shared by every unit of work.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub workflow_id: Uuid,
    pub workflow_type: Arc<WorkflowType>,
    pub options: ExecutionOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    Completed,
    Skipped { reason: String },
    /// Gate said DEFER; the symbol is `pending` again and was not processed.
    Deferred { reason: String },
    Retrying {
        retry_count: u32,
        next_attempt_at: DateTime<Utc>,
    },
    DeadLettered { dlq_id: i64, retry_count: u32 },
    /// Already terminal before this call; nothing was done.
    AlreadyTerminal { status: SymbolStatus },
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: StageName,
    pub status: StageStatus,
    pub counters: StageCounters,
    pub passes: u32,
    /// Symbols left pending, deferred or retrying.
    pub pending_symbols: Vec<String>,
    /// Set when a pause or cancel stopped dispatch; the stage row stays `running`.
    pub interrupted: Option<ControlRequest>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub workflow_id: Uuid,
    pub status: WorkflowStatus,
    pub stages: Vec<StageOutcome>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkflowStatusReport {
    pub workflow: WorkflowExecution,
    pub stages: Vec<StageExecution>,
    pub open_dlq_entries: i64,
}

/// How a pause/cancel request was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlAck {
    /// The run is driven by this process and was signalled directly.
    Signalled,
    /// Persisted for the process driving the run to pick up.
    Requested,
    /// Applied to a run that was not running.
    Applied,
    /// Nothing to do (e.g. pausing a paused run).
    Unchanged,
}
