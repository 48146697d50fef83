use async_trait::async_trait;
use uuid::Uuid;

use tickerflow_core::{ControlRequest, StageName, StageStatus, WorkflowStatus};

use crate::store::types::*;

#[async_trait]
pub trait StateStore: Send + Sync {
    async fn create_workflow(
        &self,
        workflow: NewWorkflowExecution,
    ) -> Result<WorkflowExecution, StoreError>;

    async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError>;

    /// Newest first.
    async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;

    /// Sets `running` only if the row is still in `expected`; returns false otherwise.
    /// Stamps `started_at` once and clears any previous error.
    async fn mark_workflow_running(&self, id: Uuid, expected: WorkflowStatus) -> Result<bool, StoreError>;

    async fn set_workflow_status(&self, id: Uuid, status: WorkflowStatus) -> Result<(), StoreError>;

    async fn set_current_stage(&self, id: Uuid, stage: Option<StageName>) -> Result<(), StoreError>;

    /// Terminal transition. Stamps `completed_at` and clears any pending control request.
    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError>;

    async fn request_control(&self, id: Uuid, request: ControlRequest) -> Result<(), StoreError>;

    /// Reads and clears the pending control request in one step.
    async fn take_control_request(&self, id: Uuid) -> Result<Option<ControlRequest>, StoreError>;

    /// Creates the stage row as `running` or flips an existing row back to `running`,
    /// keeping its counters.
    async fn begin_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        stage_index: i32,
    ) -> Result<StageExecution, StoreError>;

    async fn increment_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        delta: CounterDelta,
    ) -> Result<(), StoreError>;

    /// Overwrites counters; used when resuming a stage whose rows drifted from symbol state.
    async fn set_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        counters: StageCounters,
    ) -> Result<(), StoreError>;

    async fn finish_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        status: StageStatus,
        retry_count: i32,
    ) -> Result<(), StoreError>;

    async fn get_stage_execution(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Option<StageExecution>, StoreError>;

    /// Ordered by stage index.
    async fn get_stage_executions(&self, workflow_id: Uuid) -> Result<Vec<StageExecution>, StoreError>;

    async fn get_symbol_state(
        &self,
        workflow_id: Uuid,
        symbol: &str,
        stage: StageName,
    ) -> Result<Option<SymbolState>, StoreError>;

    async fn get_symbol_states(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Vec<SymbolState>, StoreError>;

    async fn upsert_symbol_state(&self, update: SymbolStateUpdate) -> Result<SymbolState, StoreError>;

    /// Reset symbols stuck in `running` (after crash) back to `pending`. Returns count reset.
    async fn reset_stale_running(&self, workflow_id: Uuid) -> Result<i64, StoreError>;

    async fn insert_dlq_entry(&self, entry: NewDlqEntry) -> Result<i64, StoreError>;

    /// Newest first.
    async fn list_dlq(&self, resolved: bool, limit: i64) -> Result<Vec<DlqEntry>, StoreError>;

    async fn list_workflow_dlq(&self, workflow_id: Uuid) -> Result<Vec<DlqEntry>, StoreError>;

    async fn get_dlq_entry(&self, id: i64) -> Result<Option<DlqEntry>, StoreError>;

    /// Returns false when the entry is missing or already resolved.
    async fn resolve_dlq_entry(&self, id: i64, resolved_by: &str) -> Result<bool, StoreError>;

    async fn count_open_dlq(&self, workflow_id: Uuid) -> Result<i64, StoreError>;

    async fn insert_gate_result(&self, result: NewGateResult) -> Result<(), StoreError>;

    async fn get_gate_results(&self, workflow_id: Uuid) -> Result<Vec<GateResult>, StoreError>;

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> Result<Checkpoint, StoreError>;

    async fn latest_checkpoint(&self, workflow_id: Uuid) -> Result<Option<Checkpoint>, StoreError>;

    /// Oldest first.
    async fn list_checkpoints(&self, workflow_id: Uuid) -> Result<Vec<Checkpoint>, StoreError>;

    async fn append_event(&self, event: NewEvent) -> Result<(), StoreError>;

    async fn get_events_after(
        &self,
        workflow_id: Uuid,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<WorkflowEvent>, StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("store error: {0}")]
    Other(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound { kind, id: id.to_string() }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Other(e.to_string())
    }
}
