use sqlx::PgPool;
use uuid::Uuid;

use tickerflow_core::{ControlRequest, StageName, StageStatus, WorkflowStatus};

use crate::store::{
    Checkpoint, CounterDelta, DlqEntry, GateResult, NewCheckpoint, NewDlqEntry, NewEvent,
    NewGateResult, NewWorkflowExecution, StageCounters, StageExecution, StateStore, StoreError,
    SymbolState, SymbolStateUpdate, WorkflowEvent, WorkflowExecution,
};

use super::audit;
use super::dlq;
use super::stages;
use super::symbols;
use super::workflows;

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl StateStore for PostgresStore {
    async fn create_workflow(&self, workflow: NewWorkflowExecution) -> Result<WorkflowExecution, StoreError> {
        workflows::create_workflow(&self.pool, workflow).await
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
        workflows::get_workflow(&self.pool, id).await
    }

    async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        workflows::list_workflows(&self.pool, status, limit).await
    }

    async fn mark_workflow_running(&self, id: Uuid, expected: WorkflowStatus) -> Result<bool, StoreError> {
        workflows::mark_workflow_running(&self.pool, id, expected).await
    }

    async fn set_workflow_status(&self, id: Uuid, status: WorkflowStatus) -> Result<(), StoreError> {
        workflows::set_workflow_status(&self.pool, id, status).await
    }

    async fn set_current_stage(&self, id: Uuid, stage: Option<StageName>) -> Result<(), StoreError> {
        workflows::set_current_stage(&self.pool, id, stage).await
    }

    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        workflows::finish_workflow(&self.pool, id, status, error_message).await
    }

    async fn request_control(&self, id: Uuid, request: ControlRequest) -> Result<(), StoreError> {
        workflows::request_control(&self.pool, id, request).await
    }

    async fn take_control_request(&self, id: Uuid) -> Result<Option<ControlRequest>, StoreError> {
        workflows::take_control_request(&self.pool, id).await
    }

    async fn begin_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        stage_index: i32,
    ) -> Result<StageExecution, StoreError> {
        stages::begin_stage(&self.pool, workflow_id, stage, stage_index).await
    }

    async fn increment_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        stages::increment_stage_counters(&self.pool, workflow_id, stage, delta).await
    }

    async fn set_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        counters: StageCounters,
    ) -> Result<(), StoreError> {
        stages::set_stage_counters(&self.pool, workflow_id, stage, counters).await
    }

    async fn finish_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        status: StageStatus,
        retry_count: i32,
    ) -> Result<(), StoreError> {
        stages::finish_stage(&self.pool, workflow_id, stage, status, retry_count).await
    }

    async fn get_stage_execution(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Option<StageExecution>, StoreError> {
        stages::get_stage_execution(&self.pool, workflow_id, stage).await
    }

    async fn get_stage_executions(&self, workflow_id: Uuid) -> Result<Vec<StageExecution>, StoreError> {
        stages::get_stage_executions(&self.pool, workflow_id).await
    }

    async fn get_symbol_state(
        &self,
        workflow_id: Uuid,
        symbol: &str,
        stage: StageName,
    ) -> Result<Option<SymbolState>, StoreError> {
        symbols::get_symbol_state(&self.pool, workflow_id, symbol, stage).await
    }

    async fn get_symbol_states(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Vec<SymbolState>, StoreError> {
        symbols::get_symbol_states(&self.pool, workflow_id, stage).await
    }

    async fn upsert_symbol_state(&self, update: SymbolStateUpdate) -> Result<SymbolState, StoreError> {
        symbols::upsert_symbol_state(&self.pool, update).await
    }

    async fn reset_stale_running(&self, workflow_id: Uuid) -> Result<i64, StoreError> {
        symbols::reset_stale_running(&self.pool, workflow_id).await
    }

    async fn insert_dlq_entry(&self, entry: NewDlqEntry) -> Result<i64, StoreError> {
        dlq::insert_dlq_entry(&self.pool, entry).await
    }

    async fn list_dlq(&self, resolved: bool, limit: i64) -> Result<Vec<DlqEntry>, StoreError> {
        dlq::list_dlq(&self.pool, resolved, limit).await
    }

    async fn list_workflow_dlq(&self, workflow_id: Uuid) -> Result<Vec<DlqEntry>, StoreError> {
        dlq::list_workflow_dlq(&self.pool, workflow_id).await
    }

    async fn get_dlq_entry(&self, id: i64) -> Result<Option<DlqEntry>, StoreError> {
        dlq::get_dlq_entry(&self.pool, id).await
    }

    async fn resolve_dlq_entry(&self, id: i64, resolved_by: &str) -> Result<bool, StoreError> {
        dlq::resolve_dlq_entry(&self.pool, id, resolved_by).await
    }

    async fn count_open_dlq(&self, workflow_id: Uuid) -> Result<i64, StoreError> {
        dlq::count_open_dlq(&self.pool, workflow_id).await
    }

    async fn insert_gate_result(&self, result: NewGateResult) -> Result<(), StoreError> {
        audit::insert_gate_result(&self.pool, result).await
    }

    async fn get_gate_results(&self, workflow_id: Uuid) -> Result<Vec<GateResult>, StoreError> {
        audit::get_gate_results(&self.pool, workflow_id).await
    }

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> Result<Checkpoint, StoreError> {
        audit::insert_checkpoint(&self.pool, checkpoint).await
    }

    async fn latest_checkpoint(&self, workflow_id: Uuid) -> Result<Option<Checkpoint>, StoreError> {
        audit::latest_checkpoint(&self.pool, workflow_id).await
    }

    async fn list_checkpoints(&self, workflow_id: Uuid) -> Result<Vec<Checkpoint>, StoreError> {
        audit::list_checkpoints(&self.pool, workflow_id).await
    }

    async fn append_event(&self, event: NewEvent) -> Result<(), StoreError> {
        audit::append_event(&self.pool, event).await
    }

    async fn get_events_after(
        &self,
        workflow_id: Uuid,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<WorkflowEvent>, StoreError> {
        audit::get_events_after(&self.pool, workflow_id, after_id, limit).await
    }
}
