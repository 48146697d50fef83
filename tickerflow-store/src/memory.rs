//! Process-local [`StateStore`] backed by maps behind one tokio mutex.
//!
//! Mirrors the Postgres semantics closely enough to drive the engine in tests and
//! with `--store memory`; state is lost when the process exits.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use tickerflow_core::{ControlRequest, StageName, StageStatus, SymbolStatus, WorkflowStatus};

use crate::store::{
    Checkpoint, CounterDelta, DlqEntry, GateResult, NewCheckpoint, NewDlqEntry, NewEvent,
    NewGateResult, NewWorkflowExecution, StageCounters, StageExecution, StateStore, StoreError,
    SymbolState, SymbolStateUpdate, WorkflowEvent, WorkflowExecution,
};

type SymbolKey = (Uuid, String, String);

#[derive(Default)]
struct Inner {
    workflows: HashMap<Uuid, WorkflowExecution>,
    stages: HashMap<(Uuid, String), StageExecution>,
    symbols: BTreeMap<SymbolKey, SymbolState>,
    dlq: Vec<DlqEntry>,
    gates: Vec<GateResult>,
    checkpoints: Vec<Checkpoint>,
    events: Vec<WorkflowEvent>,
    next_id: i64,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn workflow_mut(&mut self, id: Uuid) -> Result<&mut WorkflowExecution, StoreError> {
        self.workflows
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("workflow", id))
    }

    fn stage_mut(&mut self, workflow_id: Uuid, stage: StageName) -> Option<&mut StageExecution> {
        self.stages.get_mut(&(workflow_id, stage.as_str().to_string()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn create_workflow(&self, workflow: NewWorkflowExecution) -> Result<WorkflowExecution, StoreError> {
        let rec = WorkflowExecution {
            id: Uuid::new_v4(),
            workflow_type: workflow.workflow_type,
            status: WorkflowStatus::Pending.as_str().to_string(),
            current_stage: None,
            symbols: workflow.symbols,
            metadata: workflow.metadata,
            control_request: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        self.inner.lock().await.workflows.insert(rec.id, rec.clone());
        Ok(rec)
    }

    async fn get_workflow(&self, id: Uuid) -> Result<Option<WorkflowExecution>, StoreError> {
        Ok(self.inner.lock().await.workflows.get(&id).cloned())
    }

    async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .workflows
            .values()
            .filter(|w| status.map_or(true, |s| w.status == s.as_str()))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn mark_workflow_running(&self, id: Uuid, expected: WorkflowStatus) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        let wf = inner.workflow_mut(id)?;
        if wf.status != expected.as_str() {
            return Ok(false);
        }
        wf.status = WorkflowStatus::Running.as_str().to_string();
        wf.started_at.get_or_insert_with(Utc::now);
        wf.completed_at = None;
        wf.error_message = None;
        Ok(true)
    }

    async fn set_workflow_status(&self, id: Uuid, status: WorkflowStatus) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.workflow_mut(id)?.status = status.as_str().to_string();
        Ok(())
    }

    async fn set_current_stage(&self, id: Uuid, stage: Option<StageName>) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.workflow_mut(id)?.current_stage = stage.map(|s| s.as_str().to_string());
        Ok(())
    }

    async fn finish_workflow(
        &self,
        id: Uuid,
        status: WorkflowStatus,
        error_message: Option<String>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let wf = inner.workflow_mut(id)?;
        wf.status = status.as_str().to_string();
        wf.error_message = error_message;
        wf.completed_at = Some(Utc::now());
        wf.control_request = None;
        Ok(())
    }

    async fn request_control(&self, id: Uuid, request: ControlRequest) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let wf = inner.workflow_mut(id)?;
        if wf.control_request.as_deref() != Some(ControlRequest::Cancel.as_str()) {
            wf.control_request = Some(request.as_str().to_string());
        }
        Ok(())
    }

    async fn take_control_request(&self, id: Uuid) -> Result<Option<ControlRequest>, StoreError> {
        let mut inner = self.inner.lock().await;
        let Some(wf) = inner.workflows.get_mut(&id) else {
            return Ok(None);
        };
        wf.control_request
            .take()
            .map(|s| s.parse::<ControlRequest>())
            .transpose()
            .map_err(|e| StoreError::Other(e.to_string()))
    }

    async fn begin_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        stage_index: i32,
    ) -> Result<StageExecution, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let row = inner
            .stages
            .entry((workflow_id, stage.as_str().to_string()))
            .or_insert_with(|| StageExecution {
                workflow_id,
                stage_name: stage.as_str().to_string(),
                stage_index,
                status: StageStatus::Pending.as_str().to_string(),
                retry_count: 0,
                symbols_processed: 0,
                symbols_succeeded: 0,
                symbols_failed: 0,
                symbols_skipped: 0,
                started_at: None,
                completed_at: None,
            });
        row.status = StageStatus::Running.as_str().to_string();
        row.started_at.get_or_insert(now);
        row.completed_at = None;
        Ok(row.clone())
    }

    async fn increment_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        delta: CounterDelta,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(row) = inner.stage_mut(workflow_id, stage) {
            row.symbols_processed += delta.processed;
            row.symbols_succeeded += delta.succeeded;
            row.symbols_failed += delta.failed;
            row.symbols_skipped += delta.skipped;
        }
        Ok(())
    }

    async fn set_stage_counters(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        counters: StageCounters,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(row) = inner.stage_mut(workflow_id, stage) {
            row.symbols_processed = counters.processed;
            row.symbols_succeeded = counters.succeeded;
            row.symbols_failed = counters.failed;
            row.symbols_skipped = counters.skipped;
        }
        Ok(())
    }

    async fn finish_stage(
        &self,
        workflow_id: Uuid,
        stage: StageName,
        status: StageStatus,
        retry_count: i32,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(row) = inner.stage_mut(workflow_id, stage) {
            row.status = status.as_str().to_string();
            row.retry_count = retry_count;
            row.completed_at = status.is_terminal().then(Utc::now);
        }
        Ok(())
    }

    async fn get_stage_execution(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Option<StageExecution>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .stages
            .get(&(workflow_id, stage.as_str().to_string()))
            .cloned())
    }

    async fn get_stage_executions(&self, workflow_id: Uuid) -> Result<Vec<StageExecution>, StoreError> {
        let inner = self.inner.lock().await;
        let mut rows: Vec<_> = inner
            .stages
            .values()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.stage_index);
        Ok(rows)
    }

    async fn get_symbol_state(
        &self,
        workflow_id: Uuid,
        symbol: &str,
        stage: StageName,
    ) -> Result<Option<SymbolState>, StoreError> {
        let inner = self.inner.lock().await;
        let key = (workflow_id, stage.as_str().to_string(), symbol.to_string());
        Ok(inner.symbols.get(&key).cloned())
    }

    async fn get_symbol_states(
        &self,
        workflow_id: Uuid,
        stage: StageName,
    ) -> Result<Vec<SymbolState>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .symbols
            .values()
            .filter(|s| s.workflow_id == workflow_id && s.stage == stage.as_str())
            .cloned()
            .collect())
    }

    async fn upsert_symbol_state(&self, update: SymbolStateUpdate) -> Result<SymbolState, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let key = (update.workflow_id, update.stage.as_str().to_string(), update.symbol.clone());
        let previous_start = inner.symbols.get(&key).and_then(|s| s.started_at);
        let started_at = previous_start.or((update.status == SymbolStatus::Running).then_some(now));

        let row = SymbolState {
            workflow_id: update.workflow_id,
            symbol: update.symbol,
            stage: update.stage.as_str().to_string(),
            status: update.status.as_str().to_string(),
            retry_count: update.retry_count,
            error_message: update.error_message,
            next_attempt_at: update.next_attempt_at,
            started_at,
            completed_at: update.status.is_terminal().then_some(now),
            updated_at: now,
        };
        inner.symbols.insert(key, row.clone());
        Ok(row)
    }

    async fn reset_stale_running(&self, workflow_id: Uuid) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut reset = 0;
        for state in inner.symbols.values_mut() {
            if state.workflow_id == workflow_id && state.status == SymbolStatus::Running.as_str() {
                state.status = SymbolStatus::Pending.as_str().to_string();
                state.updated_at = now;
                reset += 1;
            }
        }
        Ok(reset)
    }

    async fn insert_dlq_entry(&self, entry: NewDlqEntry) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        inner.dlq.push(DlqEntry {
            id,
            workflow_id: entry.workflow_id,
            symbol: entry.symbol,
            stage: entry.stage.as_str().to_string(),
            error_message: entry.error_message,
            error_type: entry.error_type,
            context: entry.context,
            retry_count: entry.retry_count,
            resolved: false,
            resolved_at: None,
            resolved_by: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn list_dlq(&self, resolved: bool, limit: i64) -> Result<Vec<DlqEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .dlq
            .iter()
            .rev()
            .filter(|e| e.resolved == resolved)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn list_workflow_dlq(&self, workflow_id: Uuid) -> Result<Vec<DlqEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .dlq
            .iter()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn get_dlq_entry(&self, id: i64) -> Result<Option<DlqEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.dlq.iter().find(|e| e.id == id).cloned())
    }

    async fn resolve_dlq_entry(&self, id: i64, resolved_by: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().await;
        match inner.dlq.iter_mut().find(|e| e.id == id && !e.resolved) {
            Some(entry) => {
                entry.resolved = true;
                entry.resolved_at = Some(Utc::now());
                entry.resolved_by = Some(resolved_by.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn count_open_dlq(&self, workflow_id: Uuid) -> Result<i64, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .dlq
            .iter()
            .filter(|e| e.workflow_id == workflow_id && !e.resolved)
            .count() as i64)
    }

    async fn insert_gate_result(&self, result: NewGateResult) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        inner.gates.push(GateResult {
            id,
            workflow_id: result.workflow_id,
            stage: result.stage.as_str().to_string(),
            symbol: result.symbol,
            gate_name: result.gate_name,
            passed: result.passed,
            action: result.action,
            reason: result.reason,
            gates_short_circuited: result.gates_short_circuited,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn get_gate_results(&self, workflow_id: Uuid) -> Result<Vec<GateResult>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .gates
            .iter()
            .filter(|g| g.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn insert_checkpoint(&self, checkpoint: NewCheckpoint) -> Result<Checkpoint, StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        let rec = Checkpoint {
            id,
            workflow_id: checkpoint.workflow_id,
            stage: checkpoint.stage.as_str().to_string(),
            state: checkpoint.state,
            created_at: Utc::now(),
        };
        inner.checkpoints.push(rec.clone());
        Ok(rec)
    }

    async fn latest_checkpoint(&self, workflow_id: Uuid) -> Result<Option<Checkpoint>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checkpoints
            .iter()
            .rev()
            .find(|c| c.workflow_id == workflow_id)
            .cloned())
    }

    async fn list_checkpoints(&self, workflow_id: Uuid) -> Result<Vec<Checkpoint>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .checkpoints
            .iter()
            .filter(|c| c.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn append_event(&self, event: NewEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id();
        inner.events.push(WorkflowEvent {
            id,
            workflow_id: event.workflow_id,
            ts: Utc::now(),
            stage: event.stage.map(|s| s.as_str().to_string()),
            symbol: event.symbol,
            event_type: event.event_type,
            payload: event.payload,
        });
        Ok(())
    }

    async fn get_events_after(
        &self,
        workflow_id: Uuid,
        after_id: i64,
        limit: i64,
    ) -> Result<Vec<WorkflowEvent>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.workflow_id == workflow_id && e.id > after_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
