use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use tickerflow_core::{
    ParseEnumError, StageName, StageStatus, SymbolStatus, WorkflowStatus,
};

#[derive(Debug, Clone)]
pub struct NewWorkflowExecution {
    pub workflow_type: String,
    pub symbols: Vec<String>,
    /// Options and config hash captured at start; read back on resume.
    pub metadata: JsonValue,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkflowExecution {
    pub id: Uuid,
    pub workflow_type: String,
    pub status: String,
    pub current_stage: Option<String>,
    pub symbols: Vec<String>,
    pub metadata: JsonValue,
    pub control_request: Option<String>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn parsed_status(&self) -> Result<WorkflowStatus, ParseEnumError> {
        self.status.parse()
    }

    pub fn parsed_current_stage(&self) -> Result<Option<StageName>, ParseEnumError> {
        self.current_stage.as_deref().map(str::parse).transpose()
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StageExecution {
    pub workflow_id: Uuid,
    pub stage_name: String,
    pub stage_index: i32,
    pub status: String,
    pub retry_count: i32,
    pub symbols_processed: i64,
    pub symbols_succeeded: i64,
    pub symbols_failed: i64,
    pub symbols_skipped: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageExecution {
    pub fn parsed_status(&self) -> Result<StageStatus, ParseEnumError> {
        self.status.parse()
    }

    pub fn counters(&self) -> StageCounters {
        StageCounters {
            processed: self.symbols_processed,
            succeeded: self.symbols_succeeded,
            failed: self.symbols_failed,
            skipped: self.symbols_skipped,
        }
    }
}

/// Absolute per-stage counter values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StageCounters {
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub skipped: i64,
}

/// Increment applied atomically to a stage row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterDelta {
    pub processed: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub skipped: i64,
}

impl CounterDelta {
    pub fn succeeded() -> Self {
        Self { processed: 1, succeeded: 1, ..Self::default() }
    }

    pub fn failed() -> Self {
        Self { processed: 1, failed: 1, ..Self::default() }
    }

    pub fn skipped() -> Self {
        Self { processed: 1, skipped: 1, ..Self::default() }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    pub fn add(&mut self, other: CounterDelta) {
        self.processed += other.processed;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone)]
pub struct SymbolStateUpdate {
    pub workflow_id: Uuid,
    pub symbol: String,
    pub stage: StageName,
    pub status: SymbolStatus,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
}

impl SymbolStateUpdate {
    pub fn new(workflow_id: Uuid, symbol: impl Into<String>, stage: StageName, status: SymbolStatus) -> Self {
        Self {
            workflow_id,
            symbol: symbol.into(),
            stage,
            status,
            retry_count: 0,
            error_message: None,
            next_attempt_at: None,
        }
    }

    pub fn retry_count(mut self, retry_count: i32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn next_attempt_at(mut self, at: DateTime<Utc>) -> Self {
        self.next_attempt_at = Some(at);
        self
    }
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct SymbolState {
    pub workflow_id: Uuid,
    pub symbol: String,
    pub stage: String,
    pub status: String,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub next_attempt_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl SymbolState {
    pub fn parsed_status(&self) -> Result<SymbolStatus, ParseEnumError> {
        self.status.parse()
    }
}

#[derive(Debug, Clone)]
pub struct NewDlqEntry {
    pub workflow_id: Uuid,
    pub symbol: String,
    pub stage: StageName,
    pub error_message: String,
    pub error_type: String,
    pub context: JsonValue,
    pub retry_count: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DlqEntry {
    pub id: i64,
    pub workflow_id: Uuid,
    pub symbol: String,
    pub stage: String,
    pub error_message: String,
    pub error_type: String,
    pub context: JsonValue,
    pub retry_count: i32,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewGateResult {
    pub workflow_id: Uuid,
    pub stage: StageName,
    pub symbol: String,
    pub gate_name: String,
    pub passed: bool,
    pub action: String,
    pub reason: String,
    pub gates_short_circuited: i32,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct GateResult {
    pub id: i64,
    pub workflow_id: Uuid,
    pub stage: String,
    pub symbol: String,
    pub gate_name: String,
    pub passed: bool,
    pub action: String,
    pub reason: String,
    pub gates_short_circuited: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewCheckpoint {
    pub workflow_id: Uuid,
    pub stage: StageName,
    pub state: JsonValue,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Checkpoint {
    pub id: i64,
    pub workflow_id: Uuid,
    pub stage: String,
    pub state: JsonValue,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub workflow_id: Uuid,
    pub stage: Option<StageName>,
    pub symbol: Option<String>,
    pub event_type: String,
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct WorkflowEvent {
    pub id: i64,
    pub workflow_id: Uuid,
    pub ts: DateTime<Utc>,
    pub stage: Option<String>,
    pub symbol: Option<String>,
    pub event_type: String,
    pub payload: JsonValue,
}
