use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use tickerflow_core::{StageName, StageStatus, WorkflowStatus};
use tickerflow_store::{NewEvent, StageCounters, StateStore};

#[derive(Debug, Clone)]
pub enum Event {
    WorkflowStarted {
        workflow_id: Uuid,
        workflow_type: String,
        symbols: usize,
        resumed: bool,
    },
    WorkflowPaused {
        workflow_id: Uuid,
        stage: Option<StageName>,
    },
    WorkflowFinished {
        workflow_id: Uuid,
        status: WorkflowStatus,
        error: Option<String>,
    },
    StageStarted {
        workflow_id: Uuid,
        stage: StageName,
    },
    StageFinished {
        workflow_id: Uuid,
        stage: StageName,
        status: StageStatus,
        counters: StageCounters,
    },
    SymbolCompleted {
        workflow_id: Uuid,
        stage: StageName,
        symbol: String,
    },
    SymbolSkipped {
        workflow_id: Uuid,
        stage: StageName,
        symbol: String,
        reason: String,
    },
    SymbolDeferred {
        workflow_id: Uuid,
        stage: StageName,
        symbol: String,
        reason: String,
    },
    SymbolRetryScheduled {
        workflow_id: Uuid,
        stage: StageName,
        symbol: String,
        retry_count: u32,
        delay_ms: u64,
    },
    SymbolDeadLettered {
        workflow_id: Uuid,
        stage: StageName,
        symbol: String,
        retry_count: u32,
        error: String,
    },
    CheckpointWritten {
        workflow_id: Uuid,
        stage: StageName,
        checkpoint_id: i64,
    },
}

impl Event {
    pub fn workflow_id(&self) -> Uuid {
        match self {
            Event::WorkflowStarted { workflow_id, .. }
            | Event::WorkflowPaused { workflow_id, .. }
            | Event::WorkflowFinished { workflow_id, .. }
            | Event::StageStarted { workflow_id, .. }
            | Event::StageFinished { workflow_id, .. }
            | Event::SymbolCompleted { workflow_id, .. }
            | Event::SymbolSkipped { workflow_id, .. }
            | Event::SymbolDeferred { workflow_id, .. }
            | Event::SymbolRetryScheduled { workflow_id, .. }
            | Event::SymbolDeadLettered { workflow_id, .. }
            | Event::CheckpointWritten { workflow_id, .. } => *workflow_id,
        }
    }

    pub fn event_type(&self) -> &'static str {
        match self {
            Event::WorkflowStarted { .. } => "workflow.started",
            Event::WorkflowPaused { .. } => "workflow.paused",
            Event::WorkflowFinished { .. } => "workflow.finished",
            Event::StageStarted { .. } => "stage.started",
            Event::StageFinished { .. } => "stage.finished",
            Event::SymbolCompleted { .. } => "symbol.completed",
            Event::SymbolSkipped { .. } => "symbol.skipped",
            Event::SymbolDeferred { .. } => "symbol.deferred",
            Event::SymbolRetryScheduled { .. } => "symbol.retry_scheduled",
            Event::SymbolDeadLettered { .. } => "symbol.dead_lettered",
            Event::CheckpointWritten { .. } => "checkpoint.written",
        }
    }

    pub fn stage(&self) -> Option<StageName> {
        match self {
            Event::WorkflowStarted { .. } | Event::WorkflowFinished { .. } => None,
            Event::WorkflowPaused { stage, .. } => *stage,
            Event::StageStarted { stage, .. }
            | Event::StageFinished { stage, .. }
            | Event::SymbolCompleted { stage, .. }
            | Event::SymbolSkipped { stage, .. }
            | Event::SymbolDeferred { stage, .. }
            | Event::SymbolRetryScheduled { stage, .. }
            | Event::SymbolDeadLettered { stage, .. }
            | Event::CheckpointWritten { stage, .. } => Some(*stage),
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            Event::SymbolCompleted { symbol, .. }
            | Event::SymbolSkipped { symbol, .. }
            | Event::SymbolDeferred { symbol, .. }
            | Event::SymbolRetryScheduled { symbol, .. }
            | Event::SymbolDeadLettered { symbol, .. } => Some(symbol),
            _ => None,
        }
    }

    /// Event-specific fields; identity fields (workflow, stage, symbol) are not repeated.
    pub fn payload(&self) -> JsonValue {
        match self {
            Event::WorkflowStarted { workflow_type, symbols, resumed, .. } => {
                json!({ "workflow_type": workflow_type, "symbols": symbols, "resumed": resumed })
            }
            Event::WorkflowFinished { status, error, .. } => {
                json!({ "status": status.as_str(), "error": error })
            }
            Event::StageFinished { status, counters, .. } => json!({
                "status": status.as_str(),
                "processed": counters.processed,
                "succeeded": counters.succeeded,
                "failed": counters.failed,
                "skipped": counters.skipped,
            }),
            Event::SymbolSkipped { reason, .. } | Event::SymbolDeferred { reason, .. } => {
                json!({ "reason": reason })
            }
            Event::SymbolRetryScheduled { retry_count, delay_ms, .. } => {
                json!({ "retry_count": retry_count, "delay_ms": delay_ms })
            }
            Event::SymbolDeadLettered { retry_count, error, .. } => {
                json!({ "retry_count": retry_count, "error": error })
            }
            Event::CheckpointWritten { checkpoint_id, .. } => json!({ "checkpoint_id": checkpoint_id }),
            Event::WorkflowPaused { .. }
            | Event::StageStarted { .. }
            | Event::SymbolCompleted { .. } => json!({}),
        }
    }

    /// Flat JSON form used by stdout and webhook sinks.
    pub fn to_json(&self) -> JsonValue {
        let mut out = json!({
            "type": self.event_type(),
            "workflow_id": self.workflow_id().to_string(),
        });
        if let Some(stage) = self.stage() {
            out["stage"] = json!(stage.as_str());
        }
        if let Some(symbol) = self.symbol() {
            out["symbol"] = json!(symbol);
        }
        if let (JsonValue::Object(dst), JsonValue::Object(src)) = (&mut out, self.payload()) {
            dst.extend(src);
        }
        out
    }
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: Event);
}

pub struct CompositeEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl Default for CompositeEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositeEventSink {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn add(&mut self, sink: Arc<dyn EventSink>) {
        self.sinks.push(sink);
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl EventSink for CompositeEventSink {
    async fn emit(&self, event: Event) {
        for sink in &self.sinks {
            sink.emit(event.clone()).await;
        }
    }
}

/// Appends to the `workflow_events` log.
pub struct StoreEventSink {
    store: Arc<dyn StateStore>,
}

impl StoreEventSink {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl EventSink for StoreEventSink {
    async fn emit(&self, event: Event) {
        let res = self
            .store
            .append_event(NewEvent {
                workflow_id: event.workflow_id(),
                stage: event.stage(),
                symbol: event.symbol().map(str::to_string),
                event_type: event.event_type().to_string(),
                payload: event.payload(),
            })
            .await;
        if let Err(e) = res {
            tracing::warn!(event = event.event_type(), error = %e, "failed to persist event");
        }
    }
}

/// One JSON object per line on stdout.
pub struct StdoutEventSink;

#[async_trait]
impl EventSink for StdoutEventSink {
    async fn emit(&self, event: Event) {
        println!("{}", event.to_json());
    }
}

pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _event: Event) {}
}
