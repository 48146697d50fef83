use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use tickerflow_core::{StageStatus, WorkflowStatus};

use crate::executor::{Event, EventSink};

#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    pub workflow_id: Option<Uuid>,
    pub workflow_type: String,
    pub status: String,
    pub started_at: Option<Instant>,
    pub total_duration: Option<Duration>,
    pub stages_completed: usize,
    pub stages_failed: usize,
    pub stages_skipped: usize,
    pub symbols_completed: usize,
    pub symbols_skipped: usize,
    pub symbols_deferred: usize,
    pub retries_scheduled: usize,
    pub dead_lettered: usize,
    pub checkpoints: usize,
}

impl RunMetrics {
    fn start(&mut self, workflow_id: Uuid, workflow_type: &str) {
        self.workflow_id = Some(workflow_id);
        self.workflow_type = workflow_type.to_string();
        self.status = WorkflowStatus::Running.as_str().to_string();
        self.started_at = Some(Instant::now());
    }

    fn finish(&mut self, status: &str) {
        self.status = status.to_string();
        self.total_duration = self.started_at.map(|t| t.elapsed());
    }

    pub fn record(&mut self, event: &Event) {
        match event {
            Event::WorkflowStarted { workflow_id, workflow_type, .. } => {
                self.start(*workflow_id, workflow_type)
            }
            Event::WorkflowPaused { .. } => self.finish(WorkflowStatus::Paused.as_str()),
            Event::WorkflowFinished { status, .. } => self.finish(status.as_str()),
            Event::StageFinished { status, .. } => match status {
                StageStatus::Completed => self.stages_completed += 1,
                StageStatus::Failed => self.stages_failed += 1,
                StageStatus::Skipped => self.stages_skipped += 1,
                StageStatus::Pending | StageStatus::Running => {}
            },
            Event::SymbolCompleted { .. } => self.symbols_completed += 1,
            Event::SymbolSkipped { .. } => self.symbols_skipped += 1,
            Event::SymbolDeferred { .. } => self.symbols_deferred += 1,
            Event::SymbolRetryScheduled { .. } => self.retries_scheduled += 1,
            Event::SymbolDeadLettered { .. } => self.dead_lettered += 1,
            Event::CheckpointWritten { .. } => self.checkpoints += 1,
            Event::StageStarted { .. } => {}
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "workflow_id": self.workflow_id.map(|id| id.to_string()),
            "workflow_type": self.workflow_type,
            "status": self.status,
            "duration_ms": self.total_duration.map(|d| d.as_millis() as u64),
            "stages": {
                "completed": self.stages_completed,
                "failed": self.stages_failed,
                "skipped": self.stages_skipped,
            },
            "symbols": {
                "completed": self.symbols_completed,
                "skipped": self.symbols_skipped,
                "deferred": self.symbols_deferred,
                "retries_scheduled": self.retries_scheduled,
                "dead_lettered": self.dead_lettered,
            },
            "checkpoints": self.checkpoints,
        })
    }
}

#[derive(Default)]
pub struct MetricsCollector {
    metrics: Mutex<RunMetrics>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, event: &Event) {
        self.metrics.lock().await.record(event);
    }

    pub async fn get_metrics(&self) -> RunMetrics {
        self.metrics.lock().await.clone()
    }
}

pub struct MetricsEventSink {
    collector: Arc<MetricsCollector>,
    base: Arc<dyn EventSink>,
}

impl MetricsEventSink {
    pub fn new(collector: Arc<MetricsCollector>, base: Arc<dyn EventSink>) -> Self {
        Self { collector, base }
    }
}

#[async_trait]
impl EventSink for MetricsEventSink {
    async fn emit(&self, event: Event) {
        self.collector.record(&event).await;
        self.base.emit(event).await;
    }
}
