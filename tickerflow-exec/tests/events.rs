use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::sync::Mutex;
use url::Url;
use uuid::Uuid;

use tickerflow_core::{StageName, StageStatus, WorkflowStatus};
use tickerflow_exec::executor::{
    CompositeEventSink, Event, EventSink, HttpClient, HttpError, MetricsCollector,
    MetricsEventSink, NoOpEventSink, StoreEventSink, WebhookEventSink,
};
use tickerflow_store::{MemoryStore, NewWorkflowExecution, StageCounters, StateStore};

#[derive(Default)]
struct RecordingSink(Mutex<Vec<Event>>);

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: Event) {
        self.0.lock().await.push(event);
    }
}

#[derive(Default)]
struct RecordingHttp(Mutex<Vec<(String, JsonValue)>>);

#[async_trait]
impl HttpClient for RecordingHttp {
    async fn post_json(&self, url: &Url, body: &JsonValue, _timeout: Duration) -> Result<u16, HttpError> {
        self.0.lock().await.push((url.to_string(), body.clone()));
        Ok(200)
    }
}

#[test]
fn to_json_flattens_identity_and_payload() {
    let id = Uuid::new_v4();
    let event = Event::SymbolRetryScheduled {
        workflow_id: id,
        stage: StageName::Indicators,
        symbol: "AAPL".into(),
        retry_count: 2,
        delay_ms: 400,
    };
    assert_eq!(
        event.to_json(),
        json!({
            "type": "symbol.retry_scheduled",
            "workflow_id": id.to_string(),
            "stage": "indicators",
            "symbol": "AAPL",
            "retry_count": 2,
            "delay_ms": 400,
        })
    );
}

#[tokio::test]
async fn composite_fans_out() {
    let a = Arc::new(RecordingSink::default());
    let b = Arc::new(RecordingSink::default());
    let mut composite = CompositeEventSink::new();
    assert!(composite.is_empty());
    composite.add(a.clone());
    composite.add(b.clone());

    composite
        .emit(Event::StageStarted { workflow_id: Uuid::new_v4(), stage: StageName::Signals })
        .await;
    assert_eq!(a.0.lock().await.len(), 1);
    assert_eq!(b.0.lock().await.len(), 1);
}

#[tokio::test]
async fn store_sink_appends_event_rows() {
    let store = Arc::new(MemoryStore::new());
    let wf = store
        .create_workflow(NewWorkflowExecution {
            workflow_type: "daily".into(),
            symbols: vec!["AAPL".into()],
            metadata: json!({}),
        })
        .await
        .unwrap();
    let sink = StoreEventSink::new(store.clone());
    sink.emit(Event::SymbolSkipped {
        workflow_id: wf.id,
        stage: StageName::GrowthMetrics,
        symbol: "AAPL".into(),
        reason: "fiscal_periods=2 < 4".into(),
    })
    .await;

    let events = store.get_events_after(wf.id, 0, 10).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "symbol.skipped");
    assert_eq!(events[0].stage.as_deref(), Some("growth_metrics"));
    assert_eq!(events[0].payload["reason"], "fiscal_periods=2 < 4");
}

#[tokio::test]
async fn metrics_sink_counts_run_events() {
    let collector = Arc::new(MetricsCollector::new());
    let sink = MetricsEventSink::new(collector.clone(), Arc::new(NoOpEventSink));
    let id = Uuid::new_v4();

    sink.emit(Event::WorkflowStarted {
        workflow_id: id,
        workflow_type: "daily".into(),
        symbols: 2,
        resumed: false,
    })
    .await;
    sink.emit(Event::SymbolCompleted { workflow_id: id, stage: StageName::Ingestion, symbol: "AAPL".into() })
        .await;
    sink.emit(Event::SymbolDeadLettered {
        workflow_id: id,
        stage: StageName::Ingestion,
        symbol: "MSFT".into(),
        retry_count: 0,
        error: "permanent: 404".into(),
    })
    .await;
    sink.emit(Event::StageFinished {
        workflow_id: id,
        stage: StageName::Ingestion,
        status: StageStatus::Failed,
        counters: StageCounters { processed: 2, succeeded: 1, failed: 1, skipped: 0 },
    })
    .await;
    sink.emit(Event::WorkflowFinished { workflow_id: id, status: WorkflowStatus::Failed, error: None })
        .await;

    let m = collector.get_metrics().await;
    assert_eq!(m.workflow_id, Some(id));
    assert_eq!(m.status, "failed");
    assert_eq!(m.symbols_completed, 1);
    assert_eq!(m.dead_lettered, 1);
    assert_eq!(m.stages_failed, 1);
    assert!(m.total_duration.is_some());
    assert_eq!(m.to_json()["symbols"]["dead_lettered"], 1);
}

#[tokio::test]
async fn webhook_posts_only_workflow_endings() {
    let http = Arc::new(RecordingHttp::default());
    let base = Arc::new(RecordingSink::default());
    let url = Url::parse("http://hooks.test/tickerflow").unwrap();
    let sink = WebhookEventSink::new(url, http.clone(), base.clone());
    let id = Uuid::new_v4();

    sink.emit(Event::StageStarted { workflow_id: id, stage: StageName::Ingestion }).await;
    sink.emit(Event::WorkflowPaused { workflow_id: id, stage: Some(StageName::Ingestion) }).await;
    sink.emit(Event::WorkflowFinished { workflow_id: id, status: WorkflowStatus::Completed, error: None })
        .await;

    for _ in 0..50 {
        if http.0.lock().await.len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(base.0.lock().await.len(), 3);
    let posts = http.0.lock().await;
    assert_eq!(posts.len(), 2);
    let types: Vec<_> = posts.iter().map(|(_, body)| body["type"].clone()).collect();
    assert!(types.contains(&json!("workflow.paused")));
    assert!(types.contains(&json!("workflow.finished")));
    assert!(posts.iter().all(|(u, _)| u == "http://hooks.test/tickerflow"));
}
