mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use tickerflow_core::{
    ControlRequest, ExecutionOptions, StageName, StageSpec, StageStatus, SymbolStatus,
    WorkflowStatus,
};
use tickerflow_exec::{
    config_hash, CheckpointState, ControlAck, EngineError, HandlerRegistry, WorkflowEngine,
    CHECKPOINT_VERSION,
};
use tickerflow_store::{NewCheckpoint, StateStore, SymbolStateUpdate};

fn two_stage() -> Vec<StageSpec> {
    vec![
        StageSpec::new(StageName::Ingestion, true),
        StageSpec::new(StageName::Indicators, true),
    ]
}

#[tokio::test]
async fn cancel_stops_dispatch_and_lets_in_flight_finish() {
    let blocking = BlockingHandler::new();
    let mut wt = fast_type("daily", two_stage());
    wt.concurrency = 1;
    let indicators = FnHandler::ok();
    let h = harness(
        wt,
        HandlerRegistry::new()
            .with(StageName::Ingestion, blocking.clone())
            .with(StageName::Indicators, indicators.clone()),
    );
    let engine = Arc::new(h.engine);

    let id = engine
        .create("daily", symbols(&[AAPL, MSFT, "NVDA"]), ExecutionOptions::default())
        .await
        .unwrap();
    let run = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(id).await }
    });

    blocking.entered.notified().await;
    assert_eq!(engine.cancel(id).await.unwrap(), ControlAck::Signalled);
    blocking.release();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.status, WorkflowStatus::Cancelled);
    assert_eq!(blocking.calls(), 1);
    assert_eq!(indicators.calls(), 0);
    assert_eq!(summary.stages[0].interrupted, Some(ControlRequest::Cancel));
    assert_eq!(summary.stages[0].status, StageStatus::Skipped);

    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Cancelled);
    let row = h
        .store
        .get_stage_execution(id, StageName::Ingestion)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.parsed_status().unwrap(), StageStatus::Skipped);
    assert_eq!(row.counters().succeeded, 1);

    // Nothing is left running; undispatched symbols stay pending for the record.
    let states = h.store.get_symbol_states(id, StageName::Ingestion).await.unwrap();
    assert!(states
        .iter()
        .all(|s| s.parsed_status().unwrap() != SymbolStatus::Running));
    let aapl = states.iter().find(|s| s.symbol == AAPL).unwrap();
    assert_eq!(aapl.parsed_status().unwrap(), SymbolStatus::Completed);
    for symbol in [MSFT, "NVDA"] {
        let state = states.iter().find(|s| s.symbol == symbol);
        assert!(state.map_or(true, |s| s.parsed_status().unwrap() == SymbolStatus::Pending));
    }

    let checkpoint = h.store.latest_checkpoint(id).await.unwrap().unwrap();
    let state: CheckpointState = serde_json::from_value(checkpoint.state).unwrap();
    assert_eq!(state.stage, StageName::Ingestion);
    assert_eq!(state.pending_symbols, symbols(&[MSFT, "NVDA"]));

    assert!(matches!(
        engine.resume(id).await.unwrap_err(),
        EngineError::InvalidState { action: "resume", .. }
    ));
}

#[tokio::test]
async fn second_driver_is_refused_while_run_is_in_flight() {
    let blocking = BlockingHandler::new();
    let h = harness(
        fast_type("daily", vec![StageSpec::new(StageName::Ingestion, true)]),
        HandlerRegistry::new().with(StageName::Ingestion, blocking.clone()),
    );
    let engine = Arc::new(h.engine);

    let id = engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();
    let run = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(id).await }
    });

    blocking.entered.notified().await;
    assert!(matches!(
        engine.resume(id).await.unwrap_err(),
        EngineError::InvalidState { action: "resume", .. }
    ));
    assert!(matches!(
        engine.run(id).await.unwrap_err(),
        EngineError::InvalidState { action: "run", .. }
    ));
    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Running);
    blocking.release();

    let summary = run.await.unwrap().unwrap();
    assert_eq!(summary.status, WorkflowStatus::Completed);
    assert_eq!(blocking.calls(), 1);
    let row = h
        .store
        .get_stage_execution(id, StageName::Ingestion)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.counters().processed, 1);
    assert_eq!(row.counters().succeeded, 1);
}

#[tokio::test]
async fn pause_then_resume_finishes_remaining_work() {
    let blocking = BlockingHandler::new();
    let mut wt = fast_type("daily", two_stage());
    wt.concurrency = 1;
    let indicators = FnHandler::ok();
    let h = harness(
        wt,
        HandlerRegistry::new()
            .with(StageName::Ingestion, blocking.clone())
            .with(StageName::Indicators, indicators.clone()),
    );
    let engine = Arc::new(h.engine);

    let id = engine
        .create("daily", symbols(&[AAPL, MSFT]), ExecutionOptions::default())
        .await
        .unwrap();
    let run = tokio::spawn({
        let engine = engine.clone();
        async move { engine.run(id).await }
    });

    blocking.entered.notified().await;
    assert_eq!(engine.pause(id).await.unwrap(), ControlAck::Signalled);
    blocking.release();

    let paused = run.await.unwrap().unwrap();
    assert_eq!(paused.status, WorkflowStatus::Paused);
    assert_eq!(engine.pause(id).await.unwrap(), ControlAck::Unchanged);

    let summary = engine.resume(id).await.unwrap();
    assert_eq!(summary.status, WorkflowStatus::Completed);
    assert_eq!(blocking.calls(), 2);
    assert_eq!(indicators.calls(), 2);

    let row = h
        .store
        .get_stage_execution(id, StageName::Ingestion)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.counters().processed, 2);
    assert_eq!(row.counters().succeeded, 2);
}

#[tokio::test]
async fn cancel_pending_applies_directly() {
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, FnHandler::ok())
            .with(StageName::Indicators, FnHandler::ok()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();

    assert_eq!(h.engine.cancel(id).await.unwrap(), ControlAck::Applied);
    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Cancelled);
    assert!(matches!(
        h.engine.cancel(id).await.unwrap_err(),
        EngineError::InvalidState { .. }
    ));
    assert!(matches!(
        h.engine.pause(id).await.unwrap_err(),
        EngineError::InvalidState { action: "pause", .. }
    ));
}

#[tokio::test]
async fn pause_pending_then_resume_runs_everything() {
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, FnHandler::ok())
            .with(StageName::Indicators, FnHandler::ok()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL, MSFT]), ExecutionOptions::default())
        .await
        .unwrap();

    assert_eq!(h.engine.pause(id).await.unwrap(), ControlAck::Applied);
    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Paused);
    assert!(matches!(
        h.engine.run(id).await.unwrap_err(),
        EngineError::InvalidState { action: "run", .. }
    ));

    let summary = h.engine.resume(id).await.unwrap();
    assert_eq!(summary.status, WorkflowStatus::Completed);
    assert_eq!(summary.stages.len(), 2);
}

#[tokio::test]
async fn cross_process_cancel_is_persisted_and_observed() {
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, FnHandler::ok())
            .with(StageName::Indicators, FnHandler::ok()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();

    // Another process owns the run.
    assert!(h.store.mark_workflow_running(id, WorkflowStatus::Pending).await.unwrap());
    assert_eq!(h.engine.cancel(id).await.unwrap(), ControlAck::Requested);

    // That process dies; resuming here picks the request up at the first check.
    let summary = h.engine.resume(id).await.unwrap();
    assert_eq!(summary.status, WorkflowStatus::Cancelled);
    assert!(h.store.get_stage_executions(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn resume_after_crash_skips_terminal_work() {
    let ingestion = FnHandler::ok();
    let indicators = FnHandler::ok();
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, ingestion.clone())
            .with(StageName::Indicators, indicators.clone()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL, MSFT, "NVDA"]), ExecutionOptions::default())
        .await
        .unwrap();

    // State left behind by a process that died mid-stage.
    assert!(h.store.mark_workflow_running(id, WorkflowStatus::Pending).await.unwrap());
    h.store.begin_stage(id, StageName::Ingestion, 0).await.unwrap();
    h.store
        .upsert_symbol_state(SymbolStateUpdate::new(id, AAPL, StageName::Ingestion, SymbolStatus::Completed))
        .await
        .unwrap();
    h.store
        .upsert_symbol_state(SymbolStateUpdate::new(id, MSFT, StageName::Ingestion, SymbolStatus::Running))
        .await
        .unwrap();

    let summary = h.engine.resume(id).await.unwrap();
    assert_eq!(summary.status, WorkflowStatus::Completed);
    assert_eq!(ingestion.calls_for(AAPL), 0);
    assert_eq!(ingestion.calls_for(MSFT), 1);
    assert_eq!(ingestion.calls_for("NVDA"), 1);
    assert_eq!(indicators.calls(), 3);

    let row = h
        .store
        .get_stage_execution(id, StageName::Ingestion)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.counters().processed, 3);
    assert_eq!(row.counters().succeeded, 3);

    // A second resume of a finished run is refused and changes nothing.
    assert!(h.engine.resume(id).await.is_err());
    assert_eq!(indicators.calls(), 3);
}

#[tokio::test]
async fn resume_does_not_rerun_completed_stages() {
    let ingestion = FnHandler::ok();
    let indicators = FnHandler::ok();
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, ingestion.clone())
            .with(StageName::Indicators, indicators.clone()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();

    assert!(h.store.mark_workflow_running(id, WorkflowStatus::Pending).await.unwrap());
    h.store.begin_stage(id, StageName::Ingestion, 0).await.unwrap();
    h.store
        .upsert_symbol_state(SymbolStateUpdate::new(id, AAPL, StageName::Ingestion, SymbolStatus::Completed))
        .await
        .unwrap();
    h.store
        .finish_stage(id, StageName::Ingestion, StageStatus::Completed, 0)
        .await
        .unwrap();
    // Died before the post-stage checkpoint: the last one still points at ingestion.
    insert_checkpoint(&h, id, StageName::Ingestion, 0).await;

    let summary = h.engine.resume(id).await.unwrap();
    assert_eq!(summary.status, WorkflowStatus::Completed);
    assert_eq!(summary.stages.len(), 1);
    assert_eq!(summary.stages[0].stage, StageName::Indicators);
    assert_eq!(ingestion.calls(), 0);
    assert_eq!(indicators.calls(), 1);
}

async fn insert_checkpoint(h: &Harness, id: uuid::Uuid, stage: StageName, next_stage_index: usize) {
    let wt = fast_type("daily", two_stage());
    let state = CheckpointState {
        version: CHECKPOINT_VERSION,
        stage_index: wt.stage_index(stage).unwrap(),
        stage,
        stage_status: StageStatus::Running,
        next_stage_index,
        completed_stages: wt.stages[..next_stage_index].iter().map(|s| s.stage).collect(),
        pending_symbols: Vec::new(),
        config_hash: config_hash(&wt).unwrap(),
    };
    h.store
        .insert_checkpoint(NewCheckpoint {
            workflow_id: id,
            stage,
            state: serde_json::to_value(&state).unwrap(),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn checkpoint_ahead_of_stage_rows_fails_the_resume() {
    let ingestion = FnHandler::ok();
    let h = harness(
        fast_type("daily", two_stage()),
        HandlerRegistry::new()
            .with(StageName::Ingestion, ingestion.clone())
            .with(StageName::Indicators, FnHandler::ok()),
    );
    let id = h
        .engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();
    assert!(h.store.mark_workflow_running(id, WorkflowStatus::Pending).await.unwrap());
    // Claims ingestion is done, but no stage row says so.
    insert_checkpoint(&h, id, StageName::Ingestion, 1).await;

    let err = h.engine.resume(id).await.unwrap_err();
    assert!(matches!(err, EngineError::CheckpointCorrupt { .. }));
    assert_eq!(ingestion.calls(), 0);
    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Failed);
}

#[tokio::test]
async fn config_drift_fails_the_resume() {
    let handlers = HandlerRegistry::new()
        .with(StageName::Ingestion, FnHandler::ok())
        .with(StageName::Indicators, FnHandler::ok());
    let h = harness(fast_type("daily", two_stage()), handlers.clone());
    let id = h
        .engine
        .create("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();
    assert!(h.store.mark_workflow_running(id, WorkflowStatus::Pending).await.unwrap());

    let mut changed = fast_type("daily", two_stage());
    changed.max_retries = 9;
    let other = WorkflowEngine::new(
        pipeline(changed),
        Arc::new(handlers),
        h.store.clone(),
        Arc::new(tickerflow_exec::executor::NoOpEventSink),
    );

    let err = other.resume(id).await.unwrap_err();
    assert!(matches!(err, EngineError::ConfigDrift { .. }));
    let wf = h.store.get_workflow(id).await.unwrap().unwrap();
    assert_eq!(wf.parsed_status().unwrap(), WorkflowStatus::Failed);
    assert!(wf.error_message.unwrap().contains("changed since it started"));
}

#[tokio::test]
async fn dlq_resolution_is_one_shot() {
    let h = harness(
        fast_type("daily", vec![StageSpec::new(StageName::Ingestion, false)]),
        HandlerRegistry::new().with(
            StageName::Ingestion,
            FnHandler::new(|_, _| Err(tickerflow_exec::HandlerError::permanent("gone"))),
        ),
    );
    h.engine
        .start("daily", symbols(&[AAPL]), ExecutionOptions::default())
        .await
        .unwrap();

    let entry = h.engine.list_dlq(false, 10).await.unwrap().remove(0);
    let resolved = h.engine.resolve_dlq(entry.id, "oncall").await.unwrap();
    assert!(resolved.resolved);
    assert_eq!(resolved.resolved_by.as_deref(), Some("oncall"));
    assert_eq!(resolved.context["required_stage"], json!(false));

    assert!(matches!(
        h.engine.resolve_dlq(entry.id, "oncall").await.unwrap_err(),
        EngineError::DlqEntryAlreadyResolved(_)
    ));
    assert!(matches!(
        h.engine.resolve_dlq(424242, "oncall").await.unwrap_err(),
        EngineError::DlqEntryNotFound(424242)
    ));
    assert!(h.engine.list_dlq(false, 10).await.unwrap().is_empty());
}
