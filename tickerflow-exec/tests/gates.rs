use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use tickerflow_core::{
    ExecutionOptions, GateAction, GateDecision, GateId, GateSpec, InsufficientAction, StageName,
};
use tickerflow_exec::{GateCheck, GateEvaluator, GateRegistry, StageContext};

fn ctx(snapshot: JsonValue, force: bool) -> StageContext {
    StageContext {
        workflow_id: Uuid::new_v4(),
        workflow_type: "daily".into(),
        stage: StageName::Indicators,
        options: ExecutionOptions { force, ..Default::default() },
        snapshot,
        attempt: 1,
    }
}

fn gate(gate: GateId, min: u64, on_insufficient: InsufficientAction) -> GateSpec {
    GateSpec { gate, min, on_insufficient }
}

#[test]
fn no_gates_passes_without_audit() {
    let eval = GateEvaluator::default().evaluate("AAPL", &[], &ctx(json!({}), false));
    assert!(eval.decision.is_pass());
    assert!(eval.audit_record(Uuid::new_v4(), StageName::Indicators, "AAPL").is_none());
}

#[test]
fn all_pass_records_last_gate() {
    let gates = [
        gate(GateId::MinDailyBars, 200, InsufficientAction::Skip),
        gate(GateId::MinWeeklyBars, 52, InsufficientAction::Skip),
    ];
    let eval = GateEvaluator::default().evaluate(
        "AAPL",
        &gates,
        &ctx(json!({ "daily_bars": 250, "weekly_bars": 60 }), false),
    );
    assert_eq!(eval.decision.action, GateAction::Pass);
    assert_eq!(eval.deciding_gate, Some(GateId::MinWeeklyBars));
    let rec = eval
        .audit_record(Uuid::new_v4(), StageName::Indicators, "AAPL")
        .unwrap();
    assert_eq!(rec.gate_name, "min_weekly_bars");
    assert_eq!(rec.action, "proceed");
    assert!(rec.passed);
    assert_eq!(rec.reason, "weekly_bars=60 >= 52");
}

#[test]
fn first_failing_gate_short_circuits() {
    let gates = [
        gate(GateId::MinDailyBars, 200, InsufficientAction::Defer),
        gate(GateId::MinWeeklyBars, 52, InsufficientAction::Skip),
        gate(GateId::MinFiscalPeriods, 4, InsufficientAction::Skip),
    ];
    let eval = GateEvaluator::default().evaluate("AAPL", &gates, &ctx(json!({ "daily_bars": 3 }), false));
    assert_eq!(eval.decision.action, GateAction::Defer);
    assert_eq!(eval.decision.reason, "daily_bars=3 < 200");
    assert_eq!(eval.gates_short_circuited, 2);

    let rec = eval
        .audit_record(Uuid::new_v4(), StageName::Indicators, "AAPL")
        .unwrap();
    assert!(!rec.passed);
    assert_eq!(rec.action, "defer");
    assert_eq!(rec.gates_short_circuited, 2);
}

#[test]
fn missing_field_is_insufficient() {
    let gates = [gate(GateId::MinFiscalPeriods, 4, InsufficientAction::Skip)];
    let eval = GateEvaluator::default().evaluate("AAPL", &gates, &ctx(json!({}), false));
    assert_eq!(eval.decision.action, GateAction::Skip);
    assert_eq!(eval.decision.reason, "fiscal_periods missing from context");
}

#[test]
fn force_turns_skip_into_pass() {
    let gates = [gate(GateId::MinFiscalPeriods, 4, InsufficientAction::Skip)];
    let eval = GateEvaluator::default().evaluate("AAPL", &gates, &ctx(json!({ "fiscal_periods": 1 }), true));
    assert!(eval.forced);
    assert_eq!(eval.decision.action, GateAction::Pass);
    assert_eq!(eval.decision.reason, "forced: fiscal_periods=1 < 4");
}

struct CountingGate(AtomicUsize);

impl GateCheck for CountingGate {
    fn check(&self, _symbol: &str, _spec: &GateSpec, _ctx: &StageContext) -> GateDecision {
        self.0.fetch_add(1, Ordering::SeqCst);
        GateDecision::pass("custom")
    }
}

#[test]
fn registered_check_replaces_builtin_and_is_skipped_after_short_circuit() {
    let counting = Arc::new(CountingGate(AtomicUsize::new(0)));
    let mut registry = GateRegistry::new();
    registry.register(GateId::MinIndicatorRows, counting.clone());
    let evaluator = GateEvaluator::new(Arc::new(registry));

    let pass_first = [gate(GateId::MinIndicatorRows, 0, InsufficientAction::Skip)];
    assert!(evaluator.evaluate("AAPL", &pass_first, &ctx(json!({}), false)).decision.is_pass());
    assert_eq!(counting.0.load(Ordering::SeqCst), 1);

    let blocked = [
        gate(GateId::MinDailyBars, 10, InsufficientAction::Skip),
        gate(GateId::MinIndicatorRows, 0, InsufficientAction::Skip),
    ];
    let eval = evaluator.evaluate("AAPL", &blocked, &ctx(json!({ "daily_bars": 1 }), false));
    assert_eq!(eval.decision.action, GateAction::Skip);
    assert_eq!(counting.0.load(Ordering::SeqCst), 1);
}
