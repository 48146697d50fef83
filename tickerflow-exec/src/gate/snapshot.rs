use serde_json::Value as JsonValue;

use tickerflow_core::{GateDecision, GateId, GateSpec, InsufficientAction};

use crate::context::StageContext;
use crate::gate::GateCheck;

/// Compares one numeric field of the context snapshot against the gate's `min`.
/// A missing or non-numeric field counts as insufficient.
pub struct SnapshotThresholdGate {
    field: &'static str,
}

impl SnapshotThresholdGate {
    pub fn new(gate: GateId) -> Self {
        Self {
            field: gate.snapshot_field(),
        }
    }
}

impl GateCheck for SnapshotThresholdGate {
    fn check(&self, _symbol: &str, spec: &GateSpec, ctx: &StageContext) -> GateDecision {
        let have = ctx.snapshot.get(self.field).and_then(as_count);
        match have {
            Some(n) if n >= spec.min => {
                GateDecision::pass(format!("{}={n} >= {}", self.field, spec.min))
            }
            Some(n) => insufficient(spec, format!("{}={n} < {}", self.field, spec.min)),
            None => insufficient(spec, format!("{} missing from context", self.field)),
        }
    }
}

fn insufficient(spec: &GateSpec, reason: String) -> GateDecision {
    match spec.on_insufficient {
        InsufficientAction::Skip => GateDecision::skip(reason),
        InsufficientAction::Defer => GateDecision::defer(reason),
    }
}

fn as_count(v: &JsonValue) -> Option<u64> {
    v.as_u64()
        .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.floor() as u64))
}
