use std::sync::Arc;

use uuid::Uuid;

use tickerflow_core::{GateAction, GateDecision, GateId, GateSpec, StageName};
use tickerflow_store::NewGateResult;

use crate::context::StageContext;
use crate::gate::GateRegistry;

#[derive(Debug, Clone, PartialEq)]
pub struct GateEvaluation {
    pub decision: GateDecision,
    /// Gate whose result decided; the last gate when all passed, `None` without gates.
    pub deciding_gate: Option<GateId>,
    pub gates_short_circuited: usize,
    /// The decision was overridden to PASS by `ExecutionOptions::force`.
    pub forced: bool,
}

impl GateEvaluation {
    fn ungated() -> Self {
        Self {
            decision: GateDecision::pass("no gates"),
            deciding_gate: None,
            gates_short_circuited: 0,
            forced: false,
        }
    }

    /// Audit row for this evaluation, or `None` when the stage has no gates.
    pub fn audit_record(&self, workflow_id: Uuid, stage: StageName, symbol: &str) -> Option<NewGateResult> {
        let gate = self.deciding_gate?;
        Some(NewGateResult {
            workflow_id,
            stage,
            symbol: symbol.to_string(),
            gate_name: gate.as_str().to_string(),
            passed: self.decision.is_pass(),
            action: self.decision.action.as_str().to_string(),
            reason: self.decision.reason.clone(),
            gates_short_circuited: self.gates_short_circuited as i32,
        })
    }
}

/// Runs a stage's gates in configured order. The first non-PASS result wins.
#[derive(Clone, Default)]
pub struct GateEvaluator {
    registry: Arc<GateRegistry>,
}

impl GateEvaluator {
    pub fn new(registry: Arc<GateRegistry>) -> Self {
        Self { registry }
    }

    pub fn evaluate(&self, symbol: &str, gates: &[GateSpec], ctx: &StageContext) -> GateEvaluation {
        let mut last_pass = None;
        for (idx, spec) in gates.iter().enumerate() {
            let decision = self.registry.get(spec.gate).check(symbol, spec, ctx);
            if decision.is_pass() {
                last_pass = Some((spec.gate, decision));
                continue;
            }

            let gates_short_circuited = gates.len() - idx - 1;
            if ctx.options.force {
                return GateEvaluation {
                    decision: GateDecision {
                        action: GateAction::Pass,
                        reason: format!("forced: {}", decision.reason),
                    },
                    deciding_gate: Some(spec.gate),
                    gates_short_circuited,
                    forced: true,
                };
            }
            return GateEvaluation {
                decision,
                deciding_gate: Some(spec.gate),
                gates_short_circuited,
                forced: false,
            };
        }

        match last_pass {
            Some((gate, decision)) => GateEvaluation {
                decision,
                deciding_gate: Some(gate),
                gates_short_circuited: 0,
                forced: false,
            },
            None => GateEvaluation::ungated(),
        }
    }
}
