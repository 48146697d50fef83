mod evaluator;
mod snapshot;

use std::collections::HashMap;
use std::sync::Arc;

use tickerflow_core::{GateDecision, GateId, GateSpec};

use crate::context::StageContext;

pub use evaluator::{GateEvaluation, GateEvaluator};
pub use snapshot::SnapshotThresholdGate;

/// A precondition for running a stage handler on one symbol.
pub trait GateCheck: Send + Sync {
    fn check(&self, symbol: &str, spec: &GateSpec, ctx: &StageContext) -> GateDecision;
}

/// Maps every [`GateId`] to its check. Starts with the snapshot threshold
/// checks; `register` replaces one.
#[derive(Clone)]
pub struct GateRegistry {
    checks: HashMap<GateId, Arc<dyn GateCheck>>,
}

impl Default for GateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl GateRegistry {
    pub fn new() -> Self {
        let checks = GateId::ALL
            .iter()
            .map(|id| (*id, Arc::new(SnapshotThresholdGate::new(*id)) as Arc<dyn GateCheck>))
            .collect();
        Self { checks }
    }

    pub fn register(&mut self, gate: GateId, check: Arc<dyn GateCheck>) -> &mut Self {
        self.checks.insert(gate, check);
        self
    }

    pub fn get(&self, gate: GateId) -> Arc<dyn GateCheck> {
        self.checks
            .get(&gate)
            .cloned()
            .unwrap_or_else(|| Arc::new(SnapshotThresholdGate::new(gate)))
    }
}
