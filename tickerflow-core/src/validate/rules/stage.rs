use std::collections::HashSet;

use crate::types::{FailurePolicy, StageSpec};
use crate::validate::validator::Validator;

pub(crate) fn validate_stage(v: &mut Validator, spec: &StageSpec, path: &str) {
    if let FailurePolicy::DeadLetterRatio { max_ratio } = spec.failure_policy {
        if !(0.0..1.0).contains(&max_ratio) {
            v.push(
                format!("{path}.failure_policy.max_ratio"),
                "must be in the range [0.0, 1.0)",
            );
        }
    }

    let mut seen = HashSet::new();
    for (idx, gate) in spec.gates.iter().enumerate() {
        if !seen.insert(gate.gate) {
            v.push(
                format!("{path}.gates[{idx}].gate"),
                format!("'{}' is listed more than once", gate.gate),
            );
        }
    }
}
