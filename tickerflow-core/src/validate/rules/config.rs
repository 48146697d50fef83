use std::collections::HashSet;

use crate::types::{PipelineConfig, WorkflowType};
use crate::validate::rules::stage;
use crate::validate::validator::{Validator, NAME_RE};

pub(crate) fn validate_config(v: &mut Validator, config: &PipelineConfig) {
    if config.workflow_types.is_empty() {
        v.push("workflow_types", "must have at least one entry");
    }

    let mut names = HashSet::<&str>::new();
    for (idx, wt) in config.workflow_types.iter().enumerate() {
        let path = format!("workflow_types[{idx}]");
        if !NAME_RE.is_match(&wt.name) {
            v.push(format!("{path}.name"), "must match regex [A-Za-z0-9_\\-]+");
        }
        if !names.insert(wt.name.as_str()) {
            v.push(format!("{path}.name"), "must be unique");
        }
        validate_workflow_type(v, wt, &path);
    }

    for (stage_name, cmd) in &config.handlers {
        if cmd.program.trim().is_empty() {
            v.push(format!("handlers.{stage_name}.program"), "must not be empty");
        }
    }
    if let Some(ctx) = &config.context {
        if ctx.program.trim().is_empty() {
            v.push("context.program", "must not be empty");
        }
    }
}

fn validate_workflow_type(v: &mut Validator, wt: &WorkflowType, path: &str) {
    if wt.stages.is_empty() {
        v.push(format!("{path}.stages"), "must have at least one entry");
    }

    let mut previous = None;
    for (idx, spec) in wt.stages.iter().enumerate() {
        let spath = format!("{path}.stages[{idx}]");
        if let Some(prev) = previous {
            if spec.stage == prev {
                v.push(format!("{spath}.stage"), "must be unique within the workflow type");
            } else if spec.stage < prev {
                v.push(
                    format!("{spath}.stage"),
                    format!("'{}' must come before '{}' (stages follow the fixed pipeline order)", spec.stage, prev),
                );
            }
        }
        previous = Some(spec.stage);
        stage::validate_stage(v, spec, &spath);
    }

    if wt.concurrency == 0 {
        v.push(format!("{path}.concurrency"), "must be at least 1");
    }
    for (stage_name, limit) in &wt.stage_concurrency {
        if *limit == 0 {
            v.push(format!("{path}.stage_concurrency.{stage_name}"), "must be at least 1");
        }
        if wt.stage(*stage_name).is_none() {
            v.push(
                format!("{path}.stage_concurrency.{stage_name}"),
                "refers to a stage not configured for this workflow type",
            );
        }
    }

    if wt.handler_timeout_ms == 0 {
        v.push(format!("{path}.handler_timeout_ms"), "must be greater than 0");
    }
    if wt.control_poll_ms == 0 {
        v.push(format!("{path}.control_poll_ms"), "must be greater than 0");
    }
    if wt.backoff.factor.is_nan() || wt.backoff.factor < 1.0 {
        v.push(format!("{path}.backoff.factor"), "must be >= 1.0");
    }
    if wt.backoff.base_ms > wt.backoff.max_ms {
        v.push(format!("{path}.backoff.base_ms"), "must not exceed backoff.max_ms");
    }
}
