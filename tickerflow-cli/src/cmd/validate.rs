use std::path::Path;

use serde::Serialize;

use crate::cmd::config::load_pipeline;
use crate::exit_codes;
use crate::output::{print_result, OutputFormat};
use crate::OutputArgs;

#[derive(Serialize)]
struct ValidateResult {
    valid: bool,
    workflow_types: Vec<WorkflowTypeSummary>,
    handlers: Vec<String>,
}

#[derive(Serialize)]
struct WorkflowTypeSummary {
    name: String,
    stages: Vec<String>,
}

pub async fn validate_cmd(path: &Path, output: OutputArgs) -> i32 {
    let config = match load_pipeline(path, &output) {
        Ok(c) => c,
        Err(code) => return code,
    };

    let result = ValidateResult {
        valid: true,
        workflow_types: config
            .workflow_types
            .iter()
            .map(|wt| WorkflowTypeSummary {
                name: wt.name.clone(),
                stages: wt.stages.iter().map(|s| s.stage.to_string()).collect(),
            })
            .collect(),
        handlers: config.handlers.keys().map(|s| s.to_string()).collect(),
    };

    if output.format == OutputFormat::Text && !output.quiet {
        println!("Configuration is valid");
        for wt in &result.workflow_types {
            println!("  {}: {}", wt.name, wt.stages.join(" -> "));
        }
    } else {
        print_result(output.format, output.quiet, &result);
    }
    exit_codes::SUCCESS
}
