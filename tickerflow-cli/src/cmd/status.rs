use tickerflow_exec::EngineError;

use crate::cmd::config::{open_store, store_engine};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::utils::parse_workflow_id;
use crate::{OutputArgs, StoreArgs};

pub async fn status_cmd(workflow_id: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    let id = match parse_workflow_id(workflow_id, &output) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let report = match store_engine(store).get_status(id).await {
        Ok(r) => r,
        Err(EngineError::WorkflowNotFound(_)) => {
            print_error(output.format, output.quiet, &format!("workflow {id} not found"));
            return exit_codes::RUNTIME_ERROR;
        }
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to load workflow {id}: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        let wf = &report.workflow;
        println!("Workflow: {}", wf.id);
        println!("Type: {}", wf.workflow_type);
        println!("Status: {}", wf.status);
        if let Some(stage) = &wf.current_stage {
            println!("Current stage: {stage}");
        }
        if let Some(req) = &wf.control_request {
            println!("Pending request: {req}");
        }
        println!("Symbols: {}", wf.symbols.len());
        for stage in &report.stages {
            println!(
                "  {:<10} {:<9} processed={} succeeded={} failed={} skipped={} retries={}",
                stage.stage_name,
                stage.status,
                stage.symbols_processed,
                stage.symbols_succeeded,
                stage.symbols_failed,
                stage.symbols_skipped,
                stage.retry_count,
            );
        }
        if report.open_dlq_entries > 0 {
            println!("Open DLQ entries: {}", report.open_dlq_entries);
        }
        if let Some(err) = &wf.error_message {
            println!("Error: {err}");
        }
    } else {
        print_result(output.format, output.quiet, &report);
    }
    exit_codes::SUCCESS
}
