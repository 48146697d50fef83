use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use tickerflow_core::{ExecutionOptions, WorkflowStatus};
use tickerflow_exec::executor::MetricsCollector;
use tickerflow_exec::RunSummary;

use crate::cmd::config::{
    build_engine, build_event_sink, engine_exit_code, load_pipeline, open_store, read_symbols_file,
};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{EventArgs, OutputArgs, RunOptionsArgs, StoreArgs};

#[derive(Serialize)]
struct CreatedResult {
    workflow_id: String,
    status: String,
}

#[allow(clippy::too_many_arguments)]
pub async fn start_cmd(
    config_path: &Path,
    workflow_type: &str,
    mut symbols: Vec<String>,
    symbols_file: Option<&Path>,
    detach: bool,
    options: RunOptionsArgs,
    events: EventArgs,
    output: OutputArgs,
    store: StoreArgs,
) -> i32 {
    let config = match load_pipeline(config_path, &output) {
        Ok(c) => c,
        Err(code) => return code,
    };
    if let Some(path) = symbols_file {
        match read_symbols_file(path, &output) {
            Ok(extra) => symbols.extend(extra),
            Err(code) => return code,
        }
    }

    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let metrics = Arc::new(MetricsCollector::new());
    let sink = match build_event_sink(store.clone(), &events, metrics.clone(), &output) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let engine = build_engine(config, store, sink);

    let run_options = ExecutionOptions {
        force: options.force,
        max_retries: options.max_retries,
        timeout_ms: options.timeout_ms,
    };

    let workflow_id = match engine.create(workflow_type, symbols, run_options).await {
        Ok(id) => id,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return engine_exit_code(&e);
        }
    };

    if detach {
        let result = CreatedResult {
            workflow_id: workflow_id.to_string(),
            status: WorkflowStatus::Pending.to_string(),
        };
        if output.format == OutputFormat::Text && !output.quiet {
            println!("Created workflow {workflow_id} (pending)");
        } else {
            print_result(output.format, output.quiet, &result);
        }
        return exit_codes::SUCCESS;
    }

    match engine.run(workflow_id).await {
        Ok(summary) => {
            let run_metrics = metrics.get_metrics().await;
            tracing::debug!(metrics = %run_metrics.to_json(), "run metrics");
            report_summary(&summary, &output)
        }
        Err(e) => {
            print_error(output.format, output.quiet, &format!("workflow {workflow_id} failed: {e}"));
            engine_exit_code(&e)
        }
    }
}

/// Prints a run summary and maps its final status onto an exit code.
pub fn report_summary(summary: &RunSummary, output: &OutputArgs) -> i32 {
    if output.format == OutputFormat::Text && !output.quiet {
        println!("Workflow {}: {}", summary.workflow_id, summary.status);
        for stage in &summary.stages {
            println!(
                "  {:<10} {:<9} processed={} succeeded={} failed={} skipped={} passes={}",
                stage.stage.as_str(),
                stage.status.as_str(),
                stage.counters.processed,
                stage.counters.succeeded,
                stage.counters.failed,
                stage.counters.skipped,
                stage.passes,
            );
        }
        if let Some(err) = &summary.error_message {
            println!("Error: {err}");
        }
    } else {
        print_result(output.format, output.quiet, summary);
    }

    match summary.status {
        WorkflowStatus::Failed | WorkflowStatus::Cancelled => exit_codes::RUN_FAILED,
        _ => exit_codes::SUCCESS,
    }
}
