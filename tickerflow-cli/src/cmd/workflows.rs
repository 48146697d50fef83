use tickerflow_core::WorkflowStatus;

use crate::cmd::config::{open_store, store_engine};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, StoreArgs};

pub async fn workflows_cmd(status: Option<&str>, limit: i64, output: OutputArgs, store: StoreArgs) -> i32 {
    let status = match status.map(str::parse::<WorkflowStatus>).transpose() {
        Ok(s) => s,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
    };
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };

    let runs = match store_engine(store).list_workflows(status, limit).await {
        Ok(r) => r,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to list workflows: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        if runs.is_empty() {
            println!("No workflows");
        }
        for wf in &runs {
            println!(
                "{}  {:<10} {:<16} symbols={}  created={}",
                wf.id,
                wf.status,
                wf.workflow_type,
                wf.symbols.len(),
                wf.created_at.to_rfc3339(),
            );
        }
    } else {
        print_result(output.format, output.quiet, &runs);
    }
    exit_codes::SUCCESS
}
