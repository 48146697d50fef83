use tickerflow_store::StateStore;

use crate::cmd::config::open_store;
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::utils::parse_workflow_id;
use crate::{OutputArgs, StoreArgs};

pub async fn checkpoints_cmd(workflow_id: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    let id = match parse_workflow_id(workflow_id, &output) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let checkpoints = match store.list_checkpoints(id).await {
        Ok(c) => c,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to list checkpoints for {id}: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        if checkpoints.is_empty() {
            println!("No checkpoints for workflow {id}");
        }
        for cp in &checkpoints {
            println!("#{:<6} {:<10} {}  {}", cp.id, cp.stage, cp.created_at.to_rfc3339(), cp.state);
        }
    } else {
        print_result(output.format, output.quiet, &checkpoints);
    }
    exit_codes::SUCCESS
}
