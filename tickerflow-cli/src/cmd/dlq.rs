use tickerflow_exec::EngineError;

use crate::cmd::config::{open_store, store_engine};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::{OutputArgs, StoreArgs};

pub async fn dlq_list_cmd(resolved: bool, limit: i64, output: OutputArgs, store: StoreArgs) -> i32 {
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let entries = match store_engine(store).list_dlq(resolved, limit).await {
        Ok(e) => e,
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to list dlq: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        if entries.is_empty() {
            println!("No {} entries", if resolved { "resolved" } else { "open" });
        }
        for entry in &entries {
            println!(
                "#{:<6} {} {:<8} {:<10} retries={} [{}] {}",
                entry.id,
                entry.workflow_id,
                entry.symbol,
                entry.stage,
                entry.retry_count,
                entry.error_type,
                entry.error_message,
            );
        }
    } else {
        print_result(output.format, output.quiet, &entries);
    }
    exit_codes::SUCCESS
}

pub async fn dlq_resolve_cmd(id: i64, resolved_by: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let entry = match store_engine(store).resolve_dlq(id, resolved_by).await {
        Ok(e) => e,
        Err(e @ (EngineError::DlqEntryNotFound(_) | EngineError::DlqEntryAlreadyResolved(_))) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::VALIDATION_FAILED;
        }
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to resolve dlq entry {id}: {e}"));
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        println!("Resolved DLQ entry #{} ({} {}) by {resolved_by}", entry.id, entry.symbol, entry.stage);
    } else {
        print_result(output.format, output.quiet, &entry);
    }
    exit_codes::SUCCESS
}
