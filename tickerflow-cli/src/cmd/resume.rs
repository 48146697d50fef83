use std::path::Path;
use std::sync::Arc;

use tickerflow_exec::executor::MetricsCollector;

use crate::cmd::config::{build_engine, build_event_sink, engine_exit_code, load_pipeline, open_store};
use crate::cmd::start::report_summary;
use crate::output::print_error;
use crate::utils::parse_workflow_id;
use crate::{EventArgs, OutputArgs, StoreArgs};

pub async fn resume_cmd(
    workflow_id: &str,
    config_path: &Path,
    events: EventArgs,
    output: OutputArgs,
    store: StoreArgs,
) -> i32 {
    let id = match parse_workflow_id(workflow_id, &output) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let config = match load_pipeline(config_path, &output) {
        Ok(c) => c,
        Err(code) => return code,
    };
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let sink = match build_event_sink(store.clone(), &events, Arc::new(MetricsCollector::new()), &output) {
        Ok(s) => s,
        Err(code) => return code,
    };
    let engine = build_engine(config, store, sink);

    match engine.resume(id).await {
        Ok(summary) => report_summary(&summary, &output),
        Err(e) => {
            print_error(output.format, output.quiet, &format!("failed to resume workflow {id}: {e}"));
            engine_exit_code(&e)
        }
    }
}
