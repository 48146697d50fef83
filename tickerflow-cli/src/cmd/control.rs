use serde::Serialize;

use tickerflow_exec::ControlAck;

use crate::cmd::config::{open_store, store_engine};
use crate::exit_codes;
use crate::output::{print_error, print_result, OutputFormat};
use crate::utils::parse_workflow_id;
use crate::{OutputArgs, StoreArgs};

#[derive(Serialize)]
struct ControlResult {
    workflow_id: String,
    action: &'static str,
    ack: ControlAck,
}

#[derive(Clone, Copy)]
enum Action {
    Pause,
    Cancel,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Action::Pause => "pause",
            Action::Cancel => "cancel",
        }
    }

    fn applied(self) -> &'static str {
        match self {
            Action::Pause => "paused",
            Action::Cancel => "cancelled",
        }
    }
}

pub async fn pause_cmd(workflow_id: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    control_cmd(Action::Pause, workflow_id, output, store).await
}

pub async fn cancel_cmd(workflow_id: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    control_cmd(Action::Cancel, workflow_id, output, store).await
}

async fn control_cmd(action: Action, workflow_id: &str, output: OutputArgs, store: StoreArgs) -> i32 {
    let id = match parse_workflow_id(workflow_id, &output) {
        Ok(id) => id,
        Err(code) => return code,
    };
    let store = match open_store(&store, &output).await {
        Ok(s) => s,
        Err(code) => return code,
    };
    let engine = store_engine(store);

    let res = match action {
        Action::Pause => engine.pause(id).await,
        Action::Cancel => engine.cancel(id).await,
    };
    let ack = match res {
        Ok(ack) => ack,
        Err(e) => {
            print_error(output.format, output.quiet, &e.to_string());
            return exit_codes::RUNTIME_ERROR;
        }
    };

    if output.format == OutputFormat::Text && !output.quiet {
        match ack {
            ControlAck::Requested => println!("{} requested for workflow {id}; the running process will stop at its next check", action.as_str()),
            ControlAck::Applied => println!("Workflow {id} {}", action.applied()),
            ControlAck::Unchanged => println!("Workflow {id} already paused"),
            ControlAck::Signalled => println!("Workflow {id} signalled to {}", action.as_str()),
        }
    } else {
        print_result(
            output.format,
            output.quiet,
            &ControlResult {
                workflow_id: id.to_string(),
                action: action.as_str(),
                ack,
            },
        );
    }
    exit_codes::SUCCESS
}
