use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use tickerflow_core::{CommandSpec, StageName};

use crate::context::StageContext;
use crate::handler::{HandlerError, StageHandler};

const MAX_ERROR_CHARS: usize = 2000;

/// Runs a configured program once per symbol.
///
/// Exit 0 is success and stdout, when it is JSON, becomes the result. Exit codes
/// listed in `transient_exit_codes` (75 by default) and death by signal are
/// retryable; any other exit code is permanent.
pub struct CommandStageHandler {
    spec: CommandSpec,
}

impl CommandStageHandler {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl StageHandler for CommandStageHandler {
    async fn execute(&self, symbol: &str, ctx: &StageContext) -> Result<JsonValue, HandlerError> {
        let snapshot = serde_json::to_string(&ctx.snapshot).unwrap_or_default();
        let extra_env = [
            ("TICKERFLOW_WORKFLOW_ID", ctx.workflow_id.to_string()),
            ("TICKERFLOW_WORKFLOW_TYPE", ctx.workflow_type.clone()),
            ("TICKERFLOW_ATTEMPT", ctx.attempt.to_string()),
            ("TICKERFLOW_FORCE", ctx.options.force.to_string()),
            ("TICKERFLOW_CONTEXT", snapshot),
        ];
        let stdout = run_command(&self.spec, symbol, ctx.stage, &extra_env).await?;
        Ok(parse_stdout(&stdout))
    }
}

pub(crate) async fn run_command(
    spec: &CommandSpec,
    symbol: &str,
    stage: StageName,
    extra_env: &[(&str, String)],
) -> Result<String, HandlerError> {
    let mut cmd = tokio::process::Command::new(&spec.program);
    cmd.args(spec.render_args(symbol, stage))
        .envs(&spec.env)
        .env("TICKERFLOW_SYMBOL", symbol)
        .env("TICKERFLOW_STAGE", stage.as_str())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // a timed-out invocation is dropped; take the child with it
        .kill_on_drop(true);
    for (k, v) in extra_env {
        cmd.env(k, v);
    }

    let output = cmd.output().await.map_err(|e| {
        HandlerError::new("spawn", format!("failed to run '{}': {e}", spec.program))
    })?;

    if output.status.success() {
        return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
    }

    let stderr = truncate(String::from_utf8_lossy(&output.stderr).trim());
    match output.status.code() {
        Some(code) if spec.transient_exit_codes.contains(&code) => Err(HandlerError {
            error_type: format!("exit_{code}"),
            message: stderr,
            retryable: Some(true),
        }),
        Some(code) => Err(HandlerError {
            error_type: format!("exit_{code}"),
            message: stderr,
            retryable: Some(false),
        }),
        None => Err(HandlerError {
            error_type: "signal".to_string(),
            message: format!("'{}' terminated by signal", spec.program),
            retryable: Some(true),
        }),
    }
}

fn parse_stdout(stdout: &str) -> JsonValue {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return JsonValue::Null;
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| JsonValue::String(trimmed.to_string()))
}

fn truncate(s: &str) -> String {
    if s.chars().count() <= MAX_ERROR_CHARS {
        return s.to_string();
    }
    let mut out: String = s.chars().take(MAX_ERROR_CHARS).collect();
    out.push('…');
    out
}
