use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use uuid::Uuid;

use tickerflow_core::{CommandSpec, ExecutionOptions, StageName};

use crate::handler::command::run_command;
use crate::handler::HandlerError;

/// Everything a gate or handler sees for one unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct StageContext {
    pub workflow_id: Uuid,
    pub workflow_type: String,
    pub stage: StageName,
    pub options: ExecutionOptions,
    /// Read-only data snapshot from the [`ContextProvider`], e.g. `{"daily_bars": 250}`.
    pub snapshot: JsonValue,
    /// 1-based handler invocation number for this unit.
    pub attempt: u32,
}

/// Supplies the data snapshot that gates are evaluated against.
///
/// Called before every pass over a symbol, so a deferred gate can observe data
/// that arrived after its first evaluation.
#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn snapshot(
        &self,
        workflow_id: Uuid,
        symbol: &str,
        stage: StageName,
    ) -> Result<JsonValue, HandlerError>;
}

pub struct EmptyContext;

#[async_trait]
impl ContextProvider for EmptyContext {
    async fn snapshot(&self, _: Uuid, _: &str, _: StageName) -> Result<JsonValue, HandlerError> {
        Ok(json!({}))
    }
}

/// Runs a program that prints the snapshot as a JSON object on stdout.
pub struct CommandContextProvider {
    spec: CommandSpec,
}

impl CommandContextProvider {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl ContextProvider for CommandContextProvider {
    async fn snapshot(
        &self,
        workflow_id: Uuid,
        symbol: &str,
        stage: StageName,
    ) -> Result<JsonValue, HandlerError> {
        let extra_env = [("TICKERFLOW_WORKFLOW_ID", workflow_id.to_string())];
        let stdout = run_command(&self.spec, symbol, stage, &extra_env).await?;
        match serde_json::from_str::<JsonValue>(stdout.trim()) {
            Ok(v @ JsonValue::Object(_)) => Ok(v),
            Ok(_) => Err(HandlerError::permanent("context command must print a JSON object")),
            Err(e) => Err(HandlerError::permanent(format!("context command printed invalid JSON: {e}"))),
        }
    }
}
