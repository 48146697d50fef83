use std::collections::BTreeMap;

use crate::error::ConfigError;
use crate::types::{StageName, WorkflowType};

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineConfig {
    pub workflow_types: Vec<WorkflowType>,

    /// Process-backed stage handlers used by the CLI.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub handlers: BTreeMap<StageName, CommandSpec>,

    /// Process that prints the JSON context snapshot for `{symbol}` / `{stage}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CommandSpec>,
}

impl PipelineConfig {
    pub fn workflow_type(&self, name: &str) -> Result<&WorkflowType, ConfigError> {
        self.workflow_types
            .iter()
            .find(|w| w.name == name)
            .ok_or_else(|| ConfigError::UnknownWorkflowType(name.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CommandSpec {
    pub program: String,

    /// `{symbol}` and `{stage}` are substituted per invocation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default = "default_transient_exit_codes")]
    pub transient_exit_codes: Vec<i32>,
}

impl CommandSpec {
    pub fn render_args(&self, symbol: &str, stage: StageName) -> Vec<String> {
        self.args
            .iter()
            .map(|a| a.replace("{symbol}", symbol).replace("{stage}", stage.as_str()))
            .collect()
    }
}

/// EX_TEMPFAIL from sysexits.h.
fn default_transient_exit_codes() -> Vec<i32> {
    vec![75]
}
