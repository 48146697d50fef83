use std::collections::BTreeMap;
use std::time::Duration;

use crate::types::{GateSpec, StageName};

/// One workflow type: the ordered stage list plus the knobs the engine applies to every run
/// of that type.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WorkflowType {
    pub name: String,

    pub stages: Vec<StageSpec>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Retries taken back-to-back before the unit is parked as `retrying`.
    #[serde(default = "default_immediate_retries")]
    pub immediate_retries: u32,

    #[serde(default = "default_handler_timeout_ms")]
    pub handler_timeout_ms: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stage_concurrency: BTreeMap<StageName, usize>,

    #[serde(default = "default_max_deferred_passes")]
    pub max_deferred_passes: u32,

    /// Pause before a pass that only contains deferred symbols.
    #[serde(default)]
    pub defer_delay_ms: u64,

    #[serde(default)]
    pub backoff: BackoffSpec,

    /// How often a running stage polls the store for cross-process pause/cancel requests.
    #[serde(default = "default_control_poll_ms")]
    pub control_poll_ms: u64,
}

impl WorkflowType {
    /// A workflow type with default limits; mostly useful when building configs in code.
    pub fn new(name: impl Into<String>, stages: Vec<StageSpec>) -> Self {
        Self {
            name: name.into(),
            stages,
            max_retries: default_max_retries(),
            immediate_retries: default_immediate_retries(),
            handler_timeout_ms: default_handler_timeout_ms(),
            concurrency: default_concurrency(),
            stage_concurrency: BTreeMap::new(),
            max_deferred_passes: default_max_deferred_passes(),
            defer_delay_ms: 0,
            backoff: BackoffSpec::default(),
            control_poll_ms: default_control_poll_ms(),
        }
    }

    pub fn stage(&self, name: StageName) -> Option<&StageSpec> {
        self.stages.iter().find(|s| s.stage == name)
    }

    pub fn stage_index(&self, name: StageName) -> Option<usize> {
        self.stages.iter().position(|s| s.stage == name)
    }

    pub fn stage_names(&self) -> Vec<StageName> {
        self.stages.iter().map(|s| s.stage).collect()
    }

    pub fn handler_timeout(&self) -> Duration {
        Duration::from_millis(self.handler_timeout_ms)
    }

    pub fn defer_delay(&self) -> Duration {
        Duration::from_millis(self.defer_delay_ms)
    }

    pub fn control_poll_interval(&self) -> Duration {
        Duration::from_millis(self.control_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct StageSpec {
    pub stage: StageName,

    #[serde(default = "default_true")]
    pub required: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<GateSpec>,

    #[serde(default)]
    pub failure_policy: FailurePolicy,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl StageSpec {
    pub fn new(stage: StageName, required: bool) -> Self {
        Self {
            stage,
            required,
            gates: Vec::new(),
            failure_policy: FailurePolicy::default(),
            enabled: true,
        }
    }

    pub fn with_gate(mut self, gate: GateSpec) -> Self {
        self.gates.push(gate);
        self
    }
}

/// When a stage counts as failed, based on its dead-lettered symbols.
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailurePolicy {
    #[default]
    AnyDeadLetter,
    DeadLetterRatio { max_ratio: f64 },
}

impl FailurePolicy {
    /// `total` is the number of symbols the stage was asked to process.
    pub fn is_exceeded(&self, dead_lettered: u64, total: u64) -> bool {
        match self {
            FailurePolicy::AnyDeadLetter => dead_lettered > 0,
            FailurePolicy::DeadLetterRatio { max_ratio } => {
                total > 0 && (dead_lettered as f64 / total as f64) > *max_ratio
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BackoffSpec {
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    #[serde(default = "default_factor")]
    pub factor: f64,
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for BackoffSpec {
    fn default() -> Self {
        Self {
            base_ms: default_base_ms(),
            factor: default_factor(),
            max_ms: default_max_ms(),
            jitter: true,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

fn default_immediate_retries() -> u32 {
    1
}

fn default_handler_timeout_ms() -> u64 {
    30_000
}

fn default_concurrency() -> usize {
    8
}

fn default_max_deferred_passes() -> u32 {
    1
}

fn default_control_poll_ms() -> u64 {
    500
}

fn default_base_ms() -> u64 {
    1_000
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_ms() -> u64 {
    60_000
}
