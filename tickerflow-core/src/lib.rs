#![forbid(unsafe_code)]

pub mod error;
pub mod parser;
pub mod types;
pub mod validate;

pub use crate::error::{ConfigError, ParseEnumError, ParseError, ValidationError, Violation};
pub use crate::parser::{parse_config_str, ConfigFormat, ParsedConfig};
pub use crate::types::{
    BackoffSpec, CommandSpec, ControlRequest, ExecutionOptions, FailurePolicy, GateAction,
    GateDecision, GateId, GateSpec, InsufficientAction, PipelineConfig, StageName, StageSpec,
    StageStatus, SymbolStatus, WorkflowStatus, WorkflowType,
};
pub use crate::validate::{validate_config, validate_symbols, Validate};
