#![forbid(unsafe_code)]

//! Runtime for tickerflow workflow runs.
//!
//! Configuration types and validation live in `tickerflow-core`, persistence in
//! `tickerflow-store`. This crate drives a run: stages in order, symbols in parallel.

pub mod checkpoint;
pub mod context;
pub mod control;
pub mod error;
pub mod executor;
pub mod gate;
pub mod handler;
pub mod retry;

pub use crate::checkpoint::{config_hash, CheckpointManager, CheckpointState, CHECKPOINT_VERSION};
pub use crate::context::{CommandContextProvider, ContextProvider, EmptyContext, StageContext};
pub use crate::control::{ControlRegistry, RunControl};
pub use crate::error::EngineError;
pub use crate::executor::{
    ControlAck, RunSummary, StageOutcome, SymbolOutcome, WorkflowEngine, WorkflowStatusReport,
};
pub use crate::gate::{GateCheck, GateEvaluation, GateEvaluator, GateRegistry, SnapshotThresholdGate};
pub use crate::handler::{
    CommandStageHandler, DefaultErrorClassifier, ErrorClassifier, ErrorKind, HandlerError,
    HandlerRegistry, StageHandler,
};
pub use crate::retry::{decide_retry, DeadLetterReason, RetryConfig, RetryDecision};
