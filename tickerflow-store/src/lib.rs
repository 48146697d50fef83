#![forbid(unsafe_code)]

pub mod memory;
pub mod postgres;
pub mod store;

pub use crate::memory::MemoryStore;
pub use crate::postgres::run_migrations;
pub use crate::postgres::PostgresStore;
pub use crate::store::{
    Checkpoint, CounterDelta, DlqEntry, GateResult, NewCheckpoint, NewDlqEntry, NewEvent,
    NewGateResult, NewWorkflowExecution, StageCounters, StageExecution, StateStore, StoreError,
    SymbolState, SymbolStateUpdate, WorkflowEvent, WorkflowExecution,
};
