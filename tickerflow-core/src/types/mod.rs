mod gate;
mod options;
mod pipeline;
mod stage;
mod status;
mod workflow;

pub use gate::{GateAction, GateDecision, GateId, GateSpec, InsufficientAction};
pub use options::ExecutionOptions;
pub use pipeline::{CommandSpec, PipelineConfig};
pub use stage::StageName;
pub use status::{ControlRequest, StageStatus, SymbolStatus, WorkflowStatus};
pub use workflow::{BackoffSpec, FailurePolicy, StageSpec, WorkflowType};
