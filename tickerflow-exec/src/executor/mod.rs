pub mod concurrency;
mod coordinator;
mod engine;
pub mod events;
pub mod http;
pub mod metrics;
mod runner;
mod types;
pub mod webhook;

pub use coordinator::StageCoordinator;
pub use engine::WorkflowEngine;
pub use events::{
    CompositeEventSink, Event, EventSink, NoOpEventSink, StdoutEventSink, StoreEventSink,
};
pub use http::{HttpClient, HttpError, ReqwestHttpClient};
pub use metrics::{MetricsCollector, MetricsEventSink, RunMetrics};
pub use runner::SymbolStageRunner;
pub use types::{ControlAck, RunContext, RunSummary, StageOutcome, SymbolOutcome, WorkflowStatusReport};
pub use webhook::WebhookEventSink;
