mod classify;
pub(crate) mod command;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use tickerflow_core::{PipelineConfig, StageName};

use crate::context::StageContext;

pub use classify::{DefaultErrorClassifier, ErrorClassifier, ErrorKind};
pub use command::CommandStageHandler;

/// Processes one symbol for one stage. Must be idempotent: a unit can be re-run
/// after a crash or a transient failure.
#[async_trait]
pub trait StageHandler: Send + Sync {
    async fn execute(&self, symbol: &str, ctx: &StageContext) -> Result<JsonValue, HandlerError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{error_type}: {message}")]
pub struct HandlerError {
    pub error_type: String,
    pub message: String,
    /// Explicit hint from the handler; wins over pattern classification.
    pub retryable: Option<bool>,
}

impl HandlerError {
    pub const TIMEOUT: &'static str = "timeout";

    pub fn new(error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error_type: error_type.into(),
            message: message.into(),
            retryable: None,
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            retryable: Some(true),
            ..Self::new("transient", message)
        }
    }

    pub fn permanent(message: impl Into<String>) -> Self {
        Self {
            retryable: Some(false),
            ..Self::new("permanent", message)
        }
    }

    pub fn timeout(after: Duration) -> Self {
        Self::new(
            Self::TIMEOUT,
            format!("handler timed out after {}ms", after.as_millis()),
        )
    }

    pub fn is_timeout(&self) -> bool {
        self.error_type == Self::TIMEOUT
    }
}

#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<StageName, Arc<dyn StageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`CommandStageHandler`] per configured `handlers` entry.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let mut registry = Self::new();
        for (stage, spec) in &config.handlers {
            registry.register(*stage, Arc::new(CommandStageHandler::new(spec.clone())));
        }
        registry
    }

    pub fn register(&mut self, stage: StageName, handler: Arc<dyn StageHandler>) -> &mut Self {
        self.handlers.insert(stage, handler);
        self
    }

    pub fn with(mut self, stage: StageName, handler: Arc<dyn StageHandler>) -> Self {
        self.register(stage, handler);
        self
    }

    pub fn get(&self, stage: StageName) -> Option<Arc<dyn StageHandler>> {
        self.handlers.get(&stage).cloned()
    }

    pub fn contains(&self, stage: StageName) -> bool {
        self.handlers.contains_key(&stage)
    }
}
