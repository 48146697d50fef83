use std::time::Duration;

use tickerflow_core::{ExecutionOptions, WorkflowType};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Leading retries that re-run the handler right away instead of backing off.
    pub immediate_retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            immediate_retries: 1,
            base_delay: Duration::from_millis(1000),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn for_run(workflow_type: &WorkflowType, options: &ExecutionOptions) -> Self {
        let backoff = &workflow_type.backoff;
        Self {
            max_retries: options.max_retries_for(workflow_type),
            immediate_retries: workflow_type.immediate_retries,
            base_delay: Duration::from_millis(backoff.base_ms),
            factor: backoff.factor,
            max_delay: Duration::from_millis(backoff.max_ms),
            jitter: backoff.jitter,
        }
    }
}
