mod config;
mod decision;

pub use config::RetryConfig;
pub use decision::{decide_retry, DeadLetterReason, RetryDecision};
