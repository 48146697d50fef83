pub mod checkpoints;
pub mod config;
pub mod control;
pub mod dlq;
pub mod migrate;
pub mod resume;
pub mod start;
pub mod status;
pub mod validate;
pub mod workflows;
