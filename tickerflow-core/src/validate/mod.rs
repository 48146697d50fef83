mod rules;
mod validator;

use crate::error::ValidationError;
use crate::types::PipelineConfig;
use validator::Validator;

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for PipelineConfig {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_config(self)
    }
}

pub fn validate_config(config: &PipelineConfig) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    v.validate_config(config);
    v.finish()
}

/// Checks the symbol universe handed to a workflow run.
pub fn validate_symbols(symbols: &[String]) -> Result<(), ValidationError> {
    let mut v = Validator::new();
    rules::symbols::validate_symbols(&mut v, symbols, "symbols");
    v.finish()
}
