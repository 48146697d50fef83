pub(crate) mod config;
pub(crate) mod stage;
pub(crate) mod symbols;
