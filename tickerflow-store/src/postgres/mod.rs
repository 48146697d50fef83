mod audit;
mod dlq;
mod migrate;
mod stages;
mod store;
mod symbols;
mod workflows;

pub use migrate::run_migrations;
pub use store::PostgresStore;
