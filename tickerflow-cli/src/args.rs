use clap::Args;

use crate::output::OutputFormat;

#[derive(Debug, Args, Clone)]
pub struct OutputArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    pub format: OutputFormat,
    #[arg(long, short, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct StoreArgs {
    /// Postgres URL, or `memory` for a throwaway in-process store.
    #[arg(long)]
    pub store: Option<String>,
    #[arg(long, default_value_t = 5)]
    pub max_connections: u32,
}

#[derive(Debug, Args, Clone)]
pub struct RunOptionsArgs {
    /// Treat SKIP/DEFER gate decisions as PASS.
    #[arg(long)]
    pub force: bool,
    #[arg(long)]
    pub max_retries: Option<u32>,
    /// Per-invocation handler timeout.
    #[arg(long)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct EventArgs {
    /// Print every engine event as a JSON line on stdout.
    #[arg(long)]
    pub events: bool,
    #[arg(long)]
    pub webhook_url: Option<String>,
}
