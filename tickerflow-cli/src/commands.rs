use std::path::PathBuf;

use clap::Subcommand;

use crate::args::*;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Parse and validate a pipeline configuration.
    Validate {
        config: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Create a run and drive it to completion.
    Start {
        config: PathBuf,
        #[arg(long)]
        workflow_type: String,
        #[arg(long = "symbol", value_name = "SYMBOL")]
        symbols: Vec<String>,
        /// One symbol per line; `#` starts a comment.
        #[arg(long)]
        symbols_file: Option<PathBuf>,
        /// Only create the run; drive it later with `resume`.
        #[arg(long)]
        detach: bool,
        #[command(flatten)]
        options: RunOptionsArgs,
        #[command(flatten)]
        events: EventArgs,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Continue a pending, paused or interrupted run.
    Resume {
        workflow_id: String,
        config: PathBuf,
        #[command(flatten)]
        events: EventArgs,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    Pause {
        workflow_id: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    Cancel {
        workflow_id: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    Status {
        workflow_id: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// List recent runs.
    Workflows {
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: i64,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Dead-letter queue.
    Dlq {
        #[command(subcommand)]
        command: DlqCommand,
    },
    Checkpoints {
        workflow_id: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Apply Postgres migrations.
    Migrate {
        #[command(flatten)]
        store: StoreArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Debug, Subcommand)]
pub enum DlqCommand {
    List {
        #[arg(long)]
        resolved: bool,
        #[arg(long, default_value_t = 100)]
        limit: i64,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
    Resolve {
        id: i64,
        #[arg(long = "by")]
        resolved_by: String,
        #[command(flatten)]
        output: OutputArgs,
        #[command(flatten)]
        store: StoreArgs,
    },
}
