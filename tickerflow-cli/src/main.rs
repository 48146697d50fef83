use clap::Parser;
use tracing_subscriber::EnvFilter;

mod args;
mod cmd;
mod commands;
mod exit_codes;
mod output;
mod utils;

pub use args::*;
use commands::{Command, DlqCommand};

#[derive(Debug, Parser)]
#[command(name = "tickerflow", version, about = "Staged workflow runs over financial symbols")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("error: failed to create tokio runtime: {e}");
            std::process::exit(exit_codes::RUNTIME_ERROR);
        }
    };

    let exit_code = rt.block_on(run_command(cli.command));
    std::process::exit(exit_code);
}

/// Logs go to stderr so `--format json` output on stdout stays parseable.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("TICKERFLOW_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run_command(command: Command) -> i32 {
    match command {
        Command::Validate { config, output } => cmd::validate::validate_cmd(&config, output).await,
        Command::Start {
            config,
            workflow_type,
            symbols,
            symbols_file,
            detach,
            options,
            events,
            output,
            store,
        } => {
            cmd::start::start_cmd(
                &config,
                &workflow_type,
                symbols,
                symbols_file.as_deref(),
                detach,
                options,
                events,
                output,
                store,
            )
            .await
        }
        Command::Resume {
            workflow_id,
            config,
            events,
            output,
            store,
        } => cmd::resume::resume_cmd(&workflow_id, &config, events, output, store).await,
        Command::Pause {
            workflow_id,
            output,
            store,
        } => cmd::control::pause_cmd(&workflow_id, output, store).await,
        Command::Cancel {
            workflow_id,
            output,
            store,
        } => cmd::control::cancel_cmd(&workflow_id, output, store).await,
        Command::Status {
            workflow_id,
            output,
            store,
        } => cmd::status::status_cmd(&workflow_id, output, store).await,
        Command::Workflows {
            status,
            limit,
            output,
            store,
        } => cmd::workflows::workflows_cmd(status.as_deref(), limit, output, store).await,
        Command::Dlq { command } => match command {
            DlqCommand::List {
                resolved,
                limit,
                output,
                store,
            } => cmd::dlq::dlq_list_cmd(resolved, limit, output, store).await,
            DlqCommand::Resolve {
                id,
                resolved_by,
                output,
                store,
            } => cmd::dlq::dlq_resolve_cmd(id, &resolved_by, output, store).await,
        },
        Command::Checkpoints {
            workflow_id,
            output,
            store,
        } => cmd::checkpoints::checkpoints_cmd(&workflow_id, output, store).await,
        Command::Migrate { store, output } => cmd::migrate::migrate_cmd(store, output).await,
    }
}
