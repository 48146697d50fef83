use tickerflow_store::run_migrations;

use crate::cmd::config::{connect_postgres, store_target, StoreTarget};
use crate::exit_codes;
use crate::output::{print_error, OutputFormat};
use crate::{OutputArgs, StoreArgs};

pub async fn migrate_cmd(store: StoreArgs, output: OutputArgs) -> i32 {
    let url = match store_target(&store) {
        Some(StoreTarget::Postgres(url)) => url,
        Some(StoreTarget::Memory) => {
            print_error(output.format, output.quiet, "the memory store has no schema to migrate");
            return exit_codes::VALIDATION_FAILED;
        }
        None => {
            print_error(output.format, output.quiet, "missing database url (use --store or set TICKERFLOW_DATABASE_URL / DATABASE_URL)");
            return exit_codes::RUNTIME_ERROR;
        }
    };
    let pg = match connect_postgres(&url, store.max_connections, &output).await {
        Ok(pg) => pg,
        Err(code) => return code,
    };

    if let Err(e) = run_migrations(pg.pool()).await {
        print_error(output.format, output.quiet, &format!("migration failed: {e}"));
        return exit_codes::RUNTIME_ERROR;
    }

    if output.quiet {
        return exit_codes::SUCCESS;
    }
    match output.format {
        OutputFormat::Text => println!("Migrations applied"),
        OutputFormat::Json => println!("{}", serde_json::json!({ "migrated": true })),
    }
    exit_codes::SUCCESS
}
