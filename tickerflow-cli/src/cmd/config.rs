use std::path::Path;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use tickerflow_core::{parse_config_str, validate_config, ConfigFormat, PipelineConfig};
use tickerflow_exec::executor::{
    CompositeEventSink, EventSink, MetricsCollector, MetricsEventSink, ReqwestHttpClient,
    StdoutEventSink, StoreEventSink, WebhookEventSink,
};
use tickerflow_exec::{
    CommandContextProvider, ContextProvider, EmptyContext, EngineError, HandlerRegistry,
    WorkflowEngine,
};
use tickerflow_store::{MemoryStore, PostgresStore, StateStore};

use crate::exit_codes;
use crate::output::print_error;
use crate::utils::redact_url_password;
use crate::{EventArgs, OutputArgs, StoreArgs};

pub const MEMORY_STORE: &str = "memory";

pub enum StoreTarget {
    Memory,
    Postgres(SecretString),
}

pub fn store_target(store: &StoreArgs) -> Option<StoreTarget> {
    let raw = store
        .store
        .clone()
        .or_else(|| std::env::var("TICKERFLOW_DATABASE_URL").ok())
        .or_else(|| std::env::var("DATABASE_URL").ok())?;
    if raw == MEMORY_STORE {
        return Some(StoreTarget::Memory);
    }
    Some(StoreTarget::Postgres(SecretString::from(raw)))
}

pub async fn connect_postgres(url: &SecretString, max_connections: u32, output: &OutputArgs) -> Result<PostgresStore, i32> {
    PostgresStore::connect(url.expose_secret(), max_connections)
        .await
        .map_err(|e| {
            let safe_url = redact_url_password(url.expose_secret());
            print_error(
                output.format,
                output.quiet,
                &format!("database connection failed to {safe_url}: {e}. Check your database URL and ensure Postgres is running."),
            );
            exit_codes::RUNTIME_ERROR
        })
}

pub async fn open_store(store: &StoreArgs, output: &OutputArgs) -> Result<Arc<dyn StateStore>, i32> {
    match store_target(store) {
        Some(StoreTarget::Memory) => Ok(Arc::new(MemoryStore::new())),
        Some(StoreTarget::Postgres(url)) => {
            let pg = connect_postgres(&url, store.max_connections, output).await?;
            Ok(Arc::new(pg))
        }
        None => {
            print_error(
                output.format,
                output.quiet,
                "missing database url (use --store or set TICKERFLOW_DATABASE_URL / DATABASE_URL)",
            );
            Err(exit_codes::RUNTIME_ERROR)
        }
    }
}

/// Reads, parses and validates a pipeline configuration.
pub fn load_pipeline(path: &Path, output: &OutputArgs) -> Result<PipelineConfig, i32> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        print_error(output.format, output.quiet, &format!("failed to read {}: {e}", path.display()));
        exit_codes::RUNTIME_ERROR
    })?;
    let parsed = parse_config_str(&content, ConfigFormat::Auto).map_err(|e| {
        print_error(output.format, output.quiet, &e.to_string());
        exit_codes::VALIDATION_FAILED
    })?;
    if let Err(err) = validate_config(&parsed.config) {
        let details: Vec<String> = err.violations.iter().map(|v| v.to_string()).collect();
        print_error(
            output.format,
            output.quiet,
            &format!("invalid configuration: {}", details.join("; ")),
        );
        return Err(exit_codes::VALIDATION_FAILED);
    }
    Ok(parsed.config)
}

/// Persisted event log, plus stdout and webhook delivery when asked for.
pub fn build_event_sink(
    store: Arc<dyn StateStore>,
    events: &EventArgs,
    metrics: Arc<MetricsCollector>,
    output: &OutputArgs,
) -> Result<Arc<dyn EventSink>, i32> {
    let mut composite = CompositeEventSink::new();
    composite.add(Arc::new(StoreEventSink::new(store)));
    if events.events {
        composite.add(Arc::new(StdoutEventSink));
    }
    let mut sink: Arc<dyn EventSink> = Arc::new(MetricsEventSink::new(metrics, Arc::new(composite)));

    if let Some(raw) = &events.webhook_url {
        let url = Url::parse(raw).map_err(|e| {
            print_error(output.format, output.quiet, &format!("invalid webhook url: {e}"));
            exit_codes::RUNTIME_ERROR
        })?;
        let http = ReqwestHttpClient::new().map_err(|e| {
            print_error(output.format, output.quiet, &e.to_string());
            exit_codes::RUNTIME_ERROR
        })?;
        sink = Arc::new(WebhookEventSink::new(url, Arc::new(http), sink));
    }
    Ok(sink)
}

pub fn build_engine(
    config: PipelineConfig,
    store: Arc<dyn StateStore>,
    event_sink: Arc<dyn EventSink>,
) -> WorkflowEngine {
    let handlers = HandlerRegistry::from_config(&config);
    let context: Arc<dyn ContextProvider> = match &config.context {
        Some(spec) => Arc::new(CommandContextProvider::new(spec.clone())),
        None => Arc::new(EmptyContext),
    };
    WorkflowEngine::new(Arc::new(config), Arc::new(handlers), store, event_sink)
        .with_context_provider(context)
}

pub fn engine_exit_code(err: &EngineError) -> i32 {
    match err {
        EngineError::Config(_) | EngineError::Validation(_) | EngineError::MissingHandler(_) => {
            exit_codes::VALIDATION_FAILED
        }
        _ => exit_codes::RUNTIME_ERROR,
    }
}

/// Engine for commands that only act on persisted runs (pause, cancel, status, dlq).
pub fn store_engine(store: Arc<dyn StateStore>) -> WorkflowEngine {
    let sink: Arc<dyn EventSink> = Arc::new(StoreEventSink::new(store.clone()));
    WorkflowEngine::new(
        Arc::new(PipelineConfig::default()),
        Arc::new(HandlerRegistry::new()),
        store,
        sink,
    )
}

/// Reads `--symbols-file`: one symbol per line, blank lines and `#` comments ignored.
pub fn read_symbols_file(path: &Path, output: &OutputArgs) -> Result<Vec<String>, i32> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        print_error(output.format, output.quiet, &format!("failed to read {}: {e}", path.display()));
        exit_codes::RUNTIME_ERROR
    })?;
    Ok(content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
