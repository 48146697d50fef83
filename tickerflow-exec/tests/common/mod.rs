#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tokio::sync::{Notify, Semaphore};
use uuid::Uuid;

use tickerflow_core::{BackoffSpec, PipelineConfig, StageName, StageSpec, WorkflowType};
use tickerflow_exec::executor::NoOpEventSink;
use tickerflow_exec::{
    ContextProvider, HandlerError, HandlerRegistry, StageContext, StageHandler, WorkflowEngine,
};
use tickerflow_store::{MemoryStore, StateStore};

pub const AAPL: &str = "AAPL";
pub const MSFT: &str = "MSFT";

pub fn symbols(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// A workflow type with millisecond backoff so retry paths finish quickly.
pub fn fast_type(name: &str, stages: Vec<StageSpec>) -> WorkflowType {
    let mut wt = WorkflowType::new(name, stages);
    wt.backoff = BackoffSpec { base_ms: 1, factor: 1.0, max_ms: 5, jitter: false };
    wt.control_poll_ms = 1;
    wt
}

pub fn pipeline(wt: WorkflowType) -> Arc<PipelineConfig> {
    Arc::new(PipelineConfig {
        workflow_types: vec![wt],
        handlers: BTreeMap::new(),
        context: None,
    })
}

type HandlerFn = dyn Fn(&str, &StageContext) -> Result<JsonValue, HandlerError> + Send + Sync;

/// Handler backed by a closure, counting calls per symbol.
pub struct FnHandler {
    f: Box<HandlerFn>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FnHandler {
    pub fn new(
        f: impl Fn(&str, &StageContext) -> Result<JsonValue, HandlerError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self { f: Box::new(f), calls: Mutex::new(HashMap::new()) })
    }

    pub fn ok() -> Arc<Self> {
        Self::new(|symbol, _| Ok(json!({ "symbol": symbol })))
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn calls_for(&self, symbol: &str) -> usize {
        self.calls.lock().unwrap().get(symbol).copied().unwrap_or(0)
    }
}

#[async_trait]
impl StageHandler for FnHandler {
    async fn execute(&self, symbol: &str, ctx: &StageContext) -> Result<JsonValue, HandlerError> {
        *self.calls.lock().unwrap().entry(symbol.to_string()).or_default() += 1;
        (self.f)(symbol, ctx)
    }
}

/// Blocks every call until `release` is called; signals `entered` on each call.
pub struct BlockingHandler {
    pub entered: Notify,
    gate: Semaphore,
    calls: AtomicUsize,
}

impl BlockingHandler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { entered: Notify::new(), gate: Semaphore::new(0), calls: AtomicUsize::new(0) })
    }

    pub fn release(&self) {
        self.gate.add_permits(1_000);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StageHandler for BlockingHandler {
    async fn execute(&self, _symbol: &str, _ctx: &StageContext) -> Result<JsonValue, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let permit = self
            .gate
            .acquire()
            .await
            .map_err(|e| HandlerError::new("closed", e.to_string()))?;
        permit.forget();
        Ok(json!({}))
    }
}

type SnapshotFn = dyn Fn(&str, usize) -> JsonValue + Send + Sync;

/// Context provider whose snapshot depends on how often the symbol was asked for.
pub struct SequenceContext {
    f: Box<SnapshotFn>,
    calls: Mutex<HashMap<String, usize>>,
}

impl SequenceContext {
    pub fn new(f: impl Fn(&str, usize) -> JsonValue + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self { f: Box::new(f), calls: Mutex::new(HashMap::new()) })
    }
}

#[async_trait]
impl ContextProvider for SequenceContext {
    async fn snapshot(&self, _: Uuid, symbol: &str, _: StageName) -> Result<JsonValue, HandlerError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(symbol.to_string()).or_default();
            *n += 1;
            *n
        };
        Ok((self.f)(symbol, n))
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub engine: WorkflowEngine,
}

pub fn harness(wt: WorkflowType, handlers: HandlerRegistry) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let engine = WorkflowEngine::new(
        pipeline(wt),
        Arc::new(handlers),
        store.clone() as Arc<dyn StateStore>,
        Arc::new(NoOpEventSink),
    );
    Harness { store, engine }
}
