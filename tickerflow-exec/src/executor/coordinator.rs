use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tickerflow_core::{ControlRequest, StageName, StageSpec, StageStatus, SymbolStatus};
use tickerflow_store::{CounterDelta, StageCounters, StateStore, StoreError, SymbolState, SymbolStateUpdate};

use crate::control::RunControl;
use crate::error::EngineError;
use crate::executor::concurrency::ConcurrencyLimits;
use crate::executor::events::{Event, EventSink};
use crate::executor::runner::SymbolStageRunner;
use crate::executor::types::{RunContext, StageOutcome, SymbolOutcome};

/// Upper bound on dispatch passes per stage. Retries and deferrals are bounded
/// on their own; this stops a misbehaving store from looping forever.
const MAX_STAGE_PASSES: u32 = 1_000;

const DEFERRED_PREFIX: &str = "deferred gate never passed";

/// Runs one stage over the run's symbol set.
pub struct StageCoordinator {
    store: Arc<dyn StateStore>,
    runner: Arc<SymbolStageRunner>,
    limits: Arc<ConcurrencyLimits>,
    event_sink: Arc<dyn EventSink>,
    control: Arc<RunControl>,
}

/// Bookkeeping between passes.
#[derive(Default)]
struct PassState {
    ready: Vec<String>,
    retrying: BTreeMap<String, DateTime<Utc>>,
    deferred: BTreeMap<String, String>,
    deferred_passes: u32,
    passes: u32,
}

impl PassState {
    fn pending_symbols(&self) -> Vec<String> {
        let mut all: BTreeSet<String> = self.ready.iter().cloned().collect();
        all.extend(self.retrying.keys().cloned());
        all.extend(self.deferred.keys().cloned());
        all.into_iter().collect()
    }
}

impl StageCoordinator {
    pub fn new(
        store: Arc<dyn StateStore>,
        runner: Arc<SymbolStageRunner>,
        limits: Arc<ConcurrencyLimits>,
        event_sink: Arc<dyn EventSink>,
        control: Arc<RunControl>,
    ) -> Self {
        Self {
            store,
            runner,
            limits,
            event_sink,
            control,
        }
    }

    pub async fn run_stage(
        &self,
        run: &RunContext,
        stage_index: usize,
        spec: &StageSpec,
        symbols: &[String],
    ) -> Result<StageOutcome, EngineError> {
        let workflow_id = run.workflow_id;
        let stage = spec.stage;

        self.store.begin_stage(workflow_id, stage, stage_index as i32).await?;
        self.event_sink
            .emit(Event::StageStarted { workflow_id, stage })
            .await;

        if !spec.enabled {
            info!(%workflow_id, %stage, "stage disabled, skipping");
            return self
                .finish(run, spec, StageStatus::Skipped, StageCounters::default(), 0, Vec::new())
                .await;
        }

        let states = self.store.get_symbol_states(workflow_id, stage).await?;
        let base = self.reconcile_counters(run, stage, &states).await?;
        let mut pass = self.initial_pass_state(symbols, &states)?;

        let (tx, rx) = mpsc::unbounded_channel::<CounterDelta>();
        let aggregator = tokio::spawn(aggregate_counters(self.store.clone(), run.workflow_id, stage, base, rx));

        let interrupted = self.drive_passes(run, spec, &mut pass, &tx).await;
        let interrupted = match interrupted {
            Ok(None) => {
                self.skip_leftover_deferred(run, stage, &mut pass, &tx).await?;
                None
            }
            Ok(Some(request)) => Some(request),
            Err(e) => {
                drop(tx);
                let _ = aggregator.await;
                return Err(e);
            }
        };

        drop(tx);
        let counters = aggregator
            .await
            .map_err(|e| EngineError::Internal(format!("counter aggregator: {e}")))??;

        if let Some(request) = interrupted {
            info!(%workflow_id, %stage, request = %request, "stage interrupted");
            return Ok(StageOutcome {
                stage,
                status: StageStatus::Running,
                counters,
                passes: pass.passes,
                pending_symbols: pass.pending_symbols(),
                interrupted: Some(request),
            });
        }

        let dead_lettered = counters.failed.max(0) as u64;
        let status = if spec.failure_policy.is_exceeded(dead_lettered, symbols.len() as u64) {
            StageStatus::Failed
        } else {
            StageStatus::Completed
        };
        let extra_passes = pass.passes.saturating_sub(1);
        self.finish(run, spec, status, counters, extra_passes, pass.pending_symbols())
            .await
            .map(|mut outcome| {
                outcome.passes = pass.passes;
                outcome
            })
    }

    async fn finish(
        &self,
        run: &RunContext,
        spec: &StageSpec,
        status: StageStatus,
        counters: StageCounters,
        retry_passes: u32,
        pending_symbols: Vec<String>,
    ) -> Result<StageOutcome, EngineError> {
        let stage = spec.stage;
        self.store
            .finish_stage(run.workflow_id, stage, status, retry_passes as i32)
            .await?;
        info!(
            workflow_id = %run.workflow_id,
            %stage,
            status = %status,
            processed = counters.processed,
            succeeded = counters.succeeded,
            failed = counters.failed,
            skipped = counters.skipped,
            "stage finished"
        );
        self.event_sink
            .emit(Event::StageFinished {
                workflow_id: run.workflow_id,
                stage,
                status,
                counters,
            })
            .await;
        Ok(StageOutcome {
            stage,
            status,
            counters,
            passes: 0,
            pending_symbols,
            interrupted: None,
        })
    }

    /// Recomputes counters from symbol state so a resumed stage starts consistent.
    async fn reconcile_counters(
        &self,
        run: &RunContext,
        stage: StageName,
        states: &[SymbolState],
    ) -> Result<StageCounters, EngineError> {
        let mut counters = StageCounters::default();
        for state in states {
            match state.parsed_status()? {
                SymbolStatus::Completed => counters.succeeded += 1,
                SymbolStatus::Failed => counters.failed += 1,
                SymbolStatus::Skipped => counters.skipped += 1,
                SymbolStatus::Pending | SymbolStatus::Running | SymbolStatus::Retrying => continue,
            }
            counters.processed += 1;
        }
        if counters != StageCounters::default() {
            debug!(workflow_id = %run.workflow_id, %stage, ?counters, "reconciled stage counters");
            self.store.set_stage_counters(run.workflow_id, stage, counters).await?;
        }
        Ok(counters)
    }

    fn initial_pass_state(&self, symbols: &[String], states: &[SymbolState]) -> Result<PassState, EngineError> {
        let by_symbol: BTreeMap<&str, &SymbolState> =
            states.iter().map(|s| (s.symbol.as_str(), s)).collect();
        let mut pass = PassState::default();
        for symbol in symbols {
            let Some(state) = by_symbol.get(symbol.as_str()) else {
                pass.ready.push(symbol.clone());
                continue;
            };
            match state.parsed_status()? {
                status if status.is_terminal() => {}
                SymbolStatus::Retrying => {
                    let at = state.next_attempt_at.unwrap_or_else(Utc::now);
                    pass.retrying.insert(symbol.clone(), at);
                }
                _ => pass.ready.push(symbol.clone()),
            }
        }
        Ok(pass)
    }

    /// Dispatches passes until nothing is runnable. Returns the control request
    /// that stopped dispatch, if any.
    async fn drive_passes(
        &self,
        run: &RunContext,
        spec: &StageSpec,
        pass: &mut PassState,
        tx: &mpsc::UnboundedSender<CounterDelta>,
    ) -> Result<Option<ControlRequest>, EngineError> {
        let wt = &run.workflow_type;
        loop {
            if let Some(request) = self.check_control(run).await? {
                return Ok(Some(request));
            }

            if pass.ready.is_empty() {
                if !pass.deferred.is_empty() && pass.deferred_passes < wt.max_deferred_passes {
                    pass.deferred_passes += 1;
                    if !wt.defer_delay().is_zero() {
                        if let Some(request) = self.sleep_watching_control(run, wt.defer_delay()).await? {
                            return Ok(Some(request));
                        }
                    }
                    let deferred = std::mem::take(&mut pass.deferred);
                    pass.ready.extend(deferred.into_keys());
                    continue;
                }

                let Some(earliest) = pass.retrying.values().min().copied() else {
                    return Ok(None);
                };
                let wait = (earliest - Utc::now()).to_std().unwrap_or(Duration::ZERO);
                if !wait.is_zero() {
                    if let Some(request) = self.sleep_watching_control(run, wait).await? {
                        return Ok(Some(request));
                    }
                }
                let now = Utc::now();
                let due: Vec<String> = pass
                    .retrying
                    .iter()
                    .filter(|(_, at)| **at <= now)
                    .map(|(s, _)| s.clone())
                    .collect();
                for symbol in due {
                    pass.retrying.remove(&symbol);
                    pass.ready.push(symbol);
                }
                continue;
            }

            if pass.passes >= MAX_STAGE_PASSES {
                return Err(EngineError::Internal(format!(
                    "stage '{}' exceeded {MAX_STAGE_PASSES} dispatch passes",
                    spec.stage
                )));
            }
            pass.passes += 1;

            let batch = std::mem::take(&mut pass.ready);
            debug!(workflow_id = %run.workflow_id, stage = %spec.stage, pass = pass.passes, symbols = batch.len(), "dispatching pass");
            let (results, interrupted) = self.dispatch(run, spec, batch, pass, tx).await?;

            for (symbol, outcome) in results {
                match outcome {
                    SymbolOutcome::Retrying { next_attempt_at, .. } => {
                        pass.retrying.insert(symbol, next_attempt_at);
                    }
                    SymbolOutcome::Deferred { reason } => {
                        pass.deferred.insert(symbol, reason);
                    }
                    SymbolOutcome::Completed
                    | SymbolOutcome::Skipped { .. }
                    | SymbolOutcome::DeadLettered { .. }
                    | SymbolOutcome::AlreadyTerminal { .. } => {}
                }
            }

            if interrupted.is_some() {
                return Ok(interrupted);
            }
        }
    }

    /// Spawns one task per symbol under the concurrency limits and waits for all
    /// of them. Symbols not dispatched because of a control request go back to
    /// `pass.ready`.
    async fn dispatch(
        &self,
        run: &RunContext,
        spec: &StageSpec,
        batch: Vec<String>,
        pass: &mut PassState,
        tx: &mpsc::UnboundedSender<CounterDelta>,
    ) -> Result<(Vec<(String, SymbolOutcome)>, Option<ControlRequest>), EngineError> {
        let mut handles = Vec::with_capacity(batch.len());
        let mut interrupted = None;
        let mut remaining = batch.into_iter();

        for symbol in remaining.by_ref() {
            let permit = self.limits.acquire(spec.stage).await?;
            if let Some(request) = self.check_control(run).await? {
                pass.ready.push(symbol);
                interrupted = Some(request);
                break;
            }

            let runner = self.runner.clone();
            let run = run.clone();
            let spec = spec.clone();
            let tx = tx.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                let outcome = runner.run(&run, &symbol, &spec).await;
                if let Ok(outcome) = &outcome {
                    if let Some(delta) = counter_delta(outcome) {
                        let _ = tx.send(delta);
                    }
                }
                (symbol, outcome)
            });
            handles.push(handle);
        }
        pass.ready.extend(remaining);

        let mut results = Vec::with_capacity(handles.len());
        let mut first_error = None;
        for joined in futures_util::future::join_all(handles).await {
            match joined {
                Ok((symbol, Ok(outcome))) => results.push((symbol, outcome)),
                Ok((symbol, Err(e))) => {
                    warn!(workflow_id = %run.workflow_id, stage = %spec.stage, %symbol, error = %e, "unit failed");
                    first_error.get_or_insert(e);
                }
                Err(e) => {
                    first_error.get_or_insert(EngineError::Internal(format!("unit task: {e}")));
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok((results, interrupted)),
        }
    }

    /// Symbols still deferred after the last allowed pass become skipped.
    async fn skip_leftover_deferred(
        &self,
        run: &RunContext,
        stage: StageName,
        pass: &mut PassState,
        tx: &mpsc::UnboundedSender<CounterDelta>,
    ) -> Result<(), EngineError> {
        for (symbol, reason) in std::mem::take(&mut pass.deferred) {
            let reason = format!("{DEFERRED_PREFIX}: {reason}");
            let retry_count = self
                .store
                .get_symbol_state(run.workflow_id, &symbol, stage)
                .await?
                .map_or(0, |s| s.retry_count);
            self.store
                .upsert_symbol_state(
                    SymbolStateUpdate::new(run.workflow_id, symbol.as_str(), stage, SymbolStatus::Skipped)
                        .retry_count(retry_count)
                        .error(reason.clone()),
                )
                .await?;
            let _ = tx.send(CounterDelta::skipped());
            self.event_sink
                .emit(Event::SymbolSkipped {
                    workflow_id: run.workflow_id,
                    stage,
                    symbol,
                    reason,
                })
                .await;
        }
        Ok(())
    }

    async fn check_control(&self, run: &RunContext) -> Result<Option<ControlRequest>, EngineError> {
        Ok(self.control.check(self.store.as_ref(), run.workflow_id).await?)
    }

    async fn sleep_watching_control(
        &self,
        run: &RunContext,
        total: Duration,
    ) -> Result<Option<ControlRequest>, EngineError> {
        let step = run.workflow_type.control_poll_interval().max(Duration::from_millis(1));
        let deadline = tokio::time::Instant::now() + total;
        loop {
            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(step.min(deadline - now)).await;
            if let Some(request) = self.check_control(run).await? {
                return Ok(Some(request));
            }
        }
    }
}

fn counter_delta(outcome: &SymbolOutcome) -> Option<CounterDelta> {
    match outcome {
        SymbolOutcome::Completed => Some(CounterDelta::succeeded()),
        SymbolOutcome::Skipped { .. } => Some(CounterDelta::skipped()),
        SymbolOutcome::DeadLettered { .. } => Some(CounterDelta::failed()),
        SymbolOutcome::Deferred { .. }
        | SymbolOutcome::Retrying { .. }
        | SymbolOutcome::AlreadyTerminal { .. } => None,
    }
}

/// Single writer for a stage's counters. Returns the final totals.
async fn aggregate_counters(
    store: Arc<dyn StateStore>,
    workflow_id: uuid::Uuid,
    stage: StageName,
    base: StageCounters,
    mut rx: mpsc::UnboundedReceiver<CounterDelta>,
) -> Result<StageCounters, StoreError> {
    let mut totals = base;
    while let Some(delta) = rx.recv().await {
        store.increment_stage_counters(workflow_id, stage, delta).await?;
        totals.processed += delta.processed;
        totals.succeeded += delta.succeeded;
        totals.failed += delta.failed;
        totals.skipped += delta.skipped;
    }
    Ok(totals)
}
