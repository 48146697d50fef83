use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tracing::{debug, warn};

use tickerflow_core::{GateAction, StageSpec, SymbolStatus};
use tickerflow_store::{NewDlqEntry, StateStore, SymbolStateUpdate};

use crate::context::{ContextProvider, StageContext};
use crate::error::EngineError;
use crate::executor::events::{Event, EventSink};
use crate::executor::types::{RunContext, SymbolOutcome};
use crate::gate::GateEvaluator;
use crate::handler::{ErrorClassifier, ErrorKind, HandlerError, HandlerRegistry};
use crate::retry::{decide_retry, RetryConfig, RetryDecision};

/// Drives one (symbol, stage) unit to an outcome: gates, handler, retries, DLQ.
///
/// Writes only the unit's own SymbolState, gate audit and DLQ rows. Stage
/// counters belong to the coordinator. A store failure is returned as `Err` and
/// aborts the run.
pub struct SymbolStageRunner {
    store: Arc<dyn StateStore>,
    handlers: Arc<HandlerRegistry>,
    gates: GateEvaluator,
    context: Arc<dyn ContextProvider>,
    classifier: Arc<dyn ErrorClassifier>,
    event_sink: Arc<dyn EventSink>,
    retry: RetryConfig,
    timeout: Duration,
}

enum Prepared {
    Ready(StageContext),
    Decided(SymbolOutcome),
    ContextFailed(HandlerError),
}

impl SymbolStageRunner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn StateStore>,
        handlers: Arc<HandlerRegistry>,
        gates: GateEvaluator,
        context: Arc<dyn ContextProvider>,
        classifier: Arc<dyn ErrorClassifier>,
        event_sink: Arc<dyn EventSink>,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            handlers,
            gates,
            context,
            classifier,
            event_sink,
            retry,
            timeout,
        }
    }

    pub async fn run(
        &self,
        run: &RunContext,
        symbol: &str,
        spec: &StageSpec,
    ) -> Result<SymbolOutcome, EngineError> {
        let stage = spec.stage;
        let mut retry_count = 0u32;
        if let Some(state) = self.store.get_symbol_state(run.workflow_id, symbol, stage).await? {
            let status = state.parsed_status()?;
            if status.is_terminal() {
                return Ok(SymbolOutcome::AlreadyTerminal { status });
            }
            retry_count = state.retry_count.max(0) as u32;
        }

        self.store
            .upsert_symbol_state(
                SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Running)
                    .retry_count(retry_count as i32),
            )
            .await?;

        let mut gated: Option<StageContext> = None;
        loop {
            let mut ctx = match gated.take() {
                Some(ctx) => ctx,
                None => match self.prepare(run, symbol, spec, retry_count).await? {
                    Prepared::Ready(ctx) => ctx,
                    Prepared::Decided(outcome) => return Ok(outcome),
                    Prepared::ContextFailed(err) => {
                        match self.on_failure(run, symbol, spec, None, err, &mut retry_count).await? {
                            Some(outcome) => return Ok(outcome),
                            None => continue,
                        }
                    }
                },
            };
            ctx.attempt = retry_count + 1;

            match self.invoke(symbol, &ctx).await? {
                Ok(_) => {
                    self.store
                        .upsert_symbol_state(
                            SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Completed)
                                .retry_count(retry_count as i32),
                        )
                        .await?;
                    self.event_sink
                        .emit(Event::SymbolCompleted {
                            workflow_id: run.workflow_id,
                            stage,
                            symbol: symbol.to_string(),
                        })
                        .await;
                    return Ok(SymbolOutcome::Completed);
                }
                Err(err) => {
                    match self.on_failure(run, symbol, spec, Some(&ctx), err, &mut retry_count).await? {
                        Some(outcome) => return Ok(outcome),
                        None => gated = Some(ctx),
                    }
                }
            }
        }
    }

    /// Fetches the snapshot and evaluates gates. SKIP and DEFER are persisted here.
    async fn prepare(
        &self,
        run: &RunContext,
        symbol: &str,
        spec: &StageSpec,
        retry_count: u32,
    ) -> Result<Prepared, EngineError> {
        let stage = spec.stage;
        let snapshot = match self.context.snapshot(run.workflow_id, symbol, stage).await {
            Ok(snapshot) => snapshot,
            Err(err) => return Ok(Prepared::ContextFailed(err)),
        };
        let ctx = StageContext {
            workflow_id: run.workflow_id,
            workflow_type: run.workflow_type.name.clone(),
            stage,
            options: run.options.clone(),
            snapshot,
            attempt: retry_count + 1,
        };

        let evaluation = self.gates.evaluate(symbol, &spec.gates, &ctx);
        if let Some(record) = evaluation.audit_record(run.workflow_id, stage, symbol) {
            self.store.insert_gate_result(record).await?;
        }
        if evaluation.forced {
            debug!(%symbol, %stage, reason = %evaluation.decision.reason, "gate overridden by force");
        }

        let reason = evaluation.decision.reason;
        match evaluation.decision.action {
            GateAction::Pass => Ok(Prepared::Ready(ctx)),
            GateAction::Skip => {
                self.store
                    .upsert_symbol_state(
                        SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Skipped)
                            .retry_count(retry_count as i32)
                            .error(reason.clone()),
                    )
                    .await?;
                self.event_sink
                    .emit(Event::SymbolSkipped {
                        workflow_id: run.workflow_id,
                        stage,
                        symbol: symbol.to_string(),
                        reason: reason.clone(),
                    })
                    .await;
                Ok(Prepared::Decided(SymbolOutcome::Skipped { reason }))
            }
            GateAction::Defer => {
                self.store
                    .upsert_symbol_state(
                        SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Pending)
                            .retry_count(retry_count as i32)
                            .error(reason.clone()),
                    )
                    .await?;
                self.event_sink
                    .emit(Event::SymbolDeferred {
                        workflow_id: run.workflow_id,
                        stage,
                        symbol: symbol.to_string(),
                        reason: reason.clone(),
                    })
                    .await;
                Ok(Prepared::Decided(SymbolOutcome::Deferred { reason }))
            }
        }
    }

    async fn invoke(
        &self,
        symbol: &str,
        ctx: &StageContext,
    ) -> Result<Result<serde_json::Value, HandlerError>, EngineError> {
        let handler = self
            .handlers
            .get(ctx.stage)
            .ok_or(EngineError::MissingHandler(ctx.stage))?;
        match tokio::time::timeout(self.timeout, handler.execute(symbol, ctx)).await {
            Ok(result) => Ok(result),
            Err(_) => Ok(Err(HandlerError::timeout(self.timeout))),
        }
    }

    /// Applies the retry decision. `None` means retry right away.
    async fn on_failure(
        &self,
        run: &RunContext,
        symbol: &str,
        spec: &StageSpec,
        ctx: Option<&StageContext>,
        err: HandlerError,
        retry_count: &mut u32,
    ) -> Result<Option<SymbolOutcome>, EngineError> {
        let stage = spec.stage;
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else {
            self.classifier.classify(&err)
        };
        let message = err.to_string();

        match decide_retry(&self.retry, kind, *retry_count, || fastrand::u64(..)) {
            RetryDecision::RetryNow => {
                *retry_count += 1;
                debug!(%symbol, %stage, retry_count = *retry_count, error = %message, "retrying immediately");
                self.store
                    .upsert_symbol_state(
                        SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Running)
                            .retry_count(*retry_count as i32)
                            .error(message),
                    )
                    .await?;
                Ok(None)
            }
            RetryDecision::RetryLater { delay } => {
                *retry_count += 1;
                let next_attempt_at = Utc::now() + chrono::Duration::milliseconds(delay.as_millis() as i64);
                self.store
                    .upsert_symbol_state(
                        SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Retrying)
                            .retry_count(*retry_count as i32)
                            .error(message)
                            .next_attempt_at(next_attempt_at),
                    )
                    .await?;
                self.event_sink
                    .emit(Event::SymbolRetryScheduled {
                        workflow_id: run.workflow_id,
                        stage,
                        symbol: symbol.to_string(),
                        retry_count: *retry_count,
                        delay_ms: delay.as_millis() as u64,
                    })
                    .await;
                Ok(Some(SymbolOutcome::Retrying {
                    retry_count: *retry_count,
                    next_attempt_at,
                }))
            }
            RetryDecision::DeadLetter { reason } => {
                warn!(%symbol, %stage, retry_count = *retry_count, error = %message, "dead-lettered");
                self.store
                    .upsert_symbol_state(
                        SymbolStateUpdate::new(run.workflow_id, symbol, stage, SymbolStatus::Failed)
                            .retry_count(*retry_count as i32)
                            .error(message.clone()),
                    )
                    .await?;
                let dlq_id = self
                    .store
                    .insert_dlq_entry(NewDlqEntry {
                        workflow_id: run.workflow_id,
                        symbol: symbol.to_string(),
                        stage,
                        error_message: err.message.clone(),
                        error_type: err.error_type.clone(),
                        context: json!({
                            "workflow_type": run.workflow_type.name,
                            "options": run.options,
                            "snapshot": ctx.map(|c| c.snapshot.clone()),
                            "attempt": ctx.map(|c| c.attempt),
                            "error_kind": kind.as_str(),
                            "dead_letter_reason": reason.as_str(),
                            "required_stage": spec.required,
                        }),
                        retry_count: *retry_count as i32,
                    })
                    .await?;
                self.event_sink
                    .emit(Event::SymbolDeadLettered {
                        workflow_id: run.workflow_id,
                        stage,
                        symbol: symbol.to_string(),
                        retry_count: *retry_count,
                        error: message,
                    })
                    .await;
                Ok(Some(SymbolOutcome::DeadLettered {
                    dlq_id,
                    retry_count: *retry_count,
                }))
            }
        }
    }
}
