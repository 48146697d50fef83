use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::json;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use tickerflow_core::{
    validate_symbols, ControlRequest, ExecutionOptions, PipelineConfig, StageName, StageStatus,
    WorkflowStatus,
};
use tickerflow_store::{DlqEntry, NewWorkflowExecution, StateStore, WorkflowExecution};

use crate::checkpoint::{config_hash, CheckpointManager, CheckpointState, CHECKPOINT_VERSION};
use crate::context::{ContextProvider, EmptyContext};
use crate::control::{ControlRegistry, RunControl};
use crate::error::EngineError;
use crate::executor::concurrency::ConcurrencyLimits;
use crate::executor::coordinator::StageCoordinator;
use crate::executor::events::{Event, EventSink};
use crate::executor::runner::SymbolStageRunner;
use crate::executor::types::{ControlAck, RunContext, RunSummary, StageOutcome, WorkflowStatusReport};
use crate::gate::{GateEvaluator, GateRegistry};
use crate::handler::{DefaultErrorClassifier, ErrorClassifier, HandlerRegistry};
use crate::retry::RetryConfig;

/// Entry point for workflow runs: create, run, resume, control and inspect.
pub struct WorkflowEngine {
    config: Arc<PipelineConfig>,
    handlers: Arc<HandlerRegistry>,
    gates: Arc<GateRegistry>,
    store: Arc<dyn StateStore>,
    event_sink: Arc<dyn EventSink>,
    context: Arc<dyn ContextProvider>,
    default_classifier: Arc<dyn ErrorClassifier>,
    classifiers: HashMap<String, Arc<dyn ErrorClassifier>>,
    controls: ControlRegistry,
}

/// Where a run stopped.
enum Ending {
    Finished(WorkflowStatus, Option<String>),
    Interrupted(ControlRequest, Option<StageName>),
}

impl WorkflowEngine {
    pub fn new(
        config: Arc<PipelineConfig>,
        handlers: Arc<HandlerRegistry>,
        store: Arc<dyn StateStore>,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            config,
            handlers,
            gates: Arc::new(GateRegistry::default()),
            store,
            event_sink,
            context: Arc::new(EmptyContext),
            default_classifier: Arc::new(DefaultErrorClassifier),
            classifiers: HashMap::new(),
            controls: ControlRegistry::new(),
        }
    }

    pub fn with_context_provider(mut self, context: Arc<dyn ContextProvider>) -> Self {
        self.context = context;
        self
    }

    pub fn with_gate_registry(mut self, gates: Arc<GateRegistry>) -> Self {
        self.gates = gates;
        self
    }

    /// Replaces the classifier used by workflow types without their own.
    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.default_classifier = classifier;
        self
    }

    pub fn with_classifier_for(
        mut self,
        workflow_type: impl Into<String>,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        self.classifiers.insert(workflow_type.into(), classifier);
        self
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Creates a run and drives it to a terminal or paused state.
    pub async fn start(
        &self,
        workflow_type: &str,
        symbols: Vec<String>,
        options: ExecutionOptions,
    ) -> Result<RunSummary, EngineError> {
        let id = self.create(workflow_type, symbols, options).await?;
        self.run(id).await
    }

    /// Persists a `pending` run without executing it.
    pub async fn create(
        &self,
        workflow_type: &str,
        symbols: Vec<String>,
        options: ExecutionOptions,
    ) -> Result<Uuid, EngineError> {
        let wt = self.config.workflow_type(workflow_type)?;
        validate_symbols(&symbols)?;
        for spec in wt.stages.iter().filter(|s| s.enabled) {
            if !self.handlers.contains(spec.stage) {
                return Err(EngineError::MissingHandler(spec.stage));
            }
        }

        let options_json = serde_json::to_value(&options)
            .map_err(|e| EngineError::Internal(format!("serialize options: {e}")))?;
        let wf = self
            .store
            .create_workflow(NewWorkflowExecution {
                workflow_type: wt.name.clone(),
                symbols,
                metadata: json!({
                    "options": options_json,
                    "config_hash": config_hash(wt)?,
                }),
            })
            .await?;
        info!(workflow_id = %wf.id, workflow_type = %wt.name, symbols = wf.symbols.len(), "workflow created");
        Ok(wf.id)
    }

    /// Runs a `pending` workflow.
    pub async fn run(&self, workflow_id: Uuid) -> Result<RunSummary, EngineError> {
        let wf = self.load(workflow_id).await?;
        let status = wf.parsed_status()?;
        if status != WorkflowStatus::Pending {
            return Err(invalid_state(&wf, "run"));
        }
        self.drive(wf, WorkflowStatus::Pending, "run").await
    }

    /// Continues a pending, paused or interrupted run from its first incomplete stage.
    pub async fn resume(&self, workflow_id: Uuid) -> Result<RunSummary, EngineError> {
        let wf = self.load(workflow_id).await?;
        let status = wf.parsed_status()?;
        if status.is_terminal() {
            return Err(invalid_state(&wf, "resume"));
        }
        self.drive(wf, status, "resume").await
    }

    pub async fn pause(&self, workflow_id: Uuid) -> Result<ControlAck, EngineError> {
        let wf = self.load(workflow_id).await?;
        match wf.parsed_status()? {
            WorkflowStatus::Pending | WorkflowStatus::Running
                if self.controls.request(workflow_id, ControlRequest::Pause).await =>
            {
                Ok(ControlAck::Signalled)
            }
            WorkflowStatus::Running => {
                self.store.request_control(workflow_id, ControlRequest::Pause).await?;
                Ok(ControlAck::Requested)
            }
            WorkflowStatus::Pending => {
                self.store
                    .set_workflow_status(workflow_id, WorkflowStatus::Paused)
                    .await?;
                info!(%workflow_id, "pending workflow paused");
                self.event_sink
                    .emit(Event::WorkflowPaused { workflow_id, stage: None })
                    .await;
                Ok(ControlAck::Applied)
            }
            WorkflowStatus::Paused => Ok(ControlAck::Unchanged),
            _ => Err(invalid_state(&wf, "pause")),
        }
    }

    pub async fn cancel(&self, workflow_id: Uuid) -> Result<ControlAck, EngineError> {
        let wf = self.load(workflow_id).await?;
        let status = wf.parsed_status()?;
        if status.is_terminal() {
            return Err(invalid_state(&wf, "cancel"));
        }
        if self.controls.request(workflow_id, ControlRequest::Cancel).await {
            return Ok(ControlAck::Signalled);
        }
        match status {
            WorkflowStatus::Running => {
                self.store.request_control(workflow_id, ControlRequest::Cancel).await?;
                Ok(ControlAck::Requested)
            }
            _ => {
                self.store
                    .finish_workflow(workflow_id, WorkflowStatus::Cancelled, None)
                    .await?;
                info!(%workflow_id, from = %status, "workflow cancelled");
                self.event_sink
                    .emit(Event::WorkflowFinished {
                        workflow_id,
                        status: WorkflowStatus::Cancelled,
                        error: None,
                    })
                    .await;
                Ok(ControlAck::Applied)
            }
        }
    }

    pub async fn get_status(&self, workflow_id: Uuid) -> Result<WorkflowStatusReport, EngineError> {
        let workflow = self.load(workflow_id).await?;
        let stages = self.store.get_stage_executions(workflow_id).await?;
        let open_dlq_entries = self.store.count_open_dlq(workflow_id).await?;
        Ok(WorkflowStatusReport {
            workflow,
            stages,
            open_dlq_entries,
        })
    }

    pub async fn list_workflows(
        &self,
        status: Option<WorkflowStatus>,
        limit: i64,
    ) -> Result<Vec<WorkflowExecution>, EngineError> {
        Ok(self.store.list_workflows(status, limit).await?)
    }

    pub async fn list_dlq(&self, resolved: bool, limit: i64) -> Result<Vec<DlqEntry>, EngineError> {
        Ok(self.store.list_dlq(resolved, limit).await?)
    }

    /// Marks a DLQ entry handled. Resolving twice is an error.
    pub async fn resolve_dlq(&self, id: i64, resolved_by: &str) -> Result<DlqEntry, EngineError> {
        let entry = self
            .store
            .get_dlq_entry(id)
            .await?
            .ok_or(EngineError::DlqEntryNotFound(id))?;
        if entry.resolved || !self.store.resolve_dlq_entry(id, resolved_by).await? {
            return Err(EngineError::DlqEntryAlreadyResolved(id));
        }
        info!(dlq_id = id, %resolved_by, symbol = %entry.symbol, "dlq entry resolved");
        self.store
            .get_dlq_entry(id)
            .await?
            .ok_or(EngineError::DlqEntryNotFound(id))
    }

    async fn load(&self, workflow_id: Uuid) -> Result<WorkflowExecution, EngineError> {
        self.store
            .get_workflow(workflow_id)
            .await?
            .ok_or(EngineError::WorkflowNotFound(workflow_id))
    }

    /// Claims the run (one driver per process, compare-and-set on `from` in the store)
    /// and executes its remaining stages.
    async fn drive(
        &self,
        wf: WorkflowExecution,
        from: WorkflowStatus,
        action: &'static str,
    ) -> Result<RunSummary, EngineError> {
        let workflow_id = wf.id;
        let resumed = from != WorkflowStatus::Pending;
        let span = info_span!("workflow", %workflow_id, workflow_type = %wf.workflow_type);
        async move {
            let poll = self
                .config
                .workflow_type(&wf.workflow_type)
                .map(|wt| wt.control_poll_interval())
                .unwrap_or_default();
            let Some(control) = self.controls.register(workflow_id, poll).await else {
                warn!(action, "workflow already driven by this process");
                return Err(EngineError::InvalidState {
                    workflow_id,
                    status: WorkflowStatus::Running.as_str().to_string(),
                    action,
                });
            };
            match self.store.mark_workflow_running(workflow_id, from).await {
                Ok(true) => {}
                Ok(false) => {
                    self.controls.unregister(workflow_id).await;
                    let current = self.load(workflow_id).await?;
                    warn!(action, status = %current.status, "workflow claimed elsewhere");
                    return Err(invalid_state(&current, action));
                }
                Err(e) => {
                    self.controls.unregister(workflow_id).await;
                    return Err(e.into());
                }
            }
            let mut stages = Vec::new();
            let result = self.drive_stages(&wf, resumed, control, &mut stages).await;
            self.controls.unregister(workflow_id).await;

            match result {
                Ok(ending) => self.conclude(workflow_id, ending, stages).await,
                Err(e) => {
                    warn!(error = %e, "workflow aborted");
                    let message = e.to_string();
                    if let Err(store_err) = self
                        .store
                        .finish_workflow(workflow_id, WorkflowStatus::Failed, Some(message.clone()))
                        .await
                    {
                        warn!(error = %store_err, "could not record workflow failure");
                    }
                    self.event_sink
                        .emit(Event::WorkflowFinished {
                            workflow_id,
                            status: WorkflowStatus::Failed,
                            error: Some(message),
                        })
                        .await;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn drive_stages(
        &self,
        wf: &WorkflowExecution,
        resumed: bool,
        control: Arc<RunControl>,
        outcomes: &mut Vec<StageOutcome>,
    ) -> Result<Ending, EngineError> {
        let workflow_id = wf.id;
        let wt = Arc::new(self.config.workflow_type(&wf.workflow_type)?.clone());
        let options: ExecutionOptions = match wf.metadata.get("options") {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| EngineError::Internal(format!("workflow options: {e}")))?,
            None => ExecutionOptions::default(),
        };
        let hash = config_hash(&wt)?;
        let checkpoints = CheckpointManager::new(self.store.clone());

        let mut checkpoint = None;
        if resumed {
            if let Some(expected) = wf.metadata.get("config_hash").and_then(|v| v.as_str()) {
                if expected != hash {
                    return Err(EngineError::ConfigDrift {
                        workflow_id,
                        expected: expected.to_string(),
                        actual: hash,
                    });
                }
            }
            checkpoint = checkpoints.latest(workflow_id, &wt).await?;
            let reset = self.store.reset_stale_running(workflow_id).await?;
            if reset > 0 {
                info!(reset, "reset symbols left running");
            }
        }

        self.event_sink
            .emit(Event::WorkflowStarted {
                workflow_id,
                workflow_type: wt.name.clone(),
                symbols: wf.symbols.len(),
                resumed,
            })
            .await;
        info!(resumed, symbols = wf.symbols.len(), "workflow running");

        let mut finished = HashSet::new();
        for row in self.store.get_stage_executions(workflow_id).await? {
            if row.parsed_status()?.is_terminal() {
                finished.insert(row.stage_name.parse::<StageName>()?);
            }
        }
        let start_index = wt
            .stages
            .iter()
            .position(|s| !finished.contains(&s.stage))
            .unwrap_or(wt.stages.len());
        // Stage rows are finished before their checkpoint is written, so rows may lead by one.
        if let Some(state) = &checkpoint {
            if start_index < state.next_stage_index {
                return Err(EngineError::CheckpointCorrupt {
                    workflow_id,
                    reason: format!(
                        "checkpoint resumes at stage index {} but stage '{}' is unfinished",
                        state.next_stage_index, wt.stages[start_index].stage
                    ),
                });
            }
        }
        let mut completed_stages: Vec<StageName> =
            wt.stages[..start_index].iter().map(|s| s.stage).collect();

        let run = RunContext {
            workflow_id,
            workflow_type: wt.clone(),
            options: options.clone(),
        };
        let coordinator = self.coordinator(&run, control.clone());
        let symbols = &wf.symbols;

        for (index, spec) in wt.stages.iter().enumerate().skip(start_index) {
            if let Some(request) = control.check(self.store.as_ref(), workflow_id).await? {
                self.checkpoint(
                    &checkpoints,
                    workflow_id,
                    CheckpointState {
                        version: CHECKPOINT_VERSION,
                        stage_index: index,
                        stage: spec.stage,
                        stage_status: StageStatus::Pending,
                        next_stage_index: index,
                        completed_stages: completed_stages.clone(),
                        pending_symbols: symbols.clone(),
                        config_hash: hash.clone(),
                    },
                )
                .await?;
                return Ok(Ending::Interrupted(request, Some(spec.stage)));
            }

            self.store.set_current_stage(workflow_id, Some(spec.stage)).await?;
            let outcome = coordinator
                .run_stage(&run, index, spec, symbols)
                .instrument(info_span!("stage", stage = %spec.stage))
                .await?;

            if let Some(request) = outcome.interrupted {
                self.checkpoint(
                    &checkpoints,
                    workflow_id,
                    CheckpointState {
                        version: CHECKPOINT_VERSION,
                        stage_index: index,
                        stage: spec.stage,
                        stage_status: outcome.status,
                        next_stage_index: index,
                        completed_stages: completed_stages.clone(),
                        pending_symbols: outcome.pending_symbols.clone(),
                        config_hash: hash.clone(),
                    },
                )
                .await?;
                outcomes.push(outcome);
                return Ok(Ending::Interrupted(request, Some(spec.stage)));
            }

            completed_stages.push(spec.stage);
            self.checkpoint(
                &checkpoints,
                workflow_id,
                CheckpointState {
                    version: CHECKPOINT_VERSION,
                    stage_index: index,
                    stage: spec.stage,
                    stage_status: outcome.status,
                    next_stage_index: index + 1,
                    completed_stages: completed_stages.clone(),
                    pending_symbols: outcome.pending_symbols.clone(),
                    config_hash: hash.clone(),
                },
            )
            .await?;

            let failed = outcome.status == StageStatus::Failed;
            let counters = outcome.counters;
            outcomes.push(outcome);
            if failed {
                if spec.required {
                    let message = format!(
                        "required stage {} failed: {} of {} symbols dead-lettered",
                        spec.stage,
                        counters.failed,
                        symbols.len()
                    );
                    return Ok(Ending::Finished(WorkflowStatus::Failed, Some(message)));
                }
                warn!(stage = %spec.stage, failed = counters.failed, "optional stage failed, continuing");
            }
        }

        self.store.set_current_stage(workflow_id, None).await?;
        Ok(Ending::Finished(WorkflowStatus::Completed, None))
    }

    fn coordinator(&self, run: &RunContext, control: Arc<RunControl>) -> StageCoordinator {
        let wt = &run.workflow_type;
        let classifier = self
            .classifiers
            .get(&wt.name)
            .cloned()
            .unwrap_or_else(|| self.default_classifier.clone());
        let runner = SymbolStageRunner::new(
            self.store.clone(),
            self.handlers.clone(),
            GateEvaluator::new(self.gates.clone()),
            self.context.clone(),
            classifier,
            self.event_sink.clone(),
            RetryConfig::for_run(wt, &run.options),
            run.options.timeout_for(wt),
        );
        StageCoordinator::new(
            self.store.clone(),
            Arc::new(runner),
            Arc::new(ConcurrencyLimits::new(wt.concurrency, &wt.stage_concurrency)),
            self.event_sink.clone(),
            control,
        )
    }

    async fn checkpoint(
        &self,
        checkpoints: &CheckpointManager,
        workflow_id: Uuid,
        state: CheckpointState,
    ) -> Result<(), EngineError> {
        let rec = checkpoints.save(workflow_id, &state).await?;
        self.event_sink
            .emit(Event::CheckpointWritten {
                workflow_id,
                stage: state.stage,
                checkpoint_id: rec.id,
            })
            .await;
        Ok(())
    }

    async fn conclude(
        &self,
        workflow_id: Uuid,
        ending: Ending,
        mut stages: Vec<StageOutcome>,
    ) -> Result<RunSummary, EngineError> {
        let (status, error_message) = match ending {
            Ending::Interrupted(ControlRequest::Pause, stage) => {
                self.store
                    .set_workflow_status(workflow_id, WorkflowStatus::Paused)
                    .await?;
                info!(stage = ?stage, "workflow paused");
                self.event_sink
                    .emit(Event::WorkflowPaused { workflow_id, stage })
                    .await;
                (WorkflowStatus::Paused, None)
            }
            Ending::Interrupted(ControlRequest::Cancel, _) => {
                if let Some(outcome) = stages.last_mut().filter(|o| o.interrupted.is_some()) {
                    self.close_cancelled_stage(workflow_id, outcome).await?;
                }
                self.finish(workflow_id, WorkflowStatus::Cancelled, None).await?;
                (WorkflowStatus::Cancelled, None)
            }
            Ending::Finished(status, error) => {
                self.finish(workflow_id, status, error.clone()).await?;
                (status, error)
            }
        };
        Ok(RunSummary {
            workflow_id,
            status,
            stages,
            error_message,
        })
    }

    /// A cancelled run never resumes, so its interrupted stage row is closed as `skipped`.
    async fn close_cancelled_stage(
        &self,
        workflow_id: Uuid,
        outcome: &mut StageOutcome,
    ) -> Result<(), EngineError> {
        let retry_passes = outcome.passes.saturating_sub(1) as i32;
        self.store
            .finish_stage(workflow_id, outcome.stage, StageStatus::Skipped, retry_passes)
            .await?;
        outcome.status = StageStatus::Skipped;
        info!(stage = %outcome.stage, pending = outcome.pending_symbols.len(), "interrupted stage closed");
        self.event_sink
            .emit(Event::StageFinished {
                workflow_id,
                stage: outcome.stage,
                status: StageStatus::Skipped,
                counters: outcome.counters,
            })
            .await;
        Ok(())
    }

    async fn finish(
        &self,
        workflow_id: Uuid,
        status: WorkflowStatus,
        error: Option<String>,
    ) -> Result<(), EngineError> {
        self.store
            .finish_workflow(workflow_id, status, error.clone())
            .await?;
        info!(status = %status, error = ?error, "workflow finished");
        self.event_sink
            .emit(Event::WorkflowFinished {
                workflow_id,
                status,
                error,
            })
            .await;
        Ok(())
    }
}

fn invalid_state(wf: &WorkflowExecution, action: &'static str) -> EngineError {
    EngineError::InvalidState {
        workflow_id: wf.id,
        status: wf.status.clone(),
        action,
    }
}
