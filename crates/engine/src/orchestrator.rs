// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run lifecycle: start, phase loop, transitions, resume, cancel.

use crate::engine::{engine_for, EngineContext};
use crate::runner::Runner;
use crate::workspace;
use dc_core::{
    artifact_key, Clock, EventKind, PhaseDefinition, PhaseExecution, PhaseStatus, RunEvent,
    RunInput, RunStatus, StateTransitionError, WorkflowDefinition, WorkflowRun, WorkspaceSpec,
};
use dc_storage::{EventLog, RunStore, StorageError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("too many live runs ({live} of {max})")]
    ConcurrencyLimit { live: usize, max: usize },
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),
    #[error("phase {phase} exceeded max iterations ({max})")]
    MaxIterations { phase: String, max: u32 },
    #[error("run exceeded max retries ({max})")]
    MaxRetries { max: u32 },
    #[error("run not found: {0}")]
    RunNotFound(String),
    #[error("unknown definition: {0}")]
    UnknownDefinition(String),
    #[error("unknown phase: {0}")]
    UnknownPhase(String),
    #[error(transparent)]
    Workspace(#[from] workspace::WorkspaceError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Cap on runs counted as live (`running | paused`).
    pub max_concurrent: usize,
    /// Run-level resume budget after failures.
    pub max_retries: u32,
    /// Also write `state.checksum` beside `run.json`.
    pub with_checksum: bool,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self { max_concurrent: 5, max_retries: 3, with_checksum: false }
    }
}

type Listener = Box<dyn Fn(&RunEvent) + Send + Sync>;

struct RunSignals {
    cancel: CancellationToken,
    pause: CancellationToken,
}

impl RunSignals {
    fn fresh() -> Self {
        Self { cancel: CancellationToken::new(), pause: CancellationToken::new() }
    }
}

pub struct Orchestrator<C: Clock> {
    store: RunStore,
    definitions: HashMap<String, WorkflowDefinition>,
    runner: Arc<dyn Runner>,
    options: OrchestratorOptions,
    clock: C,
    listeners: Mutex<Vec<Listener>>,
    signals: Mutex<HashMap<String, RunSignals>>,
    executing: Mutex<HashSet<String>>,
}

impl<C: Clock> Orchestrator<C> {
    pub fn new(store: RunStore, runner: Arc<dyn Runner>, clock: C) -> Self {
        let mut definitions = HashMap::new();
        let dev_cycle = WorkflowDefinition::dev_cycle();
        definitions.insert(dev_cycle.definition_type.clone(), dev_cycle);
        Self {
            store,
            definitions,
            runner,
            options: OrchestratorOptions::default(),
            clock,
            listeners: Mutex::new(Vec::new()),
            signals: Mutex::new(HashMap::new()),
            executing: Mutex::new(HashSet::new()),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn register_definition(&mut self, definition: WorkflowDefinition) {
        self.definitions.insert(definition.definition_type.clone(), definition);
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    /// Subscribe to orchestrator events. Listener errors never affect runs.
    pub fn on_event(&self, listener: impl Fn(&RunEvent) + Send + Sync + 'static) {
        self.listeners.lock().push(Box::new(listener));
    }

    fn signals_for(&self, run_id: &str) -> (CancellationToken, CancellationToken) {
        let mut signals = self.signals.lock();
        let entry = signals.entry(run_id.to_string()).or_insert_with(RunSignals::fresh);
        (entry.cancel.clone(), entry.pause.clone())
    }

    fn reset_signals(&self, run_id: &str) {
        self.signals.lock().insert(run_id.to_string(), RunSignals::fresh());
    }

    /// Persist state (durably, before the event is observable) and emit.
    fn emit(&self, run: &WorkflowRun, kind: EventKind, data: Option<serde_json::Value>) {
        if kind.is_persistent() {
            let result = if self.options.with_checksum {
                self.store.save_with_checksum(run)
            } else {
                self.store.save(run)
            };
            if let Err(e) = result {
                tracing::error!(run_id = %run.id, error = %e, "failed to persist run state");
            }
        }

        let mut event = RunEvent::new(kind, run.id, self.clock.epoch_ms());
        event.data = data;
        let log = EventLog::new(self.store.paths(&run.id).events_log());
        if let Err(e) = log.append(&event) {
            tracing::error!(run_id = %run.id, error = %e, "failed to append event");
        }

        for listener in self.listeners.lock().iter() {
            // Listeners are best-effort; a panic must not affect the run.
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener(&event)));
            if result.is_err() {
                tracing::warn!(kind = %event.kind, "event listener panicked");
            }
        }
    }

    fn count_live_runs(&self) -> Result<usize, OrchestratorError> {
        let mut live = 0;
        for id in self.store.list_runs()? {
            if let Some(run) = self.store.load(&id)? {
                if run.status.is_live() {
                    live += 1;
                }
            }
        }
        Ok(live)
    }

    /// Create a pending run with its directory, state and input snapshot.
    pub fn start(
        &self,
        definition_type: &str,
        input: RunInput,
        workspace_spec: WorkspaceSpec,
    ) -> Result<WorkflowRun, OrchestratorError> {
        if !self.definitions.contains_key(definition_type) {
            return Err(OrchestratorError::UnknownDefinition(definition_type.to_string()));
        }
        if input.task.trim().is_empty() {
            return Err(OrchestratorError::Validation("task is empty".to_string()));
        }
        workspace::validate(&workspace_spec)?;

        let live = self.count_live_runs()?;
        if live >= self.options.max_concurrent {
            return Err(OrchestratorError::ConcurrencyLimit {
                live,
                max: self.options.max_concurrent,
            });
        }

        let run = WorkflowRun::new(
            definition_type,
            input,
            workspace_spec,
            self.options.max_retries,
            &self.clock,
        );
        self.store.save(&run)?;
        self.store.save_input(&run)?;
        self.reset_signals(&run.id);
        self.emit(&run, EventKind::WorkflowStarted, None);
        tracing::info!(run_id = %run.id, definition = definition_type, "workflow started");
        Ok(run)
    }

    fn load_run(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        self.store
            .load(run_id)?
            .ok_or_else(|| OrchestratorError::RunNotFound(run_id.to_string()))
    }

    fn definition_of(&self, run: &WorkflowRun) -> Result<&WorkflowDefinition, OrchestratorError> {
        self.definitions
            .get(&run.definition_type)
            .ok_or_else(|| OrchestratorError::UnknownDefinition(run.definition_type.clone()))
    }

    /// Drive the phase loop to a terminal or paused state.
    pub async fn execute(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        let mut run = self.load_run(run_id)?;
        match run.status {
            RunStatus::Pending => {
                run.transition_to(RunStatus::Running, self.clock.epoch_ms())?;
                self.store.save(&run)?;
            }
            RunStatus::Running => {}
            other => {
                return Err(StateTransitionError { from: other, to: RunStatus::Running }.into());
            }
        }

        self.executing.lock().insert(run.id.to_string());
        let result = self.execute_inner(&mut run).await;
        self.executing.lock().remove(run.id.as_str());
        result
    }

    async fn execute_inner(&self, run: &mut WorkflowRun) -> Result<WorkflowRun, OrchestratorError> {
        let definition = self.definition_of(run)?.clone();
        let (cancel, pause) = self.signals_for(&run.id);
        let paths = self.store.paths(&run.id);
        let workspace_dir = workspace::prepare(&run.workspace, &paths).await?;

        // Per-call retry budget; iteration counts persist across resumes.
        let mut attempts: HashMap<String, u32> = HashMap::new();

        loop {
            if cancel.is_cancelled() {
                return Ok(self.finish_cancelled(run));
            }
            if pause.is_cancelled() {
                // Keep current_phase so resume re-enters this phase.
                run.transition_to(RunStatus::Paused, self.clock.epoch_ms())?;
                self.emit(run, EventKind::WorkflowPaused, None);
                return Ok(run.clone());
            }

            let phase_id = match &run.current_phase {
                Some(phase) => phase.clone(),
                None => match definition.phases.first() {
                    Some(first) => first.id.clone(),
                    None => {
                        return Err(OrchestratorError::Validation(
                            "definition has no phases".to_string(),
                        ))
                    }
                },
            };
            let Some(phase) = definition.phase(&phase_id).cloned() else {
                return Err(OrchestratorError::UnknownPhase(phase_id));
            };

            if run.iterations_of(&phase_id) >= definition.max_review_iterations {
                let error = OrchestratorError::MaxIterations {
                    phase: phase_id.clone(),
                    max: definition.max_review_iterations,
                };
                self.fail_run(run, &phase_id, error.to_string(), false);
                return Err(error);
            }

            let iteration = run.enter_phase(&phase_id);
            self.store.save(run)?;
            if iteration > 1 {
                self.emit(
                    run,
                    EventKind::IterationStarted,
                    Some(serde_json::json!({ "phaseId": phase_id, "iteration": iteration })),
                );
            }

            let ctx = EngineContext {
                run_id: run.id,
                task: run.input.task.clone(),
                phase_id: phase_id.clone(),
                iteration,
                workspace: workspace_dir.clone(),
                paths: paths.clone(),
                phase_history: run.phase_history.clone(),
                agent: phase.agent.clone(),
                timeout_ms: phase.settings.timeout_ms,
                live: run.input.live(),
                continue_on_failure: run
                    .input
                    .context
                    .get("continueOnFailure")
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true),
                runner: Arc::clone(&self.runner),
                cancel: cancel.clone(),
                progress: crate::progress::ProgressSink::none(),
            };

            let engine = engine_for(phase.engine);
            let validation = engine.validate(&ctx);
            if !validation.valid {
                if engine.validation_is_fatal() {
                    let message = validation.errors.join("; ");
                    self.fail_run(run, &phase_id, format!("validation failed: {message}"), false);
                    return Err(OrchestratorError::Validation(message));
                }
                tracing::warn!(
                    run_id = %run.id,
                    phase = %phase_id,
                    errors = ?validation.errors,
                    "phase validation failed (non-fatal)"
                );
            }

            self.emit(
                run,
                EventKind::PhaseStarted,
                Some(serde_json::json!({ "phaseId": phase_id, "iteration": iteration })),
            );

            let result = engine.execute(&ctx).await;

            // A cancelled run writes nothing further.
            if cancel.is_cancelled() {
                return Ok(self.finish_cancelled(run));
            }

            run.record_phase(PhaseExecution {
                phase_id: phase_id.clone(),
                iteration,
                status: if result.success { PhaseStatus::Completed } else { PhaseStatus::Failed },
                artifacts: result.artifacts.clone(),
                metrics: result.metrics.clone(),
                log_path: Some(ctx.logs_dir()),
            });

            if result.success {
                self.emit(
                    run,
                    EventKind::PhaseCompleted,
                    Some(serde_json::json!({ "phaseId": phase_id, "iteration": iteration })),
                );
                for artifact in &result.artifacts {
                    self.emit(
                        run,
                        EventKind::ArtifactCreated,
                        Some(serde_json::json!({
                            "phaseId": phase_id,
                            "iteration": iteration,
                            "name": artifact,
                        })),
                    );
                }

                match self.next_phase(&definition, &phase, &ctx) {
                    Some(next) => {
                        run.current_phase = Some(next);
                        self.store.save(run)?;
                    }
                    None => {
                        run.transition_to(RunStatus::Completed, self.clock.epoch_ms())?;
                        self.emit(run, EventKind::WorkflowCompleted, None);
                        tracing::info!(run_id = %run.id, "workflow completed");
                        return Ok(run.clone());
                    }
                }
            } else {
                let message = result.error.unwrap_or_else(|| "phase failed".to_string());
                self.emit(
                    run,
                    EventKind::PhaseFailed,
                    Some(serde_json::json!({
                        "phaseId": phase_id,
                        "iteration": iteration,
                        "error": message,
                    })),
                );

                let attempt = attempts.entry(phase_id.clone()).or_insert(0);
                *attempt += 1;
                if *attempt <= phase.settings.retries {
                    tracing::warn!(
                        run_id = %run.id,
                        phase = %phase_id,
                        attempt = *attempt,
                        "phase failed, retrying"
                    );
                    continue;
                }

                let recoverable = is_recoverable_message(&message);
                self.fail_run(run, &phase_id, message, recoverable);
                return Ok(run.clone());
            }
        }
    }

    /// First matching transition wins; otherwise definition order; past the
    /// last phase the run completes.
    fn next_phase(
        &self,
        definition: &WorkflowDefinition,
        phase: &PhaseDefinition,
        ctx: &EngineContext,
    ) -> Option<String> {
        let artifacts = self.load_artifacts(ctx);
        for rule in &phase.transitions {
            if rule.condition.matches(&artifacts) {
                return Some(rule.next_phase.clone());
            }
        }
        definition.next_phase_after(&phase.id).map(|p| p.id.clone())
    }

    /// Parse this iteration's JSON artifacts, keyed kebab→camel.
    fn load_artifacts(&self, ctx: &EngineContext) -> serde_json::Map<String, serde_json::Value> {
        let mut map = serde_json::Map::new();
        let dir = ctx.artifacts_dir();
        let Ok(entries) = std::fs::read_dir(&dir) else {
            return map;
        };
        for entry in entries.flatten() {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.ends_with(".json") {
                continue;
            }
            let Ok(raw) = std::fs::read_to_string(entry.path()) else {
                continue;
            };
            if let Ok(value) = serde_json::from_str(&raw) {
                map.insert(artifact_key(&name), value);
            }
        }
        map
    }

    fn fail_run(&self, run: &mut WorkflowRun, phase_id: &str, message: String, recoverable: bool) {
        run.set_error(phase_id, message.clone(), recoverable);
        if let Err(e) = run.transition_to(RunStatus::Failed, self.clock.epoch_ms()) {
            tracing::error!(run_id = %run.id, error = %e, "failed run could not transition");
        }
        self.emit(
            run,
            EventKind::WorkflowFailed,
            Some(serde_json::json!({ "error": message, "recoverable": recoverable })),
        );
        tracing::warn!(run_id = %run.id, phase = phase_id, %message, "workflow failed");
    }

    fn finish_cancelled(&self, run: &mut WorkflowRun) -> WorkflowRun {
        if !run.is_terminal() {
            if let Err(e) = run.transition_to(RunStatus::Cancelled, self.clock.epoch_ms()) {
                tracing::error!(run_id = %run.id, error = %e, "cancel transition failed");
            }
            self.emit(run, EventKind::WorkflowCancelled, None);
        }
        run.clone()
    }

    /// Pause a running run. Takes effect at the next phase boundary when a
    /// phase loop is active.
    pub fn pause(&self, run_id: &str) -> Result<(), OrchestratorError> {
        let mut run = self.load_run(run_id)?;
        let (_, pause) = self.signals_for(run_id);
        pause.cancel();

        if !self.executing.lock().contains(run_id) {
            run.transition_to(RunStatus::Paused, self.clock.epoch_ms())?;
            self.emit(&run, EventKind::WorkflowPaused, None);
        }
        Ok(())
    }

    /// Resume a paused or recoverably-failed run.
    pub async fn resume(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        let mut run = self.load_run(run_id)?;
        match run.status {
            RunStatus::Paused => {}
            RunStatus::Failed => {
                if run.retry_count >= run.max_retries {
                    return Err(OrchestratorError::MaxRetries { max: run.max_retries });
                }
                // Failed runs cleared current_phase; pick the loop back up
                // at the recorded failure point, then clear the stale error
                // so a successful replay ends clean.
                if run.current_phase.is_none() {
                    run.current_phase = run.error.as_ref().map(|e| e.phase.clone());
                }
                run.error = None;
                run.completed_at = None;
            }
            other => {
                return Err(StateTransitionError { from: other, to: RunStatus::Running }.into());
            }
        }

        run.retry_count += 1;
        run.resumed_at = Some(self.clock.epoch_ms());
        run.transition_to(RunStatus::Running, self.clock.epoch_ms())?;
        self.reset_signals(run_id);
        self.emit(&run, EventKind::WorkflowResumed, None);

        self.execute(run_id).await
    }

    /// Cancel a run. Quietly does nothing for terminal runs.
    pub fn cancel(&self, run_id: &str) -> Result<(), OrchestratorError> {
        let mut run = self.load_run(run_id)?;
        if run.is_terminal() {
            return Ok(());
        }

        let (cancel, _) = self.signals_for(run_id);
        cancel.cancel();

        if !self.executing.lock().contains(run_id) {
            run.transition_to(RunStatus::Cancelled, self.clock.epoch_ms())?;
            self.emit(&run, EventKind::WorkflowCancelled, None);
        }
        Ok(())
    }

    /// All runs, newest first.
    pub fn list(&self) -> Result<Vec<WorkflowRun>, OrchestratorError> {
        let mut runs = Vec::new();
        for id in self.store.list_runs()? {
            if let Some(run) = self.store.load(&id)? {
                runs.push(run);
            }
        }
        runs.reverse();
        Ok(runs)
    }

    pub fn status(&self, run_id: &str) -> Result<WorkflowRun, OrchestratorError> {
        self.load_run(run_id)
    }
}

/// Timeouts and connection failures leave the run resumable.
fn is_recoverable_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    ["timeout", "timed out", "connection", "network"].iter().any(|m| lower.contains(m))
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
