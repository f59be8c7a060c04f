// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared engine contract.

use crate::progress::ProgressSink;
use crate::runner::Runner;
use async_trait::async_trait;
use dc_core::{AgentConfig, EngineKind, PhaseExecution, PhaseMetrics, RunId};
use dc_storage::RunPaths;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything an engine needs to run one phase iteration.
#[derive(Clone)]
pub struct EngineContext {
    pub run_id: RunId,
    pub task: String,
    pub phase_id: String,
    pub iteration: u32,
    /// Directory the agent executes in.
    pub workspace: PathBuf,
    pub paths: RunPaths,
    /// History so far, for locating prior phases' artifacts.
    pub phase_history: Vec<PhaseExecution>,
    pub agent: AgentConfig,
    pub timeout_ms: u64,
    /// Live mode invokes the runner; stub mode produces deterministic artifacts.
    pub live: bool,
    /// Single task failure aborts the phase when false.
    pub continue_on_failure: bool,
    pub runner: Arc<dyn Runner>,
    pub cancel: CancellationToken,
    pub progress: ProgressSink,
}

impl EngineContext {
    pub fn artifacts_dir(&self) -> PathBuf {
        self.paths.artifacts_dir(&self.phase_id, self.iteration)
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.paths.logs_dir(&self.phase_id, self.iteration)
    }

    /// Write one artifact into this iteration's artifacts dir.
    pub fn write_artifact(&self, name: &str, contents: &[u8]) -> std::io::Result<()> {
        let dir = self.artifacts_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(name), contents)?;
        self.progress.artifact(name);
        Ok(())
    }

    /// Capture runner output under `logs/`.
    pub fn write_log(&self, name: &str, contents: &str) -> std::io::Result<()> {
        let dir = self.logs_dir();
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(name), contents)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Validation {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl Validation {
    pub fn ok() -> Self {
        Self { valid: true, errors: Vec::new() }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineResult {
    pub success: bool,
    /// Ordered artifact file names written this iteration.
    pub artifacts: Vec<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub metrics: PhaseMetrics,
}

impl EngineResult {
    pub fn failure(error: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            success: false,
            artifacts: Vec::new(),
            output: None,
            error: Some(error.into()),
            metrics: PhaseMetrics { duration_ms },
        }
    }
}

#[async_trait]
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    /// Whether a failed validation aborts the phase. The reviewer degrades
    /// to a stub review instead.
    fn validation_is_fatal(&self) -> bool {
        true
    }

    fn validate(&self, ctx: &EngineContext) -> Validation;

    async fn execute(&self, ctx: &EngineContext) -> EngineResult;
}

/// The engine implementing a phase kind.
pub fn engine_for(kind: EngineKind) -> &'static dyn Engine {
    match kind {
        EngineKind::Planner => &crate::planner::PlannerEngine,
        EngineKind::Executor => &crate::executor::ExecutorEngine,
        EngineKind::Reviewer => &crate::reviewer::ReviewerEngine,
    }
}
