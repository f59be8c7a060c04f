// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.

use crate::engine::EngineContext;
use crate::progress::ProgressSink;
use crate::runner::{Runner, StubRunner};
use dc_core::{AgentConfig, RunId};
use dc_storage::RunPaths;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for an [`EngineContext`] rooted in temp directories.
pub struct ContextBuilder {
    run_id: RunId,
    task: String,
    phase_id: String,
    iteration: u32,
    live: bool,
    runner: Arc<dyn Runner>,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            run_id: RunId::from_string("run-test"),
            task: "Add hello endpoint".to_string(),
            phase_id: "planning".to_string(),
            iteration: 1,
            live: false,
            runner: Arc::new(StubRunner),
        }
    }

    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = task.into();
        self
    }

    pub fn phase(mut self, phase_id: impl Into<String>, iteration: u32) -> Self {
        self.phase_id = phase_id.into();
        self.iteration = iteration;
        self
    }

    pub fn live(mut self, runner: Arc<dyn Runner>) -> Self {
        self.live = true;
        self.runner = runner;
        self
    }

    /// Build against a workspace dir and a workflows root dir.
    pub fn build(self, workspace: &Path, workflows_root: &Path) -> EngineContext {
        EngineContext {
            run_id: self.run_id,
            task: self.task,
            phase_id: self.phase_id,
            iteration: self.iteration,
            workspace: workspace.to_path_buf(),
            paths: RunPaths::new(workflows_root, self.run_id.as_str()),
            phase_history: Vec::new(),
            agent: AgentConfig::default(),
            timeout_ms: 10_000,
            live: self.live,
            continue_on_failure: true,
            runner: self.runner,
            cancel: CancellationToken::new(),
            progress: ProgressSink::none(),
        }
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}
