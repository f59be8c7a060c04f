// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run identifier and state machine.

use crate::clock::Clock;
use crate::id::RunId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Status of a workflow run.
///
/// Transitions:
/// `pending → running | cancelled`;
/// `running → paused | completed | failed | cancelled`;
/// `paused → running | cancelled`;
/// terminals: `completed`, `failed`, `cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled)
    }

    /// Whether the run counts against the live-run concurrency cap.
    pub fn is_live(self) -> bool {
        matches!(self, RunStatus::Running | RunStatus::Paused)
    }

    /// Check the transition table without mutating anything.
    pub fn can_transition_to(self, to: RunStatus) -> bool {
        use RunStatus::*;
        matches!(
            (self, to),
            (Pending, Running)
                | (Pending, Cancelled)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
                | (Paused, Running)
                | (Paused, Cancelled)
                | (Failed, Running)
        )
    }
}

crate::simple_display! {
    RunStatus {
        Pending => "pending",
        Running => "running",
        Paused => "paused",
        Completed => "completed",
        Failed => "failed",
        Cancelled => "cancelled",
    }
}

/// Requested status change violates the run state machine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("illegal status transition: {from} -> {to}")]
pub struct StateTransitionError {
    pub from: RunStatus,
    pub to: RunStatus,
}

/// Status of a single phase execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

crate::simple_display! {
    PhaseStatus {
        Pending => "pending",
        Running => "running",
        Completed => "completed",
        Failed => "failed",
        Skipped => "skipped",
    }
}

/// Timing data for a phase execution.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseMetrics {
    pub duration_ms: u64,
}

/// Immutable record of one phase execution (appended to `phase_history`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseExecution {
    pub phase_id: String,
    /// 1-based per phase.
    pub iteration: u32,
    pub status: PhaseStatus,
    /// Ordered artifact file names relative to the phase artifacts dir.
    pub artifacts: Vec<String>,
    pub metrics: PhaseMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
}

/// Original input snapshot for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunInput {
    pub task: String,
    pub repo_path: PathBuf,
    /// Opaque context map; `live` selects the live runner over the stub.
    #[serde(default)]
    pub context: serde_json::Map<String, serde_json::Value>,
}

impl RunInput {
    pub fn new(task: impl Into<String>, repo_path: impl Into<PathBuf>) -> Self {
        Self { task: task.into(), repo_path: repo_path.into(), context: Default::default() }
    }

    pub fn live(&self) -> bool {
        self.context.get("live").and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn with_live(mut self, live: bool) -> Self {
        self.context.insert("live".to_string(), serde_json::Value::Bool(live));
        self
    }
}

/// How the run's workspace is materialized from the target repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkspaceMode {
    #[serde(rename = "in-place")]
    InPlace,
    #[serde(rename = "worktree")]
    Worktree,
    #[serde(rename = "copy")]
    Copy,
}

crate::simple_display! {
    WorkspaceMode {
        InPlace => "in-place",
        Worktree => "worktree",
        Copy => "copy",
    }
}

/// Workspace selection and validation rules for a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    pub mode: WorkspaceMode,
    pub target_repo: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_branch: Option<String>,
    /// Require the target to be a git repository (worktree mode implies it).
    #[serde(default)]
    pub require_git: bool,
}

impl WorkspaceSpec {
    pub fn in_place(target_repo: impl Into<PathBuf>) -> Self {
        Self {
            mode: WorkspaceMode::InPlace,
            target_repo: target_repo.into(),
            branch: None,
            base_branch: None,
            require_git: false,
        }
    }
}

/// Error payload recorded on a failed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub phase: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Recoverable failures (timeout/network) can be resumed.
    pub recoverable: bool,
}

/// One execution of a workflow definition with a specific input and workspace.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowRun {
    pub id: RunId,
    pub definition_type: String,
    pub status: RunStatus,
    pub input: RunInput,
    pub workspace: WorkspaceSpec,
    /// Null iff status is pending or terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_phase: Option<String>,
    /// Append-only record of completed phase executions.
    #[serde(default)]
    pub phase_history: Vec<PhaseExecution>,
    /// Times each phase has been entered (1-based iterations).
    #[serde(default)]
    pub iteration_count: HashMap<String, u32>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,
    pub created_at: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
}

impl WorkflowRun {
    /// Create a pending run with a creation-sortable ID.
    pub fn new(
        definition_type: impl Into<String>,
        input: RunInput,
        workspace: WorkspaceSpec,
        max_retries: u32,
        clock: &impl Clock,
    ) -> Self {
        let created_at = clock.epoch_ms();
        Self {
            id: RunId::generate(created_at),
            definition_type: definition_type.into(),
            status: RunStatus::Pending,
            input,
            workspace,
            current_phase: None,
            phase_history: Vec::new(),
            iteration_count: HashMap::new(),
            retry_count: 0,
            max_retries,
            created_at,
            started_at: None,
            completed_at: None,
            resumed_at: None,
            error: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a status transition, enforcing the state machine.
    ///
    /// Entering `running` from `pending` stamps `started_at`; entering a
    /// terminal state stamps `completed_at` and clears `current_phase`.
    pub fn transition_to(
        &mut self,
        to: RunStatus,
        epoch_ms: u64,
    ) -> Result<(), StateTransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(StateTransitionError { from: self.status, to });
        }
        if self.status == RunStatus::Pending && to == RunStatus::Running {
            self.started_at = Some(epoch_ms);
        }
        self.status = to;
        if to.is_terminal() {
            self.completed_at = Some(epoch_ms);
            self.current_phase = None;
        }
        Ok(())
    }

    /// Record entry into a phase and return its 1-based iteration number.
    pub fn enter_phase(&mut self, phase_id: &str) -> u32 {
        let count = self.iteration_count.entry(phase_id.to_string()).or_insert(0);
        *count += 1;
        self.current_phase = Some(phase_id.to_string());
        *count
    }

    /// Number of times a phase has been entered.
    pub fn iterations_of(&self, phase_id: &str) -> u32 {
        self.iteration_count.get(phase_id).copied().unwrap_or(0)
    }

    /// Append an immutable phase execution record.
    pub fn record_phase(&mut self, execution: PhaseExecution) {
        debug_assert!(
            execution.status != PhaseStatus::Running || !self.has_running_phase(),
            "at most one running phase execution per run"
        );
        self.phase_history.push(execution);
    }

    pub fn has_running_phase(&self) -> bool {
        self.phase_history.iter().any(|p| p.status == PhaseStatus::Running)
    }

    /// Completed executions of the given phase, oldest first.
    pub fn completed_executions<'a>(&'a self, phase_id: &'a str) -> impl Iterator<Item = &'a PhaseExecution> + 'a {
        self.phase_history
            .iter()
            .filter(move |p| p.phase_id == phase_id && p.status == PhaseStatus::Completed)
    }

    /// Record a run failure payload.
    pub fn set_error(&mut self, phase: &str, message: impl Into<String>, recoverable: bool) {
        self.error = Some(RunError {
            phase: phase.to_string(),
            message: message.into(),
            stack: None,
            recoverable,
        });
    }
}

crate::builder! {
    pub struct WorkflowRunBuilder => WorkflowRun {
        into {
            definition_type: String = "dev-cycle",
        }
        set {
            id: RunId = RunId::generate(1_000_000),
            status: RunStatus = RunStatus::Pending,
            input: RunInput = RunInput::new("test task", "/tmp/repo"),
            workspace: WorkspaceSpec = WorkspaceSpec::in_place("/tmp/repo"),
            phase_history: Vec<PhaseExecution> = Vec::new(),
            iteration_count: HashMap<String, u32> = HashMap::new(),
            retry_count: u32 = 0,
            max_retries: u32 = 3,
            created_at: u64 = 1_000_000,
        }
        option {
            current_phase: String = None,
            started_at: u64 = None,
            completed_at: u64 = None,
            resumed_at: u64 = None,
            error: RunError = None,
        }
    }
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
