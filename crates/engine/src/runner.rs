// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runner abstraction: how a phase invokes the external code-generation
//! agent. Stub for deterministic runs, live for real agent processes.

use crate::progress::ProgressSink;
use async_trait::async_trait;
use dc_core::RunId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// `wf-{runId}-{phaseId}-{iteration}`.
pub fn session_id(run_id: &RunId, phase_id: &str, iteration: u32) -> String {
    format!("wf-{run_id}-{phase_id}-{iteration}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerRequest {
    pub session_id: String,
    pub prompt: String,
    pub workspace_path: PathBuf,
    pub timeout_ms: u64,
    pub provider: String,
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerMetrics {
    pub duration_ms: u64,
    pub provider: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerOutcome {
    pub success: bool,
    pub output: String,
    pub error: Option<String>,
    pub metrics: RunnerMetrics,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunnerError {
    /// Canonical cancellation error: no artifacts were written.
    #[error("aborted")]
    Aborted,
    #[error("agent timed out after {timeout_ms} ms (attempt {attempt})")]
    Timeout { timeout_ms: u64, attempt: u32 },
    #[error("{message} (attempt {attempt})")]
    Failed { message: String, attempt: u32, recoverable: bool },
    #[error("action denied by policy: {reason}")]
    Denied { reason: String },
}

impl RunnerError {
    pub fn is_recoverable(&self) -> bool {
        match self {
            RunnerError::Timeout { .. } => true,
            RunnerError::Failed { recoverable, .. } => *recoverable,
            RunnerError::Aborted | RunnerError::Denied { .. } => false,
        }
    }
}

#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(
        &self,
        request: RunnerRequest,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<RunnerOutcome, RunnerError>;
}

/// Authorizes one enforced action before the runner performs it.
#[async_trait]
pub trait ActionGate: Send + Sync {
    /// `Err(reason)` denies the action.
    async fn authorize(
        &self,
        action: dc_storage::ApprovalAction,
        session_key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), String>;
}

/// Deterministic runner: succeeds immediately, echoing a canned body.
#[derive(Debug, Clone, Default)]
pub struct StubRunner;

#[async_trait]
impl Runner for StubRunner {
    async fn run(
        &self,
        request: RunnerRequest,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<RunnerOutcome, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Aborted);
        }
        progress.status(format!("stub agent session {}", request.session_id));
        Ok(RunnerOutcome {
            success: true,
            output: format!("stub response for session {}", request.session_id),
            error: None,
            metrics: RunnerMetrics { duration_ms: 0, provider: request.provider },
        })
    }
}

/// Invokes the external agent binary, retrying transient failures with
/// exponential backoff.
pub struct LiveRunner {
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub gate: Option<Arc<dyn ActionGate>>,
}

impl Default for LiveRunner {
    fn default() -> Self {
        Self { max_retries: 2, backoff_base_ms: 1_000, gate: None }
    }
}

impl LiveRunner {
    pub fn with_gate(gate: Arc<dyn ActionGate>) -> Self {
        Self { gate: Some(gate), ..Default::default() }
    }

    async fn invoke_once(
        &self,
        request: &RunnerRequest,
        cancel: &CancellationToken,
        attempt: u32,
    ) -> Result<RunnerOutcome, RunnerError> {
        let start = std::time::Instant::now();

        let mut command = tokio::process::Command::new(&request.provider);
        command
            .arg("--print")
            .current_dir(&request.workspace_path)
            .env("DC_SESSION_ID", &request.session_id)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(model) = &request.model {
            command.arg("--model").arg(model);
        }

        let mut child = command.spawn().map_err(|e| RunnerError::Failed {
            message: format!("failed to spawn agent {}: {e}", request.provider),
            attempt,
            recoverable: false,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(request.prompt.as_bytes()).await.map_err(|e| RunnerError::Failed {
                message: format!("failed to write agent prompt: {e}"),
                attempt,
                recoverable: true,
            })?;
            drop(stdin);
        }

        let wait = child.wait_with_output();
        let output = tokio::select! {
            () = cancel.cancelled() => return Err(RunnerError::Aborted),
            result = tokio::time::timeout(Duration::from_millis(request.timeout_ms), wait) => {
                match result {
                    Err(_) => {
                        return Err(RunnerError::Timeout { timeout_ms: request.timeout_ms, attempt });
                    }
                    Ok(Err(e)) => {
                        return Err(RunnerError::Failed {
                            message: format!("agent process error: {e}"),
                            attempt,
                            recoverable: true,
                        });
                    }
                    Ok(Ok(output)) => output,
                }
            }
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            Ok(RunnerOutcome {
                success: true,
                output: stdout,
                error: None,
                metrics: RunnerMetrics { duration_ms, provider: request.provider.clone() },
            })
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(RunnerError::Failed {
                message: format!(
                    "agent exited with {}: {}",
                    output.status.code().unwrap_or(-1),
                    stderr.trim()
                ),
                attempt,
                recoverable: is_transient(&stderr),
            })
        }
    }
}

/// Connection-shaped failures are worth retrying.
fn is_transient(stderr: &str) -> bool {
    let lower = stderr.to_lowercase();
    ["timeout", "timed out", "connection", "network", "temporarily", "rate limit", "overloaded"]
        .iter()
        .any(|marker| lower.contains(marker))
}

#[async_trait]
impl Runner for LiveRunner {
    async fn run(
        &self,
        request: RunnerRequest,
        cancel: &CancellationToken,
        progress: &ProgressSink,
    ) -> Result<RunnerOutcome, RunnerError> {
        if let Some(gate) = &self.gate {
            let action = dc_storage::ApprovalAction::command("exec", request.provider.clone());
            gate.authorize(action, &request.session_id, cancel)
                .await
                .map_err(|reason| RunnerError::Denied { reason })?;
        }

        let mut last_error = RunnerError::Failed {
            message: "agent never invoked".to_string(),
            attempt: 0,
            recoverable: false,
        };
        for attempt in 1..=self.max_retries + 1 {
            if cancel.is_cancelled() {
                return Err(RunnerError::Aborted);
            }
            progress.status(format!("invoking agent (attempt {attempt})"));
            match self.invoke_once(&request, cancel, attempt).await {
                Ok(outcome) => return Ok(outcome),
                Err(RunnerError::Aborted) => return Err(RunnerError::Aborted),
                Err(e) if e.is_recoverable() && attempt <= self.max_retries => {
                    let backoff = self.backoff_base_ms * (1 << (attempt - 1));
                    tracing::warn!(
                        session_id = %request.session_id,
                        attempt,
                        backoff_ms = backoff,
                        error = %e,
                        "agent attempt failed, backing off"
                    );
                    tokio::select! {
                        () = cancel.cancelled() => return Err(RunnerError::Aborted),
                        () = tokio::time::sleep(Duration::from_millis(backoff)) => {}
                    }
                    last_error = e;
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error)
    }
}

/// Test runner fed a queue of scripted responses.
#[cfg(any(test, feature = "test-support"))]
pub struct ScriptedRunner {
    responses: parking_lot::Mutex<std::collections::VecDeque<Result<String, RunnerError>>>,
    pub requests: parking_lot::Mutex<Vec<RunnerRequest>>,
}

#[cfg(any(test, feature = "test-support"))]
impl ScriptedRunner {
    pub fn new(responses: Vec<Result<String, RunnerError>>) -> Self {
        Self {
            responses: parking_lot::Mutex::new(responses.into_iter().collect()),
            requests: parking_lot::Mutex::new(Vec::new()),
        }
    }

    pub fn of_outputs(outputs: Vec<&str>) -> Self {
        Self::new(outputs.into_iter().map(|o| Ok(o.to_string())).collect())
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Runner for ScriptedRunner {
    async fn run(
        &self,
        request: RunnerRequest,
        cancel: &CancellationToken,
        _progress: &ProgressSink,
    ) -> Result<RunnerOutcome, RunnerError> {
        if cancel.is_cancelled() {
            return Err(RunnerError::Aborted);
        }
        let provider = request.provider.clone();
        self.requests.lock().push(request);
        match self.responses.lock().pop_front() {
            Some(Ok(output)) => Ok(RunnerOutcome {
                success: true,
                output,
                error: None,
                metrics: RunnerMetrics { duration_ms: 1, provider },
            }),
            Some(Err(e)) => Err(e),
            None => Err(RunnerError::Failed {
                message: "scripted runner exhausted".to_string(),
                attempt: 1,
                recoverable: false,
            }),
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
