// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `dc workflow` command handlers.

use crate::context::AppContext;
use anyhow::Result;
use clap::{Args, Subcommand};
use dc_core::{RunInput, RunStatus, WorkspaceMode, WorkspaceSpec};
use dc_engine::{LiveRunner, Orchestrator, OrchestratorOptions, PolicyGate, Runner, StubRunner};
use dc_policy::approval::CliPrompt;
use dc_policy::{ApprovalFlow, PolicyEngine, RateLimiter, WorkflowPolicy};
use dc_storage::{
    ApprovalStore, CleanupLog, CleanupMode, CleanupRequest, EventLog, RetentionSweeper,
};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args)]
pub struct WorkflowArgs {
    #[command(subcommand)]
    pub command: WorkflowCommand,
}

#[derive(Subcommand)]
pub enum WorkflowCommand {
    /// Start a dev-cycle run
    Start {
        /// Task description for the agents
        task: String,
        /// Target repository
        #[arg(long, default_value = ".")]
        repo: PathBuf,
        /// Invoke real agents instead of the deterministic stub
        #[arg(long)]
        live: bool,
        /// Workspace mode: in-place, worktree, or copy
        #[arg(long, default_value = "in-place")]
        mode: String,
        /// Workflow definition type
        #[arg(long, default_value = "dev-cycle")]
        definition: String,
    },
    /// Show one run's state
    Status { id: String },
    /// List runs, newest first
    List {
        /// Only show runs with this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Resume a paused or recoverably-failed run
    Resume { id: String },
    /// Cancel a run
    Cancel { id: String },
    /// Apply the retention policy
    Cleanup {
        #[arg(long)]
        dry_run: bool,
        /// Delete only phase logs and events.jsonl
        #[arg(long)]
        logs_only: bool,
        /// Delete only phase artifacts
        #[arg(long)]
        artifacts_only: bool,
        /// Only touch runs older than N days
        #[arg(long)]
        older_than: Option<u32>,
        /// Only touch runs with this terminal status
        #[arg(long)]
        status: Option<String>,
        /// Touch at most N runs
        #[arg(long)]
        max: Option<usize>,
    },
    /// Print a run's event log
    Logs { id: String },
}

fn parse_status(s: &str) -> Result<RunStatus> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| anyhow::anyhow!("invalid status: {s}"))
}

fn parse_mode(s: &str) -> Result<WorkspaceMode> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|_| anyhow::anyhow!("invalid workspace mode: {s}"))
}

fn orchestrator(app: &AppContext, live: bool) -> Orchestrator<dc_core::SystemClock> {
    orchestrator_for(app, live, None)
}

fn orchestrator_for(
    app: &AppContext,
    live: bool,
    workspace_root: Option<&std::path::Path>,
) -> Orchestrator<dc_core::SystemClock> {
    let runner: Arc<dyn Runner> = if live {
        // Live agents go through the policy gate: evaluation, interactive
        // approval with timeout, and the exec rate limiter.
        let timeout_ms = app.config.workflows.policy.approval_timeout_ms;
        let approvals = Arc::new(ApprovalStore::new(app.workflows_root()));
        let prompt = Arc::new(CliPrompt { timeout_secs: timeout_ms / 1_000 });
        let root = workspace_root
            .map(|p| p.to_path_buf())
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_default();
        let gate = PolicyGate::new(
            PolicyEngine::new(WorkflowPolicy::default()),
            ApprovalFlow::new(approvals, Some(prompt), timeout_ms, app.clock),
            RateLimiter::per_minute(60, app.clock),
            root,
            app.clock,
        );
        Arc::new(LiveRunner::with_gate(Arc::new(gate)))
    } else {
        Arc::new(StubRunner)
    };
    Orchestrator::new(app.run_store(), runner, app.clock).with_options(OrchestratorOptions::default())
}

pub async fn handle(args: WorkflowArgs, app: &AppContext) -> Result<()> {
    match args.command {
        WorkflowCommand::Start { task, repo, live, mode, definition } => {
            let orchestrator = orchestrator_for(app, live, Some(&repo));
            let input = RunInput::new(task, repo.clone()).with_live(live);
            let workspace = WorkspaceSpec {
                mode: parse_mode(&mode)?,
                target_repo: repo,
                branch: None,
                base_branch: None,
                require_git: false,
            };
            let run = orchestrator.start(&definition, input, workspace)?;
            println!("started {}", run.id);
            let done = orchestrator.execute(&run.id).await?;
            println!("run {} finished: {}", done.id, done.status);
            if let Some(error) = &done.error {
                anyhow::bail!("phase {}: {}", error.phase, error.message);
            }
            Ok(())
        }

        WorkflowCommand::Status { id } => {
            let orchestrator = orchestrator(app, false);
            let run = orchestrator.status(&id)?;
            println!("id:        {}", run.id);
            println!("status:    {}", run.status);
            println!("type:      {}", run.definition_type);
            println!("task:      {}", run.input.task);
            if let Some(phase) = &run.current_phase {
                println!("phase:     {phase}");
            }
            for execution in &run.phase_history {
                println!(
                    "  {:>2}-{} {} ({} ms) [{}]",
                    execution.iteration,
                    execution.phase_id,
                    execution.status,
                    execution.metrics.duration_ms,
                    execution.artifacts.join(", "),
                );
            }
            if let Some(error) = &run.error {
                println!("error:     {} ({})", error.message, error.phase);
            }
            Ok(())
        }

        WorkflowCommand::List { status } => {
            let filter = status.as_deref().map(parse_status).transpose()?;
            let orchestrator = orchestrator(app, false);
            for run in orchestrator.list()? {
                if filter.is_some_and(|f| f != run.status) {
                    continue;
                }
                println!("{}  {:<9}  {}", run.id, run.status.to_string(), run.input.task);
            }
            Ok(())
        }

        WorkflowCommand::Resume { id } => {
            let orchestrator = orchestrator(app, false);
            let run = orchestrator.resume(&id).await?;
            println!("run {} finished: {}", run.id, run.status);
            if let Some(error) = &run.error {
                anyhow::bail!("phase {}: {}", error.phase, error.message);
            }
            Ok(())
        }

        WorkflowCommand::Cancel { id } => {
            let orchestrator = orchestrator(app, false);
            orchestrator.cancel(&id)?;
            println!("cancelled {id}");
            Ok(())
        }

        WorkflowCommand::Cleanup { dry_run, logs_only, artifacts_only, older_than, status, max } => {
            if logs_only && artifacts_only {
                anyhow::bail!("--logs-only and --artifacts-only are mutually exclusive");
            }
            let mode = if logs_only {
                CleanupMode::Logs
            } else if artifacts_only {
                CleanupMode::Artifacts
            } else {
                CleanupMode::Full
            };
            let request = CleanupRequest {
                mode,
                dry_run,
                older_than_days: older_than,
                status: status.as_deref().map(parse_status).transpose()?,
                max,
            };
            let sweeper = RetentionSweeper::new(
                app.run_store(),
                app.config.workflows.retention.clone(),
                CleanupLog::new(app.cleanup_log()),
                app.clock,
            );
            let report = sweeper.sweep(&request)?;
            let verb = if dry_run { "would delete" } else { "deleted" };
            println!(
                "{verb} {} run(s), {} bytes freed ({} live skipped)",
                report.candidates.len(),
                report.freed_bytes,
                report.skipped_live,
            );
            for id in report.candidates {
                println!("  {id}");
            }
            Ok(())
        }

        WorkflowCommand::Logs { id } => {
            let store = app.run_store();
            let log = EventLog::new(store.paths(&id).events_log());
            for event in log.read_all()? {
                let data = event
                    .data
                    .map(|d| serde_json::to_string(&d).unwrap_or_default())
                    .unwrap_or_default();
                println!("{}  {}  {}", event.timestamp, event.kind, data);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
