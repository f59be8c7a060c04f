// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor engine: runs the planned tasks in dependency order.

use crate::engine::{Engine, EngineContext, EngineResult, Validation};
use crate::markers::parse_task_report;
use crate::runner::{session_id, RunnerRequest};
use crate::tasks::{TaskList, TaskStatus};
use async_trait::async_trait;
use dc_core::{EngineKind, PhaseStatus};
use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecutionReport {
    tasks_total: usize,
    tasks_completed: usize,
    tasks_failed: usize,
    tasks_skipped: usize,
    success: bool,
}

/// Locate the task list from the latest completed planning phase.
///
/// Execution phases also emit `tasks.json`, so the selection only accepts
/// phases that produced `plan.md` alongside it; among those the highest
/// iteration wins.
fn latest_planning_tasks(ctx: &EngineContext) -> Option<(String, u32)> {
    ctx.phase_history
        .iter()
        .filter(|p| p.status == PhaseStatus::Completed)
        .filter(|p| {
            p.artifacts.iter().any(|a| a == "tasks.json")
                && p.artifacts.iter().any(|a| a == "plan.md")
        })
        .max_by_key(|p| p.iteration)
        .map(|p| (p.phase_id.clone(), p.iteration))
}

fn load_tasks(ctx: &EngineContext) -> Result<TaskList, String> {
    let (phase_id, iteration) =
        latest_planning_tasks(ctx).ok_or("no completed planning phase with tasks.json")?;
    let path = ctx.paths.artifacts_dir(&phase_id, iteration).join("tasks.json");
    let raw = std::fs::read_to_string(&path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).map_err(|e| format!("tasks.json parse error: {e}"))?;
    TaskList::validate(&value)
}

fn task_prompt(ctx: &EngineContext, task: &crate::tasks::PlanTask) -> String {
    format!(
        concat!(
            "You are the execution agent for a dev-cycle workflow.\n\n",
            "Overall goal:\n{goal}\n\n",
            "Current task ({id}): {title}\n{description}\n\n",
            "Apply the change in the workspace, then report:\n",
            "--- SUMMARY ---\n<what you did>\n",
            "--- FILES CHANGED ---\n<one path per line>\n",
            "--- END ---\n"
        ),
        goal = ctx.task,
        id = task.id,
        title = task.title,
        description = task.description,
    )
}

pub struct ExecutorEngine;

#[async_trait]
impl Engine for ExecutorEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Executor
    }

    fn validate(&self, ctx: &EngineContext) -> Validation {
        match load_tasks(ctx) {
            Ok(_) => Validation::ok(),
            Err(e) => Validation::fail(vec![e]),
        }
    }

    async fn execute(&self, ctx: &EngineContext) -> EngineResult {
        let start = std::time::Instant::now();
        let mut tasks = match load_tasks(ctx) {
            Ok(tasks) => tasks,
            Err(e) => return EngineResult::failure(e, elapsed_ms(start)),
        };

        let order = tasks.execution_order();
        let mut aborted_early = false;
        for task_id in order {
            if ctx.cancel.is_cancelled() {
                return EngineResult::failure("aborted", elapsed_ms(start));
            }
            let Some(task) = tasks.task(&task_id).cloned() else {
                continue;
            };
            if task.status == TaskStatus::Completed {
                continue;
            }

            // Dependencies that did not complete (or do not exist) poison
            // the task.
            let blocked = task.depends_on.iter().any(|dep| {
                !tasks.task(dep).is_some_and(|t| t.status == TaskStatus::Completed)
            });
            if blocked || aborted_early {
                if let Some(task) = tasks.task_mut(&task_id) {
                    task.status = TaskStatus::Skipped;
                }
                ctx.progress.task(format!("{task_id}: skipped"));
                continue;
            }

            ctx.progress.task(format!("{task_id}: {}", task.title));
            if ctx.live {
                let request = RunnerRequest {
                    session_id: session_id(&ctx.run_id, &ctx.phase_id, ctx.iteration),
                    prompt: task_prompt(ctx, &task),
                    workspace_path: ctx.workspace.clone(),
                    timeout_ms: ctx.timeout_ms,
                    provider: ctx.agent.provider.clone(),
                    model: ctx.agent.model.clone(),
                };
                match ctx.runner.run(request, &ctx.cancel, &ctx.progress).await {
                    Ok(outcome) => {
                        if let Err(e) = ctx.write_log(&format!("{task_id}.log"), &outcome.output) {
                            tracing::warn!(error = %e, "failed to write task log");
                        }
                        match parse_task_report(&outcome.output) {
                            Some(report) => {
                                if let Some(task) = tasks.task_mut(&task_id) {
                                    task.status = TaskStatus::Completed;
                                    task.files = report.files_changed;
                                    task.summary = Some(report.summary);
                                }
                            }
                            None => {
                                tracing::warn!(task_id, "task output missing report markers");
                                if let Some(task) = tasks.task_mut(&task_id) {
                                    task.status = TaskStatus::Failed;
                                    task.summary = Some("missing report markers".to_string());
                                }
                            }
                        }
                    }
                    Err(crate::runner::RunnerError::Aborted) => {
                        return EngineResult::failure("aborted", elapsed_ms(start));
                    }
                    Err(e) => {
                        ctx.progress.error(format!("{task_id}: {e}"));
                        if let Some(task) = tasks.task_mut(&task_id) {
                            task.status = TaskStatus::Failed;
                            task.summary = Some(e.to_string());
                        }
                    }
                }
            } else if let Some(task) = tasks.task_mut(&task_id) {
                task.status = TaskStatus::Completed;
                task.summary = Some(format!("completed (stub): {}", task.title));
            }

            let failed_now =
                tasks.task(&task_id).is_some_and(|t| t.status == TaskStatus::Failed);
            if failed_now && !ctx.continue_on_failure {
                aborted_early = true;
            }
        }

        let report = ExecutionReport {
            tasks_total: tasks.tasks.len(),
            tasks_completed: tasks.count_with_status(TaskStatus::Completed),
            tasks_failed: tasks.count_with_status(TaskStatus::Failed),
            tasks_skipped: tasks.count_with_status(TaskStatus::Skipped),
            // Phase success iff no task failed.
            success: tasks.count_with_status(TaskStatus::Failed) == 0,
        };

        let write = (|| -> std::io::Result<()> {
            let tasks_json = serde_json::to_vec_pretty(&tasks)?;
            let report_json = serde_json::to_vec_pretty(&report)?;
            ctx.write_artifact("tasks.json", &tasks_json)?;
            ctx.write_artifact("execution-report.json", &report_json)?;
            Ok(())
        })();
        if let Err(e) = write {
            return EngineResult::failure(e.to_string(), elapsed_ms(start));
        }

        EngineResult {
            success: report.success,
            artifacts: vec!["tasks.json".to_string(), "execution-report.json".to_string()],
            output: None,
            error: (!report.success).then(|| format!("{} task(s) failed", report.tasks_failed)),
            metrics: dc_core::PhaseMetrics { duration_ms: elapsed_ms(start) },
        }
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
