// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runner::ScriptedRunner;
use crate::tasks::PlanTask;
use crate::test_support::ContextBuilder;
use dc_core::{PhaseExecution, PhaseMetrics};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;

fn plan_task(id: &str, priority: u32, depends_on: &[&str]) -> PlanTask {
    PlanTask {
        id: id.to_string(),
        title: format!("do {id}"),
        description: String::new(),
        status: TaskStatus::Pending,
        priority,
        depends_on: depends_on.iter().map(|s| s.to_string()).collect(),
        files: vec![],
        summary: None,
    }
}

fn completed_phase(phase_id: &str, iteration: u32, artifacts: &[&str]) -> PhaseExecution {
    PhaseExecution {
        phase_id: phase_id.to_string(),
        iteration,
        status: PhaseStatus::Completed,
        artifacts: artifacts.iter().map(|s| s.to_string()).collect(),
        metrics: PhaseMetrics::default(),
        log_path: None,
    }
}

/// Write a planning iteration's artifacts and the matching history entry.
fn seed_planning(
    ctx: &mut EngineContext,
    iteration: u32,
    tasks: &[PlanTask],
) {
    let dir = ctx.paths.artifacts_dir("planning", iteration);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("plan.md"), format!("plan iteration {iteration}")).unwrap();
    let list = TaskList { version: "1".to_string(), tasks: tasks.to_vec() };
    std::fs::write(dir.join("tasks.json"), serde_json::to_vec_pretty(&list).unwrap()).unwrap();
    ctx.phase_history.push(completed_phase("planning", iteration, &["plan.md", "tasks.json"]));
}

fn exec_context(workspace: &Path, runs: &Path) -> EngineContext {
    ContextBuilder::new().phase("execution", 1).build(workspace, runs)
}

#[tokio::test]
async fn stub_mode_completes_all_tasks_in_order() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let mut ctx = exec_context(workspace.path(), runs.path());
    seed_planning(
        &mut ctx,
        1,
        &[plan_task("task-2", 2, &["task-1"]), plan_task("task-1", 1, &[])],
    );

    let result = ExecutorEngine.execute(&ctx).await;
    assert!(result.success);
    assert_eq!(result.artifacts, vec!["tasks.json", "execution-report.json"]);

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.count_with_status(TaskStatus::Completed), 2);

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("execution-report.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(report["tasksCompleted"], 2);
    assert_eq!(report["tasksFailed"], 0);
    assert_eq!(report["success"], true);
}

#[tokio::test]
async fn selects_latest_planning_iteration() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let mut ctx = exec_context(workspace.path(), runs.path());

    // Planning iteration 1, then an execution that also produced tasks.json,
    // then planning iteration 2. The executor must read iteration 2.
    seed_planning(&mut ctx, 1, &[plan_task("stale-task", 1, &[])]);
    let exec_dir = ctx.paths.artifacts_dir("execution", 1);
    std::fs::create_dir_all(&exec_dir).unwrap();
    let stale = TaskList { version: "1".to_string(), tasks: vec![plan_task("from-exec", 1, &[])] };
    std::fs::write(exec_dir.join("tasks.json"), serde_json::to_vec(&stale).unwrap()).unwrap();
    ctx.phase_history.push(completed_phase("execution", 1, &["tasks.json", "execution-report.json"]));
    seed_planning(&mut ctx, 2, &[plan_task("fresh-task", 1, &[])]);

    ctx.iteration = 2;
    let result = ExecutorEngine.execute(&ctx).await;
    assert!(result.success);

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.tasks.len(), 1);
    assert_eq!(updated.tasks[0].id, "fresh-task");
}

#[tokio::test]
async fn validation_fails_without_planning_phase() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let ctx = exec_context(workspace.path(), runs.path());

    let validation = ExecutorEngine.validate(&ctx);
    assert!(!validation.valid);
    assert!(validation.errors[0].contains("no completed planning phase"));
}

#[tokio::test]
async fn live_mode_parses_file_markers() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let output = concat!(
        "--- SUMMARY ---\nAdded the endpoint.\n",
        "--- FILES CHANGED ---\nsrc/index.ts\n--- END ---\n"
    );
    let runner = Arc::new(ScriptedRunner::of_outputs(vec![output]));
    let mut ctx =
        ContextBuilder::new().phase("execution", 1).live(runner).build(workspace.path(), runs.path());
    seed_planning(&mut ctx, 1, &[plan_task("task-1", 1, &[])]);

    let result = ExecutorEngine.execute(&ctx).await;
    assert!(result.success);

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.tasks[0].files, vec!["src/index.ts"]);
    assert_eq!(updated.tasks[0].summary.as_deref(), Some("Added the endpoint."));
}

#[tokio::test]
async fn live_failure_marks_task_failed_and_phase_fails() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new(vec![
        Err(crate::runner::RunnerError::Failed {
            message: "agent crashed".to_string(),
            attempt: 1,
            recoverable: false,
        }),
        Ok(concat!(
            "--- SUMMARY ---\nok\n--- FILES CHANGED ---\nsrc/b.ts\n--- END ---\n"
        )
        .to_string()),
    ]));
    let mut ctx =
        ContextBuilder::new().phase("execution", 1).live(runner).build(workspace.path(), runs.path());
    seed_planning(&mut ctx, 1, &[plan_task("task-1", 1, &[]), plan_task("task-2", 2, &[])]);

    let result = ExecutorEngine.execute(&ctx).await;
    // continue_on_failure is true: task-2 still ran; the phase fails
    // because one task failed.
    assert!(!result.success);
    assert!(result.error.unwrap().contains("1 task(s) failed"));

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.task("task-1").unwrap().status, TaskStatus::Failed);
    assert_eq!(updated.task("task-2").unwrap().status, TaskStatus::Completed);
}

#[tokio::test]
async fn abort_on_failure_when_continue_disabled() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new(vec![Err(crate::runner::RunnerError::Failed {
        message: "agent crashed".to_string(),
        attempt: 1,
        recoverable: false,
    })]));
    let mut ctx =
        ContextBuilder::new().phase("execution", 1).live(runner).build(workspace.path(), runs.path());
    ctx.continue_on_failure = false;
    seed_planning(&mut ctx, 1, &[plan_task("task-1", 1, &[]), plan_task("task-2", 2, &[])]);

    let result = ExecutorEngine.execute(&ctx).await;
    assert!(!result.success);

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.task("task-2").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn unmet_dependency_skips_task() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::new(vec![Err(crate::runner::RunnerError::Failed {
        message: "boom".to_string(),
        attempt: 1,
        recoverable: false,
    })]));
    let mut ctx =
        ContextBuilder::new().phase("execution", 1).live(runner).build(workspace.path(), runs.path());
    seed_planning(
        &mut ctx,
        1,
        &[plan_task("task-1", 1, &[]), plan_task("task-2", 2, &["task-1"])],
    );

    let result = ExecutorEngine.execute(&ctx).await;
    assert!(!result.success);

    let updated: TaskList = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(updated.task("task-1").unwrap().status, TaskStatus::Failed);
    assert_eq!(updated.task("task-2").unwrap().status, TaskStatus::Skipped);
}

#[tokio::test]
async fn missing_markers_fail_the_task() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::of_outputs(vec!["I did it but forgot the markers"]));
    let mut ctx =
        ContextBuilder::new().phase("execution", 1).live(runner).build(workspace.path(), runs.path());
    seed_planning(&mut ctx, 1, &[plan_task("task-1", 1, &[])]);

    let result = ExecutorEngine.execute(&ctx).await;
    assert!(!result.success);
}
