// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dev-cycle end-to-end: happy path and the replan loop.

use dc_core::{FakeClock, RunInput, RunStatus, WorkspaceSpec};
use dc_engine::{Orchestrator, Runner, ScriptedRunner, StubRunner};
use dc_storage::RunStore;
use std::sync::Arc;
use tempfile::tempdir;

fn demo_workspace() -> tempfile::TempDir {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("package.json"), r#"{"name": "demo"}"#).unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    dir
}

#[tokio::test]
async fn happy_path_dev_cycle_stub() {
    let data = tempdir().unwrap();
    let workspace = demo_workspace();
    let orchestrator = Orchestrator::new(
        RunStore::new(data.path().join("workflows")),
        Arc::new(StubRunner) as Arc<dyn Runner>,
        FakeClock::new(),
    );

    let run = orchestrator
        .start(
            "dev-cycle",
            RunInput::new("Add hello endpoint", workspace.path()),
            WorkspaceSpec::in_place(workspace.path()),
        )
        .unwrap();
    let done = orchestrator.execute(&run.id).await.unwrap();

    assert_eq!(done.status, RunStatus::Completed);
    let phases: Vec<(String, u32)> =
        done.phase_history.iter().map(|p| (p.phase_id.clone(), p.iteration)).collect();
    assert_eq!(
        phases,
        [
            ("planning".to_string(), 1),
            ("execution".to_string(), 1),
            ("review".to_string(), 1),
            ("finalize".to_string(), 1),
        ]
    );

    let paths = orchestrator.store().paths(&done.id);

    // plan.md + tasks.json with at least four ordered tasks.
    assert!(paths.artifacts_dir("planning", 1).join("plan.md").exists());
    let tasks: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.artifacts_dir("planning", 1).join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert!(tasks["tasks"].as_array().unwrap().len() >= 4);
    assert_eq!(tasks["tasks"][0]["id"], "task-1");

    // After execution the first task completed and the report counts ≥ 4.
    let executed: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.artifacts_dir("execution", 1).join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(executed["tasks"][0]["id"], "task-1");
    assert_eq!(executed["tasks"][0]["status"], "completed");

    let report: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.artifacts_dir("execution", 1).join("execution-report.json"))
            .unwrap(),
    )
    .unwrap();
    assert!(report["tasksCompleted"].as_u64().unwrap() >= 4);

    let review: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.artifacts_dir("review", 1).join("review.json")).unwrap(),
    )
    .unwrap();
    assert!(review["approved"].is_boolean());
}

const EXEC_OUTPUT: &str =
    "--- SUMMARY ---\ndone\n--- FILES CHANGED ---\nsrc/app.ts\n--- END ---";

fn plan_output(task_id: &str) -> String {
    format!(
        concat!(
            "--- BEGIN plan.md ---\nplan for {id}\n--- END plan.md ---\n",
            "--- BEGIN tasks.json ---\n",
            "{{\"version\": \"1\", \"tasks\": [{{\"id\": \"{id}\", \"title\": \"t\", ",
            "\"status\": \"pending\", \"priority\": 1, \"dependsOn\": []}}]}}\n",
            "--- END tasks.json ---"
        ),
        id = task_id
    )
}

fn review_output(approved: bool) -> String {
    format!(
        concat!(
            "--- BEGIN review.json ---\n",
            "{{\"approved\": {approved}, \"overallScore\": 0.5, \"issues\": [], ",
            "\"recommendations\": []}}\n",
            "--- END review.json ---"
        ),
        approved = approved
    )
}

#[tokio::test]
async fn replan_loop_executes_second_plan() {
    let data = tempdir().unwrap();
    let workspace = demo_workspace();

    // Iteration 1 plan rejected; iteration 2 plan approved.
    let outputs = vec![
        plan_output("task-old"),
        EXEC_OUTPUT.to_string(),
        review_output(false),
        plan_output("task-new"),
        EXEC_OUTPUT.to_string(),
        review_output(true),
        review_output(true), // finalize
    ];
    let runner =
        ScriptedRunner::new(outputs.into_iter().map(Ok).collect::<Vec<_>>());
    let orchestrator = Orchestrator::new(
        RunStore::new(data.path().join("workflows")),
        Arc::new(runner) as Arc<dyn Runner>,
        FakeClock::new(),
    );

    let run = orchestrator
        .start(
            "dev-cycle",
            RunInput::new("build it", workspace.path()).with_live(true),
            WorkspaceSpec::in_place(workspace.path()),
        )
        .unwrap();
    let done = orchestrator.execute(&run.id).await.unwrap();
    assert_eq!(done.status, RunStatus::Completed, "{:?}", done.error);

    // The second execution must select tasks from planning iteration 2,
    // not from the first execution's own tasks.json.
    let paths = orchestrator.store().paths(&done.id);
    let executed: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(paths.artifacts_dir("execution", 2).join("tasks.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(executed["tasks"][0]["id"], "task-new");
    assert_eq!(executed["tasks"][0]["status"], "completed");
}
