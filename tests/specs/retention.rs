// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Partial retention: logs-only cleanup preserves state and approvals.

use dc_core::{FakeClock, RetentionConfig, RunInput, RunStatus, WorkspaceSpec};
use dc_engine::{Orchestrator, Runner, StubRunner};
use dc_storage::{
    ApprovalAction, ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStore, CleanupLog,
    CleanupMode, CleanupRequest, RememberScope, RetentionSweeper, RunStore,
};
use std::sync::Arc;
use tempfile::tempdir;

#[tokio::test]
async fn logs_only_cleanup_preserves_state_and_approvals() {
    let data = tempdir().unwrap();
    let workspace = tempdir().unwrap();
    std::fs::write(workspace.path().join("package.json"), r#"{"name": "demo"}"#).unwrap();
    std::fs::create_dir(workspace.path().join(".git")).unwrap();

    let store = RunStore::new(data.path().join("workflows"));
    let clock = FakeClock::new();
    let orchestrator =
        Orchestrator::new(store.clone(), Arc::new(StubRunner) as Arc<dyn Runner>, clock.clone());

    // Two completed runs.
    let mut run_ids = Vec::new();
    for task in ["first task", "second task"] {
        let run = orchestrator
            .start(
                "dev-cycle",
                RunInput::new(task, workspace.path()),
                WorkspaceSpec::in_place(workspace.path()),
            )
            .unwrap();
        let done = orchestrator.execute(&run.id).await.unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        run_ids.push(done.id);
        clock.advance(std::time::Duration::from_secs(1));
    }

    // Seed an approvals stream and phase logs for both runs.
    let approvals = ApprovalStore::new(store.workflows_root());
    for id in &run_ids {
        approvals
            .save(&ApprovalRecord {
                request: ApprovalRequest::new(
                    *id,
                    "execution",
                    "write",
                    ApprovalAction::file("file_write", "src/x.ts"),
                    1,
                ),
                decision: ApprovalDecision::Approved,
                decided_at: 2,
                remember: false,
                remember_scope: RememberScope::Once,
            })
            .unwrap();
        let logs = store.paths(id).logs_dir("planning", 1);
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("runner.log"), vec![b'x'; 128]).unwrap();
    }

    // Expected freed bytes: every phase logs subtree plus events.jsonl.
    let expected: u64 = run_ids
        .iter()
        .map(|id| {
            let paths = store.paths(id);
            let mut total = std::fs::metadata(paths.events_log()).unwrap().len();
            let phases = paths.phases_root();
            for entry in std::fs::read_dir(&phases).unwrap() {
                let logs = entry.unwrap().path().join("logs");
                if logs.is_dir() {
                    for file in std::fs::read_dir(&logs).unwrap() {
                        total += file.unwrap().metadata().unwrap().len();
                    }
                }
            }
            total
        })
        .sum();

    let sweeper = RetentionSweeper::new(
        store.clone(),
        RetentionConfig::default(),
        CleanupLog::new(data.path().join("cleanup.jsonl")),
        clock,
    );
    let report = sweeper.sweep(&CleanupRequest::mode(CleanupMode::Logs)).unwrap();

    assert_eq!(report.deleted, 2);
    assert_eq!(report.freed_bytes, expected);

    for id in &run_ids {
        let paths = store.paths(id);
        assert!(paths.run_state().exists());
        assert!(store.workflows_root().join(id.as_str()).join("approvals.jsonl").exists());
        assert!(!paths.events_log().exists());
        assert!(!paths.logs_dir("planning", 1).exists());
        // Artifacts untouched in logs mode.
        assert!(paths.artifacts_dir("planning", 1).join("plan.md").exists());
    }
}
