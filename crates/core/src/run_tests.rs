// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::FakeClock;

#[yare::parameterized(
    pending_to_running     = { RunStatus::Pending, RunStatus::Running, true },
    pending_to_cancelled   = { RunStatus::Pending, RunStatus::Cancelled, true },
    pending_to_completed   = { RunStatus::Pending, RunStatus::Completed, false },
    running_to_paused      = { RunStatus::Running, RunStatus::Paused, true },
    running_to_completed   = { RunStatus::Running, RunStatus::Completed, true },
    running_to_failed      = { RunStatus::Running, RunStatus::Failed, true },
    running_to_cancelled   = { RunStatus::Running, RunStatus::Cancelled, true },
    paused_to_running      = { RunStatus::Paused, RunStatus::Running, true },
    paused_to_cancelled    = { RunStatus::Paused, RunStatus::Cancelled, true },
    paused_to_completed    = { RunStatus::Paused, RunStatus::Completed, false },
    failed_to_running      = { RunStatus::Failed, RunStatus::Running, true },
    completed_to_running   = { RunStatus::Completed, RunStatus::Running, false },
    cancelled_to_running   = { RunStatus::Cancelled, RunStatus::Running, false },
    completed_to_failed    = { RunStatus::Completed, RunStatus::Failed, false },
)]
fn transition_table(from: RunStatus, to: RunStatus, legal: bool) {
    assert_eq!(from.can_transition_to(to), legal);
}

fn test_run() -> WorkflowRun {
    let clock = FakeClock::new();
    WorkflowRun::new(
        "dev-cycle",
        RunInput::new("add endpoint", "/tmp/repo"),
        WorkspaceSpec::in_place("/tmp/repo"),
        3,
        &clock,
    )
}

#[test]
fn new_run_is_pending_without_phase() {
    let run = test_run();
    assert_eq!(run.status, RunStatus::Pending);
    assert!(run.current_phase.is_none());
    assert!(run.phase_history.is_empty());
    assert!(run.started_at.is_none());
}

#[test]
fn start_transition_stamps_started_at() {
    let mut run = test_run();
    run.transition_to(RunStatus::Running, 2_000).unwrap();
    assert_eq!(run.started_at, Some(2_000));
    assert!(run.completed_at.is_none());
}

#[test]
fn terminal_transition_stamps_completed_at_and_clears_phase() {
    let mut run = test_run();
    run.transition_to(RunStatus::Running, 2_000).unwrap();
    run.enter_phase("planning");
    assert_eq!(run.current_phase.as_deref(), Some("planning"));

    run.transition_to(RunStatus::Completed, 3_000).unwrap();
    assert_eq!(run.completed_at, Some(3_000));
    assert!(run.current_phase.is_none());
    assert!(run.is_terminal());
}

#[test]
fn illegal_transition_is_rejected() {
    let mut run = test_run();
    let err = run.transition_to(RunStatus::Completed, 2_000).unwrap_err();
    assert_eq!(err, StateTransitionError { from: RunStatus::Pending, to: RunStatus::Completed });
    // Status unchanged on rejection
    assert_eq!(run.status, RunStatus::Pending);
}

#[test]
fn status_never_leaves_terminal() {
    let mut run = test_run();
    run.transition_to(RunStatus::Running, 1).unwrap();
    run.transition_to(RunStatus::Cancelled, 2).unwrap();
    for to in [
        RunStatus::Pending,
        RunStatus::Running,
        RunStatus::Paused,
        RunStatus::Completed,
        RunStatus::Failed,
    ] {
        assert!(run.transition_to(to, 3).is_err());
    }
}

#[test]
fn enter_phase_increments_iteration() {
    let mut run = test_run();
    assert_eq!(run.enter_phase("planning"), 1);
    assert_eq!(run.enter_phase("planning"), 2);
    assert_eq!(run.enter_phase("execution"), 1);
    assert_eq!(run.iterations_of("planning"), 2);
    assert_eq!(run.iterations_of("review"), 0);
}

#[test]
fn completed_executions_filters_status_and_phase() {
    let mut run = test_run();
    run.record_phase(PhaseExecution {
        phase_id: "planning".to_string(),
        iteration: 1,
        status: PhaseStatus::Failed,
        artifacts: vec![],
        metrics: PhaseMetrics::default(),
        log_path: None,
    });
    run.record_phase(PhaseExecution {
        phase_id: "planning".to_string(),
        iteration: 2,
        status: PhaseStatus::Completed,
        artifacts: vec!["plan.md".to_string(), "tasks.json".to_string()],
        metrics: PhaseMetrics { duration_ms: 12 },
        log_path: None,
    });

    let completed: Vec<_> = run.completed_executions("planning").collect();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].iteration, 2);
}

#[test]
fn run_json_uses_camel_case_keys() {
    let run = test_run();
    let json = serde_json::to_value(&run).unwrap();
    assert!(json.get("definitionType").is_some());
    assert!(json.get("createdAt").is_some());
    assert!(json.get("phaseHistory").is_some());
    assert_eq!(json["status"], "pending");
}

#[test]
fn live_flag_reads_from_context() {
    let input = RunInput::new("t", "/tmp/r");
    assert!(!input.live());
    assert!(input.with_live(true).live());
}

#[test]
fn workspace_mode_serializes_kebab() {
    let json = serde_json::to_string(&WorkspaceMode::InPlace).unwrap();
    assert_eq!(json, "\"in-place\"");
}
