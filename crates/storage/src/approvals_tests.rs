// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn request(run: &str, phase: &str, action: ApprovalAction) -> ApprovalRequest {
    ApprovalRequest::new(RunId::from_string(run), phase, "needs approval", action, 1_000)
}

fn record(
    run: &str,
    phase: &str,
    action: ApprovalAction,
    decision: ApprovalDecision,
    remember: bool,
    scope: RememberScope,
) -> ApprovalRecord {
    ApprovalRecord {
        request: request(run, phase, action),
        decision,
        decided_at: 2_000,
        remember,
        remember_scope: scope,
    }
}

#[test]
fn save_appends_to_jsonl() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    let rec = record(
        "run-a",
        "execution",
        ApprovalAction::file("file_write", "src/index.ts"),
        ApprovalDecision::Approved,
        true,
        RememberScope::Run,
    );

    store.save(&rec).unwrap();
    store.save(&rec).unwrap();

    let contents = std::fs::read_to_string(dir.path().join("run-a/approvals.jsonl")).unwrap();
    assert_eq!(contents.lines().count(), 2);
}

#[test]
fn get_by_run_reads_file_after_restart() {
    let dir = tempdir().unwrap();
    let rec = record(
        "run-a",
        "execution",
        ApprovalAction::command("exec", "npm test"),
        ApprovalDecision::Denied,
        false,
        RememberScope::Once,
    );
    {
        let store = ApprovalStore::new(dir.path());
        store.save(&rec).unwrap();
    }

    // Fresh store, empty index: must hit the JSONL file.
    let store = ApprovalStore::new(dir.path());
    let records = store.get_by_run("run-a").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].decision, ApprovalDecision::Denied);
}

#[test]
fn find_matching_respects_run_scope() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::file("file_write", "src/index.ts"),
            ApprovalDecision::Approved,
            true,
            RememberScope::Run,
        ))
        .unwrap();

    // Same action from a different phase still matches with run scope.
    let req = request("run-a", "review", ApprovalAction::file("file_write", "src/index.ts"));
    let hit = store.find_matching(&req).unwrap().unwrap();
    assert!(hit.decision.is_approved());
}

#[test]
fn find_matching_phase_scope_requires_same_phase() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::file("file_write", "src/app.ts"),
            ApprovalDecision::Approved,
            true,
            RememberScope::Phase,
        ))
        .unwrap();

    let same_phase = request("run-a", "execution", ApprovalAction::file("file_write", "src/app.ts"));
    assert!(store.find_matching(&same_phase).unwrap().is_some());

    let other_phase = request("run-a", "review", ApprovalAction::file("file_write", "src/app.ts"));
    assert!(store.find_matching(&other_phase).unwrap().is_none());
}

#[test]
fn find_matching_once_never_matches() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::file("file_write", "src/app.ts"),
            ApprovalDecision::Approved,
            true,
            RememberScope::Once,
        ))
        .unwrap();

    let req = request("run-a", "execution", ApprovalAction::file("file_write", "src/app.ts"));
    assert!(store.find_matching(&req).unwrap().is_none());
}

#[test]
fn find_matching_ignores_unremembered() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::file("file_write", "src/app.ts"),
            ApprovalDecision::Approved,
            false,
            RememberScope::Run,
        ))
        .unwrap();

    let req = request("run-a", "execution", ApprovalAction::file("file_write", "src/app.ts"));
    assert!(store.find_matching(&req).unwrap().is_none());
}

#[test]
fn find_matching_normalizes_paths() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::file("file_write", "src/./index.ts"),
            ApprovalDecision::Approved,
            true,
            RememberScope::Run,
        ))
        .unwrap();

    let req = request("run-a", "execution", ApprovalAction::file("file_write", "src/index.ts"));
    assert!(store.find_matching(&req).unwrap().is_some());
}

#[test]
fn newest_matching_record_wins() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    let action = ApprovalAction::url("network", "https://api.example.com/");
    store
        .save(&record("run-a", "execution", action.clone(), ApprovalDecision::Denied, true, RememberScope::Run))
        .unwrap();
    store
        .save(&record("run-a", "execution", action.clone(), ApprovalDecision::Approved, true, RememberScope::Run))
        .unwrap();

    let req = request("run-a", "execution", ApprovalAction::url("network", "https://api.example.com"));
    let hit = store.find_matching(&req).unwrap().unwrap();
    assert_eq!(hit.decision, ApprovalDecision::Approved);
}

#[test]
fn clear_run_removes_index_and_file() {
    let dir = tempdir().unwrap();
    let store = ApprovalStore::new(dir.path());
    store
        .save(&record(
            "run-a",
            "execution",
            ApprovalAction::command("exec", "ls"),
            ApprovalDecision::Approved,
            true,
            RememberScope::Run,
        ))
        .unwrap();

    store.clear_run("run-a").unwrap();
    assert!(store.get_by_run("run-a").unwrap().is_empty());
    assert!(!dir.path().join("run-a/approvals.jsonl").exists());
}

#[yare::parameterized(
    command_whitespace = {
        ApprovalAction::command("exec", "npm   run  test"),
        "npm run test"
    },
    url_trailing_slash = {
        ApprovalAction::url("network", "HTTPS://API.Example.com/"),
        "https://api.example.com"
    },
)]
fn normalized_target_forms(action: ApprovalAction, expected: &str) {
    assert_eq!(action.normalized_target(), expected);
}
