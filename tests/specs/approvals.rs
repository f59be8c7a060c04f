// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy prompt + remember across identical actions in one run.

use dc_core::{FakeClock, RunId};
use dc_policy::{
    assess_risk, ActionContext, ApprovalFlow, ApprovalPrompt, PromptAnswer,
};
use dc_storage::{ApprovalAction, ApprovalRequest, ApprovalStore, RememberScope};
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

struct CountingPrompt {
    calls: Mutex<u32>,
}

#[async_trait::async_trait]
impl ApprovalPrompt for CountingPrompt {
    async fn ask(&self, _request: &ApprovalRequest, _risk: &dc_policy::RiskAssessment) -> PromptAnswer {
        *self.calls.lock() += 1;
        PromptAnswer::approve_remembered(RememberScope::Run)
    }
}

#[tokio::test]
async fn second_identical_write_skips_prompt_but_is_recorded() {
    let dir = tempdir().unwrap();
    let store = Arc::new(ApprovalStore::new(dir.path()));
    let prompt = Arc::new(CountingPrompt { calls: Mutex::new(0) });
    let clock = FakeClock::new();
    let flow = ApprovalFlow::new(Arc::clone(&store), Some(prompt.clone()), 60_000, clock);

    let run_id = RunId::from_string("run-spec3");
    let cancel = CancellationToken::new();
    let risk = assess_risk(
        &ActionContext::new("file_write", "/w").with_path("src/index.ts"),
        &[],
        false,
    );

    let request = |phase: &str| {
        ApprovalRequest::new(
            run_id,
            phase,
            "write to src/index.ts",
            ApprovalAction::file("file_write", "src/index.ts"),
            1_000,
        )
    };

    // First write prompts and is approved with remember scope `run`.
    let first = flow.request_approval(request("execution"), &risk, &cancel).await.unwrap();
    assert!(first.decision.is_approved());
    assert!(first.remember);
    assert_eq!(*prompt.calls.lock(), 1);

    // Second write to the same path (different phase) proceeds unprompted.
    let second = flow.request_approval(request("review"), &risk, &cancel).await.unwrap();
    assert!(second.decision.is_approved());
    assert_eq!(*prompt.calls.lock(), 1);

    // Both decisions live in approvals.jsonl, append-only.
    let lines =
        std::fs::read_to_string(dir.path().join("run-spec3/approvals.jsonl")).unwrap();
    assert_eq!(lines.lines().count(), 2);
    assert_eq!(store.get_by_run("run-spec3").unwrap().len(), 2);
}
