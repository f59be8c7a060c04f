// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::runner::ScriptedRunner;
use crate::test_support::ContextBuilder;
use dc_core::{PhaseExecution, PhaseMetrics, PhaseStatus};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn validation_requires_git_but_is_not_fatal() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let ctx = ContextBuilder::new().phase("review", 1).build(workspace.path(), runs.path());

    let validation = ReviewerEngine.validate(&ctx);
    assert!(!validation.valid);
    assert!(!ReviewerEngine.validation_is_fatal());

    std::fs::create_dir(workspace.path().join(".git")).unwrap();
    assert!(ReviewerEngine.validate(&ctx).valid);
}

#[tokio::test]
async fn stub_review_approves_clean_execution() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let mut ctx = ContextBuilder::new().phase("review", 1).build(workspace.path(), runs.path());

    let report_dir = ctx.paths.artifacts_dir("execution", 1);
    std::fs::create_dir_all(&report_dir).unwrap();
    std::fs::write(
        report_dir.join("execution-report.json"),
        r#"{"tasksTotal": 4, "tasksCompleted": 4, "tasksFailed": 0, "success": true}"#,
    )
    .unwrap();
    ctx.phase_history.push(PhaseExecution {
        phase_id: "execution".to_string(),
        iteration: 1,
        status: PhaseStatus::Completed,
        artifacts: vec!["tasks.json".to_string(), "execution-report.json".to_string()],
        metrics: PhaseMetrics::default(),
        log_path: None,
    });

    let result = ReviewerEngine.execute(&ctx).await;
    assert!(result.success);
    assert_eq!(result.artifacts, vec!["review.json", "recommendations.json"]);

    let review: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("review.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(review["approved"], true);
    assert!(review["overallScore"].as_f64().unwrap() > 0.5);
}

#[tokio::test]
async fn stub_review_rejects_failed_execution() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let mut ctx = ContextBuilder::new().phase("review", 1).build(workspace.path(), runs.path());

    let report_dir = ctx.paths.artifacts_dir("execution", 1);
    std::fs::create_dir_all(&report_dir).unwrap();
    std::fs::write(
        report_dir.join("execution-report.json"),
        r#"{"tasksTotal": 4, "tasksCompleted": 3, "tasksFailed": 1, "success": false}"#,
    )
    .unwrap();
    ctx.phase_history.push(PhaseExecution {
        phase_id: "execution".to_string(),
        iteration: 1,
        status: PhaseStatus::Completed,
        artifacts: vec!["execution-report.json".to_string()],
        metrics: PhaseMetrics::default(),
        log_path: None,
    });

    let result = ReviewerEngine.execute(&ctx).await;
    assert!(result.success);

    let review: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("review.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(review["approved"], false);
    assert!(!review["issues"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn stub_review_without_execution_approves() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let ctx = ContextBuilder::new().phase("review", 1).build(workspace.path(), runs.path());

    let result = ReviewerEngine.execute(&ctx).await;
    assert!(result.success);
    let review: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("review.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(review["approved"], true);
}

#[tokio::test]
async fn live_review_parses_marker_json() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let output = concat!(
        "--- BEGIN review.json ---\n",
        r#"{"approved": false, "overallScore": 0.3, "issues": ["missing tests"], "recommendations": ["add tests"]}"#,
        "\n--- END review.json ---\n"
    );
    let runner = Arc::new(ScriptedRunner::of_outputs(vec![output]));
    let ctx =
        ContextBuilder::new().phase("review", 1).live(runner).build(workspace.path(), runs.path());

    let result = ReviewerEngine.execute(&ctx).await;
    assert!(result.success);

    let recommendations: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(ctx.artifacts_dir().join("recommendations.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(recommendations["recommendations"][0], "add tests");
}

#[tokio::test]
async fn live_review_without_markers_fails() {
    let workspace = tempdir().unwrap();
    let runs = tempdir().unwrap();
    let runner = Arc::new(ScriptedRunner::of_outputs(vec!["looks good to me"]));
    let ctx =
        ContextBuilder::new().phase("review", 1).live(runner).build(workspace.path(), runs.path());

    let result = ReviewerEngine.execute(&ctx).await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("missing review.json"));
}
