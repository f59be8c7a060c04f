// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reviewer engine: judges the produced work and recommends next steps.

use crate::engine::{Engine, EngineContext, EngineResult, Validation};
use crate::markers::extract_json_artifact;
use crate::runner::{session_id, RunnerRequest};
use async_trait::async_trait;
use dc_core::EngineKind;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Review {
    approved: bool,
    overall_score: f64,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Recommendations {
    recommendations: Vec<String>,
}

fn review_prompt(ctx: &EngineContext) -> String {
    format!(
        concat!(
            "You are the review agent for a dev-cycle workflow.\n\n",
            "Goal:\n{goal}\n\n",
            "Inspect the workspace and judge whether the work is complete ",
            "and sound. Respond with:\n",
            "--- BEGIN review.json ---\n",
            "{{\"approved\": true|false, \"overallScore\": 0.0-1.0, ",
            "\"issues\": [], \"recommendations\": []}}\n",
            "--- END review.json ---\n"
        ),
        goal = ctx.task,
    )
}

/// Stub review approves when the latest execution report shows no failed
/// tasks (or none has run yet, for plan-only reviews).
fn stub_review(ctx: &EngineContext) -> Review {
    let failed_tasks = latest_execution_report(ctx)
        .and_then(|report| report.get("tasksFailed").and_then(|v| v.as_u64()));
    let approved = failed_tasks.is_none_or(|failed| failed == 0);
    Review {
        approved,
        overall_score: if approved { 0.85 } else { 0.4 },
        issues: if approved {
            vec![]
        } else {
            vec![format!("{} task(s) failed during execution", failed_tasks.unwrap_or(0))]
        },
        recommendations: if approved {
            vec![]
        } else {
            vec!["re-plan and retry the failed tasks".to_string()]
        },
    }
}

fn latest_execution_report(ctx: &EngineContext) -> Option<serde_json::Value> {
    let execution = ctx
        .phase_history
        .iter()
        .filter(|p| p.status == dc_core::PhaseStatus::Completed)
        .filter(|p| p.artifacts.iter().any(|a| a == "execution-report.json"))
        .max_by_key(|p| p.iteration)?;
    let path = ctx
        .paths
        .artifacts_dir(&execution.phase_id, execution.iteration)
        .join("execution-report.json");
    let raw = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&raw).ok()
}

pub struct ReviewerEngine;

#[async_trait]
impl Engine for ReviewerEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Reviewer
    }

    /// A non-git workspace degrades to a stub review instead of failing.
    fn validation_is_fatal(&self) -> bool {
        false
    }

    fn validate(&self, ctx: &EngineContext) -> Validation {
        if ctx.workspace.join(".git").exists() {
            Validation::ok()
        } else {
            Validation::fail(vec![format!(
                "workspace is not a git repository: {}",
                ctx.workspace.display()
            )])
        }
    }

    async fn execute(&self, ctx: &EngineContext) -> EngineResult {
        let start = std::time::Instant::now();
        ctx.progress.status("reviewing workspace");

        let review = if ctx.live {
            let request = RunnerRequest {
                session_id: session_id(&ctx.run_id, &ctx.phase_id, ctx.iteration),
                prompt: review_prompt(ctx),
                workspace_path: ctx.workspace.clone(),
                timeout_ms: ctx.timeout_ms,
                provider: ctx.agent.provider.clone(),
                model: ctx.agent.model.clone(),
            };
            let outcome = match ctx.runner.run(request, &ctx.cancel, &ctx.progress).await {
                Ok(outcome) => outcome,
                Err(e) => return EngineResult::failure(e.to_string(), elapsed_ms(start)),
            };
            if let Err(e) = ctx.write_log("reviewer.log", &outcome.output) {
                tracing::warn!(error = %e, "failed to write reviewer log");
            }
            let Some(value) = extract_json_artifact(&outcome.output, "review.json") else {
                return EngineResult::failure(
                    "reviewer output missing review.json section",
                    elapsed_ms(start),
                );
            };
            match serde_json::from_value::<Review>(value) {
                Ok(review) => review,
                Err(e) => {
                    return EngineResult::failure(
                        format!("review.json invalid: {e}"),
                        elapsed_ms(start),
                    )
                }
            }
        } else {
            stub_review(ctx)
        };

        let recommendations = Recommendations { recommendations: review.recommendations.clone() };
        let write = (|| -> std::io::Result<()> {
            ctx.write_artifact("review.json", &serde_json::to_vec_pretty(&review)?)?;
            ctx.write_artifact("recommendations.json", &serde_json::to_vec_pretty(&recommendations)?)?;
            Ok(())
        })();
        if let Err(e) = write {
            return EngineResult::failure(e.to_string(), elapsed_ms(start));
        }

        EngineResult {
            success: true,
            artifacts: vec!["review.json".to_string(), "recommendations.json".to_string()],
            output: None,
            error: None,
            metrics: dc_core::PhaseMetrics { duration_ms: elapsed_ms(start) },
        }
    }
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
#[path = "reviewer_tests.rs"]
mod tests;
