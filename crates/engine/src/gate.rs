// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy-backed action gate for runners.
//!
//! Bridges the policy engine, the approval flow, and the exec rate limiter
//! into the single `authorize` seam the runner calls before each enforced
//! action. Run and phase are recovered from the session key
//! (`wf-{runId}-{phaseId}-{iteration}`).

use crate::runner::ActionGate;
use async_trait::async_trait;
use dc_core::{Clock, RunId};
use dc_policy::{ActionContext, ApprovalFlow, Decision, PolicyEngine, RateLimiter};
use dc_storage::{ApprovalAction, ApprovalRequest};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub struct PolicyGate<C: Clock> {
    engine: PolicyEngine,
    flow: ApprovalFlow<C>,
    rate_limiter: RateLimiter<C>,
    workspace_root: PathBuf,
    clock: C,
}

impl<C: Clock> PolicyGate<C> {
    pub fn new(
        engine: PolicyEngine,
        flow: ApprovalFlow<C>,
        rate_limiter: RateLimiter<C>,
        workspace_root: impl Into<PathBuf>,
        clock: C,
    ) -> Self {
        Self { engine, flow, rate_limiter, workspace_root: workspace_root.into(), clock }
    }

    fn context_for(&self, action: &ApprovalAction) -> ActionContext {
        let mut ctx = ActionContext::new(action.action_type.clone(), self.workspace_root.clone());
        if let Some(path) = &action.target_path {
            ctx = ctx.with_path(path.clone());
        }
        if let Some(command) = &action.command {
            ctx = ctx.with_command(command.clone());
        }
        if let Some(url) = &action.url {
            ctx = ctx.with_url(url.clone());
        }
        ctx
    }
}

/// Split `wf-{runId}-{phaseId}-{iteration}` back into run and phase.
fn parse_session_key(session_key: &str) -> (RunId, String) {
    let body = session_key.strip_prefix("wf-").unwrap_or(session_key);
    let mut parts = body.rsplitn(3, '-');
    let _iteration = parts.next();
    let phase = parts.next().unwrap_or("unknown").to_string();
    let run = parts.next().unwrap_or(body);
    (RunId::from_string(run), phase)
}

#[async_trait]
impl<C: Clock> ActionGate for PolicyGate<C> {
    async fn authorize(
        &self,
        action: ApprovalAction,
        session_key: &str,
        cancel: &CancellationToken,
    ) -> Result<(), String> {
        let ctx = self.context_for(&action);
        let evaluation = self.engine.evaluate(&ctx);
        match evaluation.decision {
            Decision::Allow => Ok(()),
            Decision::Deny => Err(evaluation.reason),
            Decision::Prompt => {
                // Exec approvals are rate limited per session key.
                if action.action_type == "exec" {
                    let rate = self.rate_limiter.check(session_key);
                    if !rate.allowed {
                        return Err(format!(
                            "rate limited: retry after {} ms",
                            rate.retry_after_ms
                        ));
                    }
                }

                let risk = dc_policy::assess_risk(
                    &ctx,
                    &self.engine.policy().destructive_actions,
                    false,
                );
                let (run_id, phase_id) = parse_session_key(session_key);
                let request = ApprovalRequest::new(
                    run_id,
                    phase_id,
                    evaluation.reason.clone(),
                    action,
                    self.clock.epoch_ms(),
                );
                let record = self
                    .flow
                    .request_approval(request, &risk, cancel)
                    .await
                    .map_err(|e| e.to_string())?;
                if record.decision.is_approved() {
                    Ok(())
                } else {
                    Err(format!("approval {}", record.decision))
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "gate_tests.rs"]
mod tests;
