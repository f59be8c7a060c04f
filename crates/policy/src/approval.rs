// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval flow: remembered decisions, prompt delegation, timeout.

use crate::risk::RiskAssessment;
use async_trait::async_trait;
use dc_core::Clock;
use dc_storage::{
    ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStore, RememberScope, StorageError,
};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("action denied by policy: {reason}")]
    Denied { rule: Option<String>, reason: String },
    #[error("approval timed out after {timeout_ms} ms")]
    ApprovalTimeout { timeout_ms: u64 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What the prompt returned.
#[derive(Debug, Clone, Copy)]
pub struct PromptAnswer {
    pub decision: ApprovalDecision,
    pub remember: bool,
    pub remember_scope: RememberScope,
}

impl PromptAnswer {
    pub fn approve() -> Self {
        Self { decision: ApprovalDecision::Approved, remember: false, remember_scope: RememberScope::Once }
    }

    pub fn deny() -> Self {
        Self { decision: ApprovalDecision::Denied, remember: false, remember_scope: RememberScope::Once }
    }

    pub fn approve_remembered(scope: RememberScope) -> Self {
        Self { decision: ApprovalDecision::Approved, remember: true, remember_scope: scope }
    }
}

/// User-facing decision surface for `prompt` evaluations.
#[async_trait]
pub trait ApprovalPrompt: Send + Sync {
    async fn ask(&self, request: &ApprovalRequest, risk: &RiskAssessment) -> PromptAnswer;
}

/// Returns a fixed decision after an optional delay. Used for unattended
/// runs and tests.
pub struct AutoPrompt {
    pub answer: PromptAnswer,
    pub delay_ms: u64,
}

impl AutoPrompt {
    pub fn approving() -> Self {
        Self { answer: PromptAnswer::approve(), delay_ms: 0 }
    }

    pub fn denying() -> Self {
        Self { answer: PromptAnswer::deny(), delay_ms: 0 }
    }
}

#[async_trait]
impl ApprovalPrompt for AutoPrompt {
    async fn ask(&self, _request: &ApprovalRequest, _risk: &RiskAssessment) -> PromptAnswer {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        self.answer
    }
}

/// Interactive terminal prompt: prints the request summary with the risk
/// level and factors, then reads one of {approve, deny, approve-remember}.
pub struct CliPrompt {
    pub timeout_secs: u64,
}

#[async_trait]
impl ApprovalPrompt for CliPrompt {
    async fn ask(&self, request: &ApprovalRequest, risk: &RiskAssessment) -> PromptAnswer {
        println!();
        println!("Approval required: {}", request.reason);
        println!("  run:    {}", request.run_id);
        println!("  phase:  {}", request.phase_id);
        println!("  action: {} {}", request.action.action_type, request.action.normalized_target());
        println!("  risk:   {} ({}/100), recommend {}", risk.level, risk.score, risk.recommendation);
        for factor in &risk.factors {
            println!("    - {factor}");
        }
        println!("[a]pprove / [d]eny / [r]emember for this run (auto-deny in {}s)", self.timeout_secs);

        let line = tokio::task::spawn_blocking(|| {
            let mut buf = String::new();
            std::io::stdin().read_line(&mut buf).map(|_| buf)
        })
        .await;

        match line {
            Ok(Ok(input)) => match input.trim().to_ascii_lowercase().as_str() {
                "a" | "approve" | "y" | "yes" => PromptAnswer::approve(),
                "r" | "remember" => PromptAnswer::approve_remembered(RememberScope::Run),
                _ => PromptAnswer::deny(),
            },
            _ => PromptAnswer::deny(),
        }
    }
}

/// Drives one approval request end to end.
pub struct ApprovalFlow<C: Clock> {
    store: Arc<ApprovalStore>,
    prompt: Option<Arc<dyn ApprovalPrompt>>,
    timeout_ms: u64,
    clock: C,
}

impl<C: Clock> ApprovalFlow<C> {
    pub fn new(
        store: Arc<ApprovalStore>,
        prompt: Option<Arc<dyn ApprovalPrompt>>,
        timeout_ms: u64,
        clock: C,
    ) -> Self {
        Self { store, prompt, timeout_ms, clock }
    }

    /// Resolve an approval request.
    ///
    /// Order: remembered decision, then the configured prompt (bounded by
    /// the timeout and the cancel token), else auto-deny. Every outcome is
    /// appended to the run's approval stream.
    pub async fn request_approval(
        &self,
        request: ApprovalRequest,
        risk: &RiskAssessment,
        cancel: &CancellationToken,
    ) -> Result<ApprovalRecord, PolicyError> {
        if let Some(prior) = self.store.find_matching(&request)? {
            tracing::info!(
                run_id = %request.run_id,
                action = %request.action.action_type,
                decision = %prior.decision,
                "approval satisfied from remembered decision"
            );
            // Still appended: the stream is the complete audit of actions.
            let record = ApprovalRecord {
                request,
                decision: prior.decision,
                decided_at: self.clock.epoch_ms(),
                remember: prior.remember,
                remember_scope: prior.remember_scope,
            };
            self.store.save(&record)?;
            return Ok(record);
        }

        let answer = match &self.prompt {
            None => {
                tracing::warn!(run_id = %request.run_id, "no approval prompt configured, auto-denying");
                PromptAnswer::deny()
            }
            Some(prompt) => {
                let ask = prompt.ask(&request, risk);
                tokio::select! {
                    answer = ask => answer,
                    () = tokio::time::sleep(Duration::from_millis(self.timeout_ms)) => {
                        tracing::warn!(run_id = %request.run_id, timeout_ms = self.timeout_ms, "approval timed out");
                        PromptAnswer {
                            decision: ApprovalDecision::Timeout,
                            remember: false,
                            remember_scope: RememberScope::Once,
                        }
                    }
                    () = cancel.cancelled() => {
                        tracing::info!(run_id = %request.run_id, "approval cancelled");
                        PromptAnswer::deny()
                    }
                }
            }
        };

        let record = ApprovalRecord {
            request,
            decision: answer.decision,
            decided_at: self.clock.epoch_ms(),
            remember: answer.remember,
            remember_scope: answer.remember_scope,
        };
        self.store.save(&record)?;
        Ok(record)
    }
}

#[cfg(test)]
#[path = "approval_tests.rs"]
mod tests;
