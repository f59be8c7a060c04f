// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dc-policy: security policy for side-effecting workflow actions.
//!
//! Every enforced action flows through [`PolicyEngine::evaluate`]; `prompt`
//! decisions go through the approval flow, which consults remembered
//! decisions, asks the configured prompt, and records the outcome.

pub mod approval;
pub mod engine;
pub mod policy;
pub mod rate_limit;
pub mod risk;
pub mod scope;

pub use approval::{ApprovalFlow, ApprovalPrompt, AutoPrompt, CliPrompt, PolicyError, PromptAnswer};
pub use engine::PolicyEngine;
pub use policy::{
    ActionContext, Decision, Evaluation, NetworkBehavior, NetworkScope, PathScope, PathScopeMode,
    PolicyRule, RulePatterns, WorkflowPolicy,
};
pub use rate_limit::{RateDecision, RateLimiter};
pub use risk::{assess_risk, RiskAssessment, RiskLevel, RiskRecommendation};
