// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy evaluation pipeline.

use crate::policy::{ActionContext, Decision, Evaluation, PolicyRule, WorkflowPolicy};
use crate::scope;

/// Evaluates actions against a [`WorkflowPolicy`].
///
/// Pipeline order is fixed: path scope, network scope, rules by descending
/// priority (first match wins), then the policy default.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    policy: WorkflowPolicy,
}

impl PolicyEngine {
    pub fn new(policy: WorkflowPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &WorkflowPolicy {
        &self.policy
    }

    pub fn evaluate(&self, ctx: &ActionContext) -> Evaluation {
        let evaluation = self.evaluate_inner(ctx);
        if self.policy.log_decisions {
            tracing::debug!(
                action = %ctx.action_type,
                decision = %evaluation.decision,
                rule = evaluation.matched_rule.as_deref().unwrap_or("-"),
                reason = %evaluation.reason,
                "policy evaluated"
            );
        }
        evaluation
    }

    fn evaluate_inner(&self, ctx: &ActionContext) -> Evaluation {
        if let Some(target) = &ctx.target_path {
            if let Some(reason) = scope::check_path(&self.policy.path_scope, &ctx.workspace_root, target) {
                return Evaluation::deny(reason);
            }
        }

        if let Some(url) = &ctx.url {
            match scope::check_network(&self.policy.network_scope, url) {
                Ok(reason) => return Evaluation::allow(reason),
                Err(reason) => return Evaluation::deny(reason),
            }
        }

        let mut rules: Vec<&PolicyRule> = self
            .policy
            .rules
            .iter()
            .filter(|rule| rule.enabled && rule.actions.iter().any(|a| *a == ctx.action_type))
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        for rule in rules {
            if rule_matches(rule, ctx) {
                return Evaluation {
                    decision: rule.decision,
                    matched_rule: Some(rule.id.clone()),
                    reason: format!("matched rule {}", rule.id),
                };
            }
        }

        Evaluation {
            decision: self.policy.default_decision,
            matched_rule: None,
            reason: "policy default".to_string(),
        }
    }
}

fn rule_matches(rule: &PolicyRule, ctx: &ActionContext) -> bool {
    // A rule with no patterns matches every action of its types.
    if rule.patterns.is_empty() {
        return true;
    }

    let path = ctx.target_path.as_ref().map(|p| p.to_string_lossy().into_owned());
    if let Some(path) = &path {
        for pattern in &rule.patterns.paths {
            if glob_matches(pattern, path) {
                return true;
            }
        }
    }
    if let Some(command) = &ctx.command {
        for pattern in &rule.patterns.commands {
            if glob_matches(pattern, command) {
                return true;
            }
        }
    }
    if let Some(url) = &ctx.url {
        for pattern in &rule.patterns.urls {
            if glob_matches(pattern, url) {
                return true;
            }
        }
    }
    for pattern in &rule.patterns.regex {
        let regex = match regex::Regex::new(pattern) {
            Ok(regex) => regex,
            Err(e) => {
                tracing::warn!(rule = %rule.id, pattern, error = %e, "invalid rule regex");
                continue;
            }
        };
        let matched = path.as_deref().is_some_and(|t| regex.is_match(t))
            || ctx.command.as_deref().is_some_and(|t| regex.is_match(t))
            || ctx.url.as_deref().is_some_and(|t| regex.is_match(t));
        if matched {
            return true;
        }
    }
    false
}

fn glob_matches(pattern: &str, text: &str) -> bool {
    match glob::Pattern::new(pattern) {
        Ok(glob) => glob.matches(text),
        Err(e) => {
            tracing::warn!(pattern, error = %e, "invalid rule glob");
            false
        }
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
