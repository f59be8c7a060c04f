// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::policy::{NetworkBehavior, NetworkScope, RulePatterns};

fn engine_with_rules(rules: Vec<PolicyRule>, default_decision: Decision) -> PolicyEngine {
    PolicyEngine::new(WorkflowPolicy { rules, default_decision, ..Default::default() })
}

fn rule(id: &str, action: &str, decision: Decision, priority: i32, patterns: RulePatterns) -> PolicyRule {
    PolicyRule {
        id: id.to_string(),
        actions: vec![action.to_string()],
        patterns,
        decision,
        priority,
        enabled: true,
    }
}

#[test]
fn path_outside_scope_denies_before_rules() {
    // An allow-everything rule must not rescue an out-of-scope path.
    let engine = engine_with_rules(
        vec![rule("allow-all", "file_write", Decision::Allow, 100, RulePatterns::default())],
        Decision::Deny,
    );
    let ctx = ActionContext::new("file_write", "/work/repo").with_path("/outside/x.txt");
    let eval = engine.evaluate(&ctx);
    assert_eq!(eval.decision, Decision::Deny);
    assert!(eval.matched_rule.is_none());
}

#[test]
fn network_check_decides_url_actions() {
    let policy = WorkflowPolicy {
        network_scope: NetworkScope {
            allowed_domains: vec!["*.npmjs.org".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = PolicyEngine::new(policy);

    let allowed = engine.evaluate(
        &ActionContext::new("network", "/work/repo").with_url("https://registry.npmjs.org/react"),
    );
    assert_eq!(allowed.decision, Decision::Allow);

    let denied = engine
        .evaluate(&ActionContext::new("network", "/work/repo").with_url("https://example.com"));
    assert_eq!(denied.decision, Decision::Deny);
}

#[test]
fn invalid_url_is_denied() {
    let engine = engine_with_rules(vec![], Decision::Allow);
    let eval =
        engine.evaluate(&ActionContext::new("network", "/work/repo").with_url("::garbage::"));
    assert_eq!(eval.decision, Decision::Deny);
    assert!(eval.reason.contains("invalid URL"));
}

#[test]
fn highest_priority_rule_wins() {
    let engine = engine_with_rules(
        vec![
            rule("low", "exec", Decision::Allow, 1, RulePatterns::default()),
            rule("high", "exec", Decision::Deny, 10, RulePatterns::default()),
        ],
        Decision::Prompt,
    );
    let eval = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("ls"));
    assert_eq!(eval.decision, Decision::Deny);
    assert_eq!(eval.matched_rule.as_deref(), Some("high"));
}

#[test]
fn disabled_rules_are_skipped() {
    let mut disabled = rule("off", "exec", Decision::Deny, 10, RulePatterns::default());
    disabled.enabled = false;
    let engine = engine_with_rules(vec![disabled], Decision::Allow);
    let eval = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("ls"));
    assert_eq!(eval.decision, Decision::Allow);
    assert!(eval.matched_rule.is_none());
}

#[test]
fn rule_action_type_must_match() {
    let engine = engine_with_rules(
        vec![rule("writes", "file_write", Decision::Deny, 1, RulePatterns::default())],
        Decision::Allow,
    );
    let eval = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("ls"));
    assert_eq!(eval.decision, Decision::Allow);
}

#[test]
fn command_glob_pattern_matches() {
    let patterns = RulePatterns { commands: vec!["npm *".to_string()], ..Default::default() };
    let engine = engine_with_rules(vec![rule("npm", "exec", Decision::Allow, 1, patterns)], Decision::Prompt);

    let hit = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("npm install"));
    assert_eq!(hit.decision, Decision::Allow);

    let miss = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("cargo build"));
    assert_eq!(miss.decision, Decision::Prompt);
}

#[test]
fn regex_pattern_matches_any_target() {
    let patterns = RulePatterns { regex: vec![r"\.lock$".to_string()], ..Default::default() };
    let engine = engine_with_rules(
        vec![rule("locks", "file_write", Decision::Allow, 1, patterns)],
        Decision::Prompt,
    );
    let eval = engine
        .evaluate(&ActionContext::new("file_write", "/work/repo").with_path("Cargo.lock"));
    assert_eq!(eval.decision, Decision::Allow);
}

#[test]
fn fallthrough_uses_policy_default() {
    let engine = engine_with_rules(vec![], Decision::Prompt);
    let eval = engine.evaluate(&ActionContext::new("exec", "/work/repo").with_command("ls"));
    assert_eq!(eval.decision, Decision::Prompt);
    assert_eq!(eval.reason, "policy default");
}

#[test]
fn network_default_allow_behavior() {
    let policy = WorkflowPolicy {
        network_scope: NetworkScope {
            default_behavior: NetworkBehavior::Allow,
            denied_domains: vec!["evil.example".to_string()],
            ..Default::default()
        },
        ..Default::default()
    };
    let engine = PolicyEngine::new(policy);

    let ok = engine
        .evaluate(&ActionContext::new("network", "/w").with_url("https://fine.example/x"));
    assert_eq!(ok.decision, Decision::Allow);

    let denied = engine
        .evaluate(&ActionContext::new("network", "/w").with_url("https://evil.example/x"));
    assert_eq!(denied.decision, Decision::Deny);
}
