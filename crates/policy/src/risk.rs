// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Risk scoring for approval prompts.
//!
//! Scoring is separate from the allow/deny decision: it drives the prompt UI
//! and the recommendation shown to the operator.

use crate::policy::ActionContext;
use crate::scope::is_external_url;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

dc_core::simple_display! {
    RiskLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
        Critical => "critical",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskRecommendation {
    Approve,
    Prompt,
    Review,
    Deny,
}

dc_core::simple_display! {
    RiskRecommendation {
        Approve => "approve",
        Prompt => "prompt",
        Review => "review",
        Deny => "deny",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    /// 0–100.
    pub score: u32,
    pub level: RiskLevel,
    pub factors: Vec<String>,
    pub recommendation: RiskRecommendation,
}

/// Destructive shell patterns and their score weight.
const DESTRUCTIVE_PATTERNS: &[(&str, u32)] = &[
    ("rm -rf", 40),
    ("rm -fr", 40),
    ("rm *", 30),
    ("mkfs", 50),
    ("dd if=", 35),
    (":(){ :|:& };:", 50),
];

/// File names/extensions whose access is sensitive.
const SENSITIVE_FILE_MARKERS: &[&str] =
    &[".env", ".pem", "id_rsa", "id_ed25519", "credentials", ".ssh/"];

fn base_score(action_type: &str) -> u32 {
    match action_type {
        "file_read" => 10,
        "file_write" => 25,
        "file_delete" => 35,
        "exec" | "command" => 30,
        "network" => 20,
        _ => 15,
    }
}

/// Score an action. `scope_violation` is supplied by the caller when the
/// path check already flagged the target.
pub fn assess_risk(ctx: &ActionContext, destructive_actions: &[String], scope_violation: bool) -> RiskAssessment {
    let mut score = base_score(&ctx.action_type);
    let mut factors = Vec::new();

    let command = ctx.command.as_deref().unwrap_or("");
    let lower_command = command.to_lowercase();
    for (pattern, weight) in DESTRUCTIVE_PATTERNS {
        if lower_command.contains(pattern) {
            score += weight;
            factors.push(format!("destructive pattern: {pattern}"));
        }
    }

    let target = ctx
        .target_path
        .as_ref()
        .map(|p| p.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    for marker in SENSITIVE_FILE_MARKERS {
        if target.contains(marker) || lower_command.contains(marker) {
            score += 25;
            factors.push(format!("sensitive file access: {marker}"));
            break;
        }
    }

    if lower_command.contains("sudo")
        || lower_command.contains("doas ")
        || target.starts_with("/etc")
    {
        score += 30;
        factors.push("elevated privileges".to_string());
    }

    let external = ctx.url.as_deref().is_some_and(is_external_url);
    let piped_download = (lower_command.contains("curl") || lower_command.contains("wget"))
        && (lower_command.contains("| sh") || lower_command.contains("| bash"));
    if external || piped_download {
        score += 15;
        factors.push("external network access".to_string());
    }

    if scope_violation {
        score += 20;
        factors.push("outside workspace scope".to_string());
    }

    if lower_command.contains("-r ")
        || lower_command.contains("--recursive")
        || lower_command.ends_with("-r")
    {
        score += 10;
        factors.push("recursive operation".to_string());
    }

    let score = score.min(100);
    let level = match score {
        0..=30 => RiskLevel::Low,
        31..=60 => RiskLevel::Medium,
        61..=85 => RiskLevel::High,
        _ => RiskLevel::Critical,
    };

    let destructive = destructive_actions.iter().any(|a| *a == ctx.action_type)
        || factors.iter().any(|f| f.starts_with("destructive pattern"));
    let recommendation = match level {
        RiskLevel::Low => RiskRecommendation::Approve,
        RiskLevel::Medium => RiskRecommendation::Prompt,
        RiskLevel::High => RiskRecommendation::Review,
        RiskLevel::Critical if destructive => RiskRecommendation::Deny,
        RiskLevel::Critical => RiskRecommendation::Review,
    };

    RiskAssessment { score, level, factors, recommendation }
}

#[cfg(test)]
#[path = "risk_tests.rs"]
mod tests;
