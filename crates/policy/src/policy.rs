// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy document types.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What the policy says about an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
    Prompt,
}

dc_core::simple_display! {
    Decision {
        Allow => "allow",
        Deny => "deny",
        Prompt => "prompt",
    }
}

/// Where writes are allowed to land.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathScopeMode {
    WorkspaceOnly,
    WorkspaceAndTemp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PathScope {
    pub mode: PathScopeMode,
    /// Prefixes denied even inside the scope.
    pub denied_prefixes: Vec<PathBuf>,
    /// Deny paths whose resolved real path escapes the scope via symlinks.
    pub block_symlink_escape: bool,
}

impl Default for PathScope {
    fn default() -> Self {
        Self {
            mode: PathScopeMode::WorkspaceOnly,
            denied_prefixes: Vec::new(),
            block_symlink_escape: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkBehavior {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkScope {
    pub default_behavior: NetworkBehavior,
    /// Exact domains, or `*.suffix` wildcards.
    pub allowed_domains: Vec<String>,
    pub denied_domains: Vec<String>,
    /// Full-URL globs.
    pub allowed_urls: Vec<String>,
}

impl Default for NetworkScope {
    fn default() -> Self {
        Self {
            default_behavior: NetworkBehavior::Deny,
            allowed_domains: Vec::new(),
            denied_domains: Vec::new(),
            allowed_urls: Vec::new(),
        }
    }
}

/// Patterns a rule matches against the action's target.
///
/// Globs match the field they are named for; `regex` patterns match
/// whichever target fields are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RulePatterns {
    pub paths: Vec<String>,
    pub commands: Vec<String>,
    pub urls: Vec<String>,
    pub regex: Vec<String>,
}

impl RulePatterns {
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
            && self.commands.is_empty()
            && self.urls.is_empty()
            && self.regex.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyRule {
    pub id: String,
    pub actions: Vec<String>,
    #[serde(default)]
    pub patterns: RulePatterns,
    pub decision: Decision,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// The declarative policy for a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowPolicy {
    pub version: u32,
    pub path_scope: PathScope,
    pub network_scope: NetworkScope,
    pub rules: Vec<PolicyRule>,
    pub default_decision: Decision,
    /// Action types treated as destructive for risk recommendations.
    pub destructive_actions: Vec<String>,
    pub log_decisions: bool,
    pub log_approvals: bool,
}

impl Default for WorkflowPolicy {
    fn default() -> Self {
        Self {
            version: 1,
            path_scope: PathScope::default(),
            network_scope: NetworkScope::default(),
            rules: Vec::new(),
            default_decision: Decision::Prompt,
            destructive_actions: vec!["file_delete".to_string(), "exec".to_string()],
            log_decisions: true,
            log_approvals: true,
        }
    }
}

/// One action to evaluate.
#[derive(Debug, Clone, Default)]
pub struct ActionContext {
    pub action_type: String,
    pub target_path: Option<PathBuf>,
    pub command: Option<String>,
    pub url: Option<String>,
    pub workspace_root: PathBuf,
}

impl ActionContext {
    pub fn new(action_type: impl Into<String>, workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            action_type: action_type.into(),
            workspace_root: workspace_root.into(),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.target_path = Some(path.into());
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// Outcome of policy evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    pub reason: String,
}

impl Evaluation {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self { decision: Decision::Allow, matched_rule: None, reason: reason.into() }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self { decision: Decision::Deny, matched_rule: None, reason: reason.into() }
    }

    pub fn prompt(reason: impl Into<String>) -> Self {
        Self { decision: Decision::Prompt, matched_rule: None, reason: reason.into() }
    }
}
