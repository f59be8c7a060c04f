// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow definitions: ordered phases, engine assignment, and transitions.

use serde::{Deserialize, Serialize};

/// Which engine implements a phase's semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Planner,
    Executor,
    Reviewer,
}

crate::simple_display! {
    EngineKind {
        Planner => "planner",
        Executor => "executor",
        Reviewer => "reviewer",
    }
}

/// Agent configuration handed to the runner for a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { provider: "claude".to_string(), model: None }
    }
}

/// Per-phase runtime settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSettings {
    pub timeout_ms: u64,
    pub retries: u32,
}

impl Default for PhaseSettings {
    fn default() -> Self {
        Self { timeout_ms: 600_000, retries: 1 }
    }
}

/// Condition over a produced artifact's parsed JSON.
///
/// `artifact` is the camelCase artifact key (file names are normalized
/// kebab→camel, `plan-review.json` → `planReview`); `field` is a dotted
/// path inside the parsed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionCondition {
    pub artifact: String,
    pub field: String,
    pub equals: serde_json::Value,
}

impl TransitionCondition {
    /// Evaluate against a map of camelCase artifact key → parsed JSON.
    pub fn matches(&self, artifacts: &serde_json::Map<String, serde_json::Value>) -> bool {
        let Some(doc) = artifacts.get(&self.artifact) else {
            return false;
        };
        let mut cursor = doc;
        for part in self.field.split('.') {
            match cursor.get(part) {
                Some(next) => cursor = next,
                None => return false,
            }
        }
        *cursor == self.equals
    }
}

/// First matching rule decides the next phase; no match advances in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRule {
    pub condition: TransitionCondition,
    pub next_phase: String,
}

/// Static definition of one phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseDefinition {
    pub id: String,
    pub engine: EngineKind,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub input_artifacts: Vec<String>,
    #[serde(default)]
    pub output_artifacts: Vec<String>,
    #[serde(default)]
    pub settings: PhaseSettings,
    #[serde(default)]
    pub transitions: Vec<TransitionRule>,
}

/// A named, ordered sequence of phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    pub definition_type: String,
    pub phases: Vec<PhaseDefinition>,
    /// Cap on re-entries into any single phase (replan loop circuit breaker).
    pub max_review_iterations: u32,
}

impl WorkflowDefinition {
    pub fn phase(&self, id: &str) -> Option<&PhaseDefinition> {
        self.phases.iter().find(|p| p.id == id)
    }

    /// Index of a phase in definition order.
    pub fn phase_index(&self, id: &str) -> Option<usize> {
        self.phases.iter().position(|p| p.id == id)
    }

    /// The phase after `id` in definition order, if any.
    pub fn next_phase_after(&self, id: &str) -> Option<&PhaseDefinition> {
        let idx = self.phase_index(id)?;
        self.phases.get(idx + 1)
    }

    /// The built-in dev-cycle: plan → execute → review → finalize.
    ///
    /// A rejected review loops back to planning; approval falls through to
    /// finalize in definition order.
    pub fn dev_cycle() -> Self {
        Self {
            definition_type: "dev-cycle".to_string(),
            max_review_iterations: 3,
            phases: vec![
                PhaseDefinition {
                    id: "planning".to_string(),
                    engine: EngineKind::Planner,
                    agent: AgentConfig::default(),
                    input_artifacts: vec![],
                    output_artifacts: vec!["plan.md".to_string(), "tasks.json".to_string()],
                    settings: PhaseSettings::default(),
                    transitions: vec![],
                },
                PhaseDefinition {
                    id: "execution".to_string(),
                    engine: EngineKind::Executor,
                    agent: AgentConfig::default(),
                    input_artifacts: vec!["tasks.json".to_string()],
                    output_artifacts: vec![
                        "tasks.json".to_string(),
                        "execution-report.json".to_string(),
                    ],
                    settings: PhaseSettings { timeout_ms: 1_800_000, retries: 1 },
                    transitions: vec![],
                },
                PhaseDefinition {
                    id: "review".to_string(),
                    engine: EngineKind::Reviewer,
                    agent: AgentConfig::default(),
                    input_artifacts: vec!["plan.md".to_string(), "tasks.json".to_string()],
                    output_artifacts: vec![
                        "review.json".to_string(),
                        "recommendations.json".to_string(),
                    ],
                    settings: PhaseSettings::default(),
                    transitions: vec![TransitionRule {
                        condition: TransitionCondition {
                            artifact: "review".to_string(),
                            field: "approved".to_string(),
                            equals: serde_json::Value::Bool(false),
                        },
                        next_phase: "planning".to_string(),
                    }],
                },
                PhaseDefinition {
                    id: "finalize".to_string(),
                    engine: EngineKind::Reviewer,
                    agent: AgentConfig::default(),
                    input_artifacts: vec!["review.json".to_string()],
                    output_artifacts: vec![
                        "review.json".to_string(),
                        "recommendations.json".to_string(),
                    ],
                    settings: PhaseSettings::default(),
                    transitions: vec![],
                },
            ],
        }
    }
}

/// Normalize a kebab-case artifact file name to its camelCase key.
///
/// `plan-review.json` → `planReview`; extension is dropped.
pub fn artifact_key(file_name: &str) -> String {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let mut out = String::with_capacity(stem.len());
    let mut upper_next = false;
    for ch in stem.chars() {
        if ch == '-' || ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
#[path = "definition_tests.rs"]
mod tests;
