// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform configuration.
//!
//! The key set is closed: every consumed key is a field here. Unknown keys
//! in a config file are logged at `warn` and ignored, never errors.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub workflows: WorkflowsConfig,
    pub facts_memory: FactsMemoryConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkflowsConfig {
    pub retention: RetentionConfig,
    pub policy: ApprovalPolicyConfig,
    pub routing: RoutingConfig,
}

/// Quota-driven cleanup of old run directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetentionConfig {
    pub max_completed: usize,
    pub max_disk_per_workflow_mb: u64,
    pub max_total_disk_gb: u64,
    pub log_retention_days: u32,
    pub failed_log_retention_days: u32,
    pub artifact_retention_days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            max_completed: 10,
            max_disk_per_workflow_mb: 500,
            max_total_disk_gb: 10,
            log_retention_days: 7,
            failed_log_retention_days: 14,
            artifact_retention_days: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ApprovalPolicyConfig {
    pub approval_timeout_ms: u64,
}

impl Default for ApprovalPolicyConfig {
    fn default() -> Self {
        Self { approval_timeout_ms: 60_000 }
    }
}

/// Intent routing thresholds (the router itself lives outside the core).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoutingConfig {
    pub enabled: bool,
    pub min_confidence: f64,
    pub auto_start: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { enabled: false, min_confidence: 0.7, auto_start: false }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactsMemoryConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_path: Option<PathBuf>,
    pub extraction: ExtractionConfig,
    pub limits: ExtractionLimits,
    pub retention: FactsRetentionConfig,
    pub scheduler: FactsSchedulerConfig,
    pub alerts: FactsAlertsConfig,
    pub access: FactsAccessConfig,
}

impl Default for FactsMemoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            db_path: None,
            markdown_path: None,
            extraction: ExtractionConfig::default(),
            limits: ExtractionLimits::default(),
            retention: FactsRetentionConfig::default(),
            scheduler: FactsSchedulerConfig::default(),
            alerts: FactsAlertsConfig::default(),
            access: FactsAccessConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionConfig {
    pub enabled: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { enabled: true, provider: "claude".to_string(), model: None }
    }
}

/// Guardrails applied before every extraction call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractionLimits {
    pub max_messages: usize,
    pub max_facts: usize,
    pub max_tokens: usize,
    pub cooldown_ms: u64,
}

impl Default for ExtractionLimits {
    fn default() -> Self {
        Self { max_messages: 25, max_facts: 50, max_tokens: 1_500, cooldown_ms: 30_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactsRetentionConfig {
    pub max_age_days: u32,
    pub max_size_mb: u64,
    pub prune_low_importance: bool,
    pub min_importance: f64,
    pub truncate_summaries_days: u32,
}

impl Default for FactsRetentionConfig {
    fn default() -> Self {
        Self {
            max_age_days: 90,
            max_size_mb: 100,
            prune_low_importance: true,
            min_importance: 0.3,
            truncate_summaries_days: 30,
        }
    }
}

/// Cron expressions use the 6-field form with a leading seconds column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactsSchedulerConfig {
    pub daily_enabled: bool,
    pub daily_cron: String,
    pub weekly_enabled: bool,
    pub weekly_cron: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl Default for FactsSchedulerConfig {
    fn default() -> Self {
        Self {
            daily_enabled: true,
            daily_cron: "0 55 23 * * *".to_string(),
            weekly_enabled: true,
            weekly_cron: "0 0 3 * * Sun".to_string(),
            timezone: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactsAlertsConfig {
    pub health_check_enabled: bool,
    pub health_check_cron: String,
}

impl Default for FactsAlertsConfig {
    fn default() -> Self {
        Self { health_check_enabled: true, health_check_cron: "0 0 6 * * *".to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FactsAccessConfig {
    pub enabled: bool,
    pub default_role: String,
}

impl Default for FactsAccessConfig {
    fn default() -> Self {
        Self { enabled: false, default_role: "user".to_string() }
    }
}

impl Config {
    /// Parse a TOML document, applying defaults and warning on unknown keys.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(text)?;
        if let Some(table) = value.as_table() {
            warn_unknown_keys(table, "", KNOWN_KEYS);
        }
        Ok(value.try_into()?)
    }
}

/// Every consumable dotted key path. Keys outside this list are ignored.
const KNOWN_KEYS: &[&str] = &[
    "workflows.retention.maxCompleted",
    "workflows.retention.maxDiskPerWorkflowMb",
    "workflows.retention.maxTotalDiskGb",
    "workflows.retention.logRetentionDays",
    "workflows.retention.failedLogRetentionDays",
    "workflows.retention.artifactRetentionDays",
    "workflows.policy.approvalTimeoutMs",
    "workflows.routing.enabled",
    "workflows.routing.minConfidence",
    "workflows.routing.autoStart",
    "factsMemory.enabled",
    "factsMemory.dbPath",
    "factsMemory.markdownPath",
    "factsMemory.extraction.enabled",
    "factsMemory.extraction.provider",
    "factsMemory.extraction.model",
    "factsMemory.limits.maxMessages",
    "factsMemory.limits.maxFacts",
    "factsMemory.limits.maxTokens",
    "factsMemory.limits.cooldownMs",
    "factsMemory.retention.maxAgeDays",
    "factsMemory.retention.maxSizeMb",
    "factsMemory.retention.pruneLowImportance",
    "factsMemory.retention.minImportance",
    "factsMemory.retention.truncateSummariesDays",
    "factsMemory.scheduler.dailyEnabled",
    "factsMemory.scheduler.dailyCron",
    "factsMemory.scheduler.weeklyEnabled",
    "factsMemory.scheduler.weeklyCron",
    "factsMemory.scheduler.timezone",
    "factsMemory.alerts.healthCheckEnabled",
    "factsMemory.alerts.healthCheckCron",
    "factsMemory.access.enabled",
    "factsMemory.access.defaultRole",
];

fn warn_unknown_keys(table: &toml::value::Table, prefix: &str, known: &[&str]) {
    for (key, value) in table {
        let path = if prefix.is_empty() { key.clone() } else { format!("{prefix}.{key}") };
        let is_branch = known.iter().any(|k| k.starts_with(&format!("{path}.")));
        let is_leaf = known.contains(&path.as_str());
        match value {
            toml::Value::Table(inner) if is_branch => warn_unknown_keys(inner, &path, known),
            _ if is_leaf => {}
            _ => {
                tracing::warn!(key = %path, "ignoring unknown config key");
            }
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
