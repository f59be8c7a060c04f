// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Threshold-based health snapshots and the recent-alerts ring buffer.

use crate::guardrails::FactsTelemetry;
use crate::model::FactsError;
use crate::store::FactsStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Ring buffer capacity; newest alerts win.
const MAX_ALERTS: usize = 50;

const MS_PER_DAY: u64 = 86_400_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warn,
    Critical,
}

dc_core::simple_display! {
    AlertSeverity {
        Warn => "warn",
        Critical => "critical",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthAlert {
    pub severity: AlertSeverity,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub timestamp: u64,
}

/// Computed, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub db_size_mb: f64,
    pub total_memories: u64,
    /// Extraction errors in the trailing day.
    pub extraction_errors: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_extraction_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_cleanup_at: Option<u64>,
    pub fts_available: bool,
    pub daily_summaries: u64,
    pub weekly_summaries: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthThresholds {
    pub db_size_mb: f64,
    pub errors_per_day: u32,
    /// Days without extraction or cleanup before the store counts as stale.
    pub stale_days: u32,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self { db_size_mb: 100.0, errors_per_day: 10, stale_days: 3 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Warning,
    Critical,
    Disabled,
}

dc_core::simple_display! {
    HealthStatus {
        Ok => "ok",
        Warning => "warning",
        Critical => "critical",
        Disabled => "disabled",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSummary {
    pub status: HealthStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<HealthSnapshot>,
    pub thresholds: HealthThresholds,
    pub active_alerts: Vec<HealthAlert>,
}

/// Runs health checks and keeps the bounded alert history.
pub struct HealthMonitor {
    thresholds: HealthThresholds,
    enabled: bool,
    alerts: Mutex<VecDeque<HealthAlert>>,
    last_snapshot: Mutex<Option<HealthSnapshot>>,
}

impl HealthMonitor {
    pub fn new(thresholds: HealthThresholds, enabled: bool) -> Self {
        Self {
            thresholds,
            enabled,
            alerts: Mutex::new(VecDeque::new()),
            last_snapshot: Mutex::new(None),
        }
    }

    fn push_alert(&self, alert: HealthAlert) {
        let mut alerts = self.alerts.lock();
        if alerts.len() == MAX_ALERTS {
            alerts.pop_front();
        }
        alerts.push_back(alert);
    }

    /// Compute a snapshot and raise alerts for threshold violations.
    pub fn run_health_check(
        &self,
        store: &FactsStore,
        telemetry: &FactsTelemetry,
        now_ms: u64,
    ) -> Result<HealthSnapshot, FactsError> {
        let snapshot = HealthSnapshot {
            db_size_mb: store.db_size_bytes()? as f64 / (1024.0 * 1024.0),
            total_memories: store.count()?,
            extraction_errors: telemetry.errors_last_day(now_ms),
            last_extraction_at: telemetry.last_extraction_at(),
            last_cleanup_at: telemetry.last_cleanup_at(),
            fts_available: store.fts_available(),
            daily_summaries: store.count_daily_summaries()?,
            weekly_summaries: store.count_weekly_summaries()?,
        };

        if snapshot.db_size_mb > self.thresholds.db_size_mb {
            self.push_alert(HealthAlert {
                severity: AlertSeverity::Critical,
                alert_type: "db_size".to_string(),
                message: format!(
                    "database is {:.1} MB (threshold {:.1} MB)",
                    snapshot.db_size_mb, self.thresholds.db_size_mb
                ),
                timestamp: now_ms,
            });
        }

        if snapshot.extraction_errors > self.thresholds.errors_per_day {
            self.push_alert(HealthAlert {
                severity: AlertSeverity::Warn,
                alert_type: "extraction_errors".to_string(),
                message: format!(
                    "{} extraction errors in the last day (threshold {})",
                    snapshot.extraction_errors, self.thresholds.errors_per_day
                ),
                timestamp: now_ms,
            });
        }

        let stale_cutoff = now_ms.saturating_sub(u64::from(self.thresholds.stale_days) * MS_PER_DAY);
        if let Some(last) = snapshot.last_cleanup_at {
            if last < stale_cutoff {
                self.push_alert(HealthAlert {
                    severity: AlertSeverity::Warn,
                    alert_type: "stale_cleanup".to_string(),
                    message: format!(
                        "no consolidation for over {} day(s)",
                        self.thresholds.stale_days
                    ),
                    timestamp: now_ms,
                });
            }
        }

        if !snapshot.fts_available {
            self.push_alert(HealthAlert {
                severity: AlertSeverity::Warn,
                alert_type: "fts_unavailable".to_string(),
                message: "full-text index unavailable; search degraded".to_string(),
                timestamp: now_ms,
            });
        }

        *self.last_snapshot.lock() = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Alerts raised by the most recent check, newest first.
    pub fn recent_alerts(&self, limit: usize) -> Vec<HealthAlert> {
        self.alerts.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Status is the max severity among alerts from the latest check.
    pub fn get_health_summary(&self, now_ms: u64) -> HealthSummary {
        if !self.enabled {
            return HealthSummary {
                status: HealthStatus::Disabled,
                snapshot: self.last_snapshot.lock().clone(),
                thresholds: self.thresholds,
                active_alerts: Vec::new(),
            };
        }

        let snapshot = self.last_snapshot.lock().clone();
        // Active = raised within the last day.
        let cutoff = now_ms.saturating_sub(MS_PER_DAY);
        let active_alerts: Vec<HealthAlert> =
            self.alerts.lock().iter().filter(|a| a.timestamp >= cutoff).cloned().collect();

        let status = match active_alerts.iter().map(|a| a.severity).max() {
            Some(AlertSeverity::Critical) => HealthStatus::Critical,
            Some(AlertSeverity::Warn) => HealthStatus::Warning,
            None => HealthStatus::Ok,
        };

        HealthSummary { status, snapshot, thresholds: self.thresholds, active_alerts }
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;
