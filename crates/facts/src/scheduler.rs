// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-process cron for consolidation and health checks.
//!
//! Three independent jobs: daily consolidation, weekly consolidation, and
//! the health check. Jobs swallow and log their own errors; a failing job
//! never stops the scheduler.

use crate::consolidate::{run_consolidation, ConsolidationReport};
use crate::guardrails::FactsTelemetry;
use crate::health::{HealthMonitor, HealthSnapshot};
use crate::llm::Summarizer;
use crate::model::FactsError;
use crate::store::FactsStore;
use chrono::{DateTime, Local, Utc};
use cron::Schedule;
use dc_core::config::{FactsAlertsConfig, FactsRetentionConfig, FactsSchedulerConfig};
use dc_core::{Clock, SystemClock};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub name: String,
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_run: Option<DateTime<Utc>>,
}

/// Named timezones require a tz database; the scheduler supports UTC and
/// the host-local zone, falling back to local with a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SchedulerZone {
    Utc,
    Local,
}

fn resolve_zone(timezone: Option<&str>) -> SchedulerZone {
    match timezone {
        None => SchedulerZone::Local,
        Some(tz) if tz.eq_ignore_ascii_case("utc") => SchedulerZone::Utc,
        Some(tz) if tz.eq_ignore_ascii_case("local") => SchedulerZone::Local,
        Some(tz) => {
            tracing::warn!(timezone = tz, "unsupported timezone, using local time");
            SchedulerZone::Local
        }
    }
}

/// Next fire time strictly after `now`.
fn next_fire(schedule: &Schedule, zone: SchedulerZone, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match zone {
        SchedulerZone::Utc => schedule.after(&now).next(),
        SchedulerZone::Local => {
            schedule.after(&now.with_timezone(&Local)).next().map(|t| t.with_timezone(&Utc))
        }
    }
}

/// Shared dependencies handed to every job.
#[derive(Clone)]
pub struct SchedulerContext {
    pub store: Arc<FactsStore>,
    pub retention: FactsRetentionConfig,
    pub markdown_root: Option<PathBuf>,
    pub summarizer: Option<Arc<dyn Summarizer>>,
    pub telemetry: Arc<FactsTelemetry>,
    pub health: Arc<HealthMonitor>,
}

pub struct FactsScheduler {
    config: FactsSchedulerConfig,
    alerts: FactsAlertsConfig,
    ctx: SchedulerContext,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl FactsScheduler {
    pub fn new(config: FactsSchedulerConfig, alerts: FactsAlertsConfig, ctx: SchedulerContext) -> Self {
        Self { config, alerts, ctx, handles: Mutex::new(Vec::new()) }
    }

    /// Start all enabled jobs. Any prior instance is stopped first.
    pub fn start(&self) {
        self.stop();
        let zone = resolve_zone(self.config.timezone.as_deref());
        let mut handles = self.handles.lock();

        if self.config.daily_enabled {
            if let Some(handle) = self.spawn_job("daily", &self.config.daily_cron, zone, JobKind::Daily) {
                handles.push(handle);
            }
        }
        if self.config.weekly_enabled {
            if let Some(handle) =
                self.spawn_job("weekly", &self.config.weekly_cron, zone, JobKind::Weekly)
            {
                handles.push(handle);
            }
        }
        if self.alerts.health_check_enabled {
            if let Some(handle) =
                self.spawn_job("health", &self.alerts.health_check_cron, zone, JobKind::Health)
            {
                handles.push(handle);
            }
        }
        tracing::info!(jobs = handles.len(), "facts scheduler started");
    }

    fn spawn_job(
        &self,
        name: &'static str,
        cron_expr: &str,
        zone: SchedulerZone,
        kind: JobKind,
    ) -> Option<JoinHandle<()>> {
        let schedule = match Schedule::from_str(cron_expr) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(job = name, cron = cron_expr, error = %e, "invalid cron expression");
                return None;
            }
        };
        let ctx = self.ctx.clone();
        Some(tokio::spawn(async move {
            loop {
                let Some(next) = next_fire(&schedule, zone, Utc::now()) else {
                    tracing::warn!(job = name, "schedule has no future fire time, stopping job");
                    return;
                };
                let wait = (next - Utc::now()).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;
                tracing::debug!(job = name, "scheduled job firing");
                run_job(kind, &ctx);
            }
        }))
    }

    /// Stop all jobs. Running job bodies are not interrupted mid-execution.
    pub fn stop(&self) {
        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handles.lock().is_empty()
    }

    /// Next fire time per job.
    pub fn status(&self) -> Vec<JobStatus> {
        let zone = resolve_zone(self.config.timezone.as_deref());
        let now = Utc::now();
        let entry = |name: &str, enabled: bool, cron_expr: &str| JobStatus {
            name: name.to_string(),
            enabled,
            next_run: if enabled {
                Schedule::from_str(cron_expr).ok().and_then(|s| next_fire(&s, zone, now))
            } else {
                None
            },
        };
        vec![
            entry("daily", self.config.daily_enabled, &self.config.daily_cron),
            entry("weekly", self.config.weekly_enabled, &self.config.weekly_cron),
            entry("health", self.alerts.health_check_enabled, &self.alerts.health_check_cron),
        ]
    }

    /// Run consolidation inline, outside the schedule.
    pub fn trigger_consolidation_now(&self) -> Result<ConsolidationReport, FactsError> {
        consolidation_job(&self.ctx)
    }

    /// Run the health check inline, outside the schedule.
    pub fn trigger_health_check_now(&self) -> Result<HealthSnapshot, FactsError> {
        health_job(&self.ctx)
    }
}

impl Drop for FactsScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobKind {
    Daily,
    Weekly,
    Health,
}

fn run_job(kind: JobKind, ctx: &SchedulerContext) {
    let result = match kind {
        JobKind::Daily | JobKind::Weekly => consolidation_job(ctx).map(|report| {
            tracing::info!(
                daily = report.daily.map(|d| d.to_string()).unwrap_or_default(),
                weekly = report.weekly.clone().unwrap_or_default(),
                expired = report.prune.expired,
                deleted = report.prune.deleted,
                "consolidation complete"
            );
        }),
        JobKind::Health => health_job(ctx).map(|snapshot| {
            tracing::info!(
                db_size_mb = snapshot.db_size_mb,
                memories = snapshot.total_memories,
                "health check complete"
            );
        }),
    };
    // Job errors are logged and swallowed; the schedule keeps ticking.
    if let Err(e) = result {
        tracing::error!(job = ?kind, error = %e, "scheduled job failed");
    }
}

fn consolidation_job(ctx: &SchedulerContext) -> Result<ConsolidationReport, FactsError> {
    let clock = SystemClock;
    run_consolidation(
        &ctx.store,
        &ctx.retention,
        clock.today(),
        ctx.summarizer.as_deref(),
        ctx.markdown_root.as_deref(),
        &ctx.telemetry,
        clock.epoch_ms(),
    )
}

fn health_job(ctx: &SchedulerContext) -> Result<HealthSnapshot, FactsError> {
    let clock = SystemClock;
    ctx.health.run_health_check(&ctx.store, &ctx.telemetry, clock.epoch_ms())
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
