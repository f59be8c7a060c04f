// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quota-driven cleanup of old run directories.
//!
//! Full mode deletes entire run directories; `artifacts` and `logs` modes
//! delete only the matching subtrees and always preserve `run.json` and
//! `approvals.jsonl`. Non-terminal runs are never touched.

use crate::state::{RunStore, StorageError};
use dc_core::{Clock, RetentionConfig, RunId, RunStatus};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

const MS_PER_DAY: u64 = 24 * 60 * 60 * 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupMode {
    Full,
    Artifacts,
    Logs,
}

dc_core::simple_display! {
    CleanupMode {
        Full => "full",
        Artifacts => "artifacts",
        Logs => "logs",
    }
}

/// One sweep invocation, policy plus CLI overrides.
#[derive(Debug, Clone)]
pub struct CleanupRequest {
    pub mode: CleanupMode,
    pub dry_run: bool,
    /// Only touch runs older than this many days.
    pub older_than_days: Option<u32>,
    /// Only touch runs with this terminal status.
    pub status: Option<RunStatus>,
    /// Cap the number of runs touched.
    pub max: Option<usize>,
}

impl CleanupRequest {
    pub fn full() -> Self {
        Self { mode: CleanupMode::Full, dry_run: false, older_than_days: None, status: None, max: None }
    }

    pub fn mode(mode: CleanupMode) -> Self {
        Self { mode, ..Self::full() }
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub candidates: Vec<RunId>,
    pub deleted: usize,
    pub freed_bytes: u64,
    pub dry_run: bool,
    /// Runs skipped because their status was not terminal.
    pub skipped_live: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CleanupEventKind {
    #[serde(rename = "cleanup:start")]
    Start,
    #[serde(rename = "cleanup:complete")]
    Complete,
    #[serde(rename = "cleanup:error")]
    Error,
}

/// One line in the global cleanup log.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CleanupEvent {
    #[serde(rename = "type")]
    kind: CleanupEventKind,
    timestamp: u64,
    data: serde_json::Value,
}

/// Single-writer append-only global cleanup log.
pub struct CleanupLog {
    path: PathBuf,
    writer: Mutex<()>,
}

impl CleanupLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), writer: Mutex::new(()) }
    }

    pub fn append(
        &self,
        kind: CleanupEventKind,
        timestamp: u64,
        data: serde_json::Value,
    ) -> Result<(), StorageError> {
        let _guard = self.writer.lock();
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let mut line = serde_json::to_vec(&CleanupEvent { kind, timestamp, data })?;
        line.push(b'\n');
        file.write_all(&line)?;
        Ok(())
    }
}

/// Applies the retention policy to the runs root.
pub struct RetentionSweeper<C: Clock> {
    store: RunStore,
    policy: RetentionConfig,
    log: CleanupLog,
    clock: C,
}

struct Candidate {
    id: RunId,
    status: RunStatus,
    created_at: u64,
    disk_bytes: u64,
}

impl<C: Clock> RetentionSweeper<C> {
    pub fn new(store: RunStore, policy: RetentionConfig, log: CleanupLog, clock: C) -> Self {
        Self { store, policy, log, clock }
    }

    /// Run one sweep. Dry-run reports candidates and estimated freed bytes
    /// without deleting anything.
    pub fn sweep(&self, request: &CleanupRequest) -> Result<CleanupReport, StorageError> {
        let now = self.clock.epoch_ms();
        self.log.append(
            CleanupEventKind::Start,
            now,
            serde_json::json!({ "mode": request.mode.to_string(), "dryRun": request.dry_run }),
        )?;

        match self.sweep_inner(request, now) {
            Ok(report) => {
                self.log.append(
                    CleanupEventKind::Complete,
                    self.clock.epoch_ms(),
                    serde_json::json!({
                        "deleted": report.deleted,
                        "freedBytes": report.freed_bytes,
                        "dryRun": report.dry_run,
                    }),
                )?;
                Ok(report)
            }
            Err(e) => {
                self.log.append(
                    CleanupEventKind::Error,
                    self.clock.epoch_ms(),
                    serde_json::json!({ "error": e.to_string() }),
                )?;
                Err(e)
            }
        }
    }

    fn sweep_inner(&self, request: &CleanupRequest, now: u64) -> Result<CleanupReport, StorageError> {
        let mut report = CleanupReport { dry_run: request.dry_run, ..Default::default() };
        let mut terminal = Vec::new();

        for id in self.store.list_runs()? {
            let Some(run) = self.store.load(&id)? else {
                continue;
            };
            if !run.status.is_terminal() {
                report.skipped_live += 1;
                continue;
            }
            terminal.push(Candidate {
                id,
                status: run.status,
                created_at: run.created_at,
                disk_bytes: self.store.disk_usage(&id)?,
            });
        }

        let mut selected = match request.mode {
            CleanupMode::Full => self.select_full(&terminal, now),
            // Partial modes touch every terminal run matching the overrides;
            // the keep-newest rule only guards whole-directory deletion.
            CleanupMode::Artifacts | CleanupMode::Logs => {
                terminal.iter().map(|c| c.id).collect::<Vec<_>>()
            }
        };

        // CLI overrides narrow the selection.
        if let Some(days) = request.older_than_days {
            let cutoff = now.saturating_sub(u64::from(days) * MS_PER_DAY);
            selected.retain(|id| {
                terminal.iter().any(|c| c.id == *id && c.created_at <= cutoff)
            });
        }
        if let Some(status) = request.status {
            selected.retain(|id| terminal.iter().any(|c| c.id == *id && c.status == status));
        }
        if let Some(max) = request.max {
            selected.truncate(max);
        }

        for id in selected {
            let freed = match request.mode {
                CleanupMode::Full => self.store.disk_usage(&id)?,
                CleanupMode::Artifacts => self.subtree_size(&id, "artifacts")?,
                CleanupMode::Logs => {
                    let paths = self.store.paths(&id);
                    self.subtree_size(&id, "logs")?
                        + fs::metadata(paths.events_log()).map(|m| m.len()).unwrap_or(0)
                }
            };
            report.candidates.push(id);
            report.freed_bytes += freed;

            if request.dry_run {
                continue;
            }
            match request.mode {
                CleanupMode::Full => self.store.delete(&id)?,
                CleanupMode::Artifacts => self.remove_subtrees(&id, "artifacts")?,
                CleanupMode::Logs => {
                    self.remove_subtrees(&id, "logs")?;
                    let events = self.store.paths(&id).events_log();
                    if events.exists() {
                        fs::remove_file(events)?;
                    }
                }
            }
            report.deleted += 1;
        }
        Ok(report)
    }

    /// Policy selection for full deletion: completed runs beyond the newest
    /// `max_completed`, expired failed/cancelled runs, and quota overruns.
    fn select_full(&self, terminal: &[Candidate], now: u64) -> Vec<RunId> {
        let mut selected = Vec::new();

        let mut completed: Vec<&Candidate> =
            terminal.iter().filter(|c| c.status == RunStatus::Completed).collect();
        // Newest first; keep the head, delete the tail.
        completed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        for candidate in completed.iter().skip(self.policy.max_completed) {
            selected.push(candidate.id);
        }

        let failed_cutoff =
            now.saturating_sub(u64::from(self.policy.failed_log_retention_days) * MS_PER_DAY);
        for candidate in terminal
            .iter()
            .filter(|c| matches!(c.status, RunStatus::Failed | RunStatus::Cancelled))
        {
            if candidate.created_at <= failed_cutoff {
                selected.push(candidate.id);
            }
        }

        // Per-run disk quota.
        let per_run_cap = self.policy.max_disk_per_workflow_mb * 1024 * 1024;
        for candidate in terminal {
            if candidate.disk_bytes > per_run_cap && !selected.contains(&candidate.id) {
                selected.push(candidate.id);
            }
        }

        // Total disk quota: evict oldest completed runs until under budget.
        let total_cap = self.policy.max_total_disk_gb * 1024 * 1024 * 1024;
        let mut total: u64 = terminal.iter().map(|c| c.disk_bytes).sum();
        if total > total_cap {
            let mut oldest: Vec<&Candidate> = completed;
            oldest.sort_by_key(|c| c.created_at);
            for candidate in oldest {
                if total <= total_cap {
                    break;
                }
                if !selected.contains(&candidate.id) {
                    selected.push(candidate.id);
                    total = total.saturating_sub(candidate.disk_bytes);
                }
            }
        }

        selected
    }

    fn phase_subdirs(&self, run_id: &str, leaf: &str) -> Result<Vec<PathBuf>, StorageError> {
        let phases = self.store.paths(run_id).phases_root();
        let mut dirs = Vec::new();
        let entries = match fs::read_dir(&phases) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(dirs),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let dir = entry.path().join(leaf);
            if dir.is_dir() {
                dirs.push(dir);
            }
        }
        Ok(dirs)
    }

    fn subtree_size(&self, run_id: &str, leaf: &str) -> Result<u64, StorageError> {
        let mut total = 0;
        for dir in self.phase_subdirs(run_id, leaf)? {
            total += dir_size_of(&dir)?;
        }
        Ok(total)
    }

    fn remove_subtrees(&self, run_id: &str, leaf: &str) -> Result<(), StorageError> {
        for dir in self.phase_subdirs(run_id, leaf)? {
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }
}

fn dir_size_of(path: &std::path::Path) -> std::io::Result<u64> {
    let mut total = 0;
    for entry in fs::read_dir(path)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size_of(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
#[path = "retention_tests.rs"]
mod tests;
