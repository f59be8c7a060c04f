// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Approval record store: in-memory index plus per-run JSONL stream.
//!
//! Records are immutable once written. Identity for "remember" matching is
//! `(runId, actionType, normalized target)`.

use crate::state::StorageError;
use dc_core::{ApprovalId, RunId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approved,
    Denied,
    Timeout,
}

dc_core::simple_display! {
    ApprovalDecision {
        Approved => "approved",
        Denied => "denied",
        Timeout => "timeout",
    }
}

impl ApprovalDecision {
    pub fn is_approved(self) -> bool {
        self == ApprovalDecision::Approved
    }
}

/// How long a remembered decision applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RememberScope {
    /// Applies to this request only; never matched again.
    Once,
    /// Applies to identical actions within the same phase.
    Phase,
    /// Applies to identical actions anywhere in the run.
    Run,
}

dc_core::simple_display! {
    RememberScope {
        Once => "once",
        Phase => "phase",
        Run => "run",
    }
}

/// The side-effecting action an approval covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalAction {
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ApprovalAction {
    pub fn file(action_type: impl Into<String>, target_path: impl Into<PathBuf>) -> Self {
        Self {
            action_type: action_type.into(),
            target_path: Some(target_path.into()),
            command: None,
            url: None,
        }
    }

    pub fn command(action_type: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            target_path: None,
            command: Some(command.into()),
            url: None,
        }
    }

    pub fn url(action_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self { action_type: action_type.into(), target_path: None, command: None, url: Some(url.into()) }
    }

    /// Canonical target string used for remember matching.
    pub fn normalized_target(&self) -> String {
        if let Some(path) = &self.target_path {
            return normalize_path(path);
        }
        if let Some(command) = &self.command {
            return command.split_whitespace().collect::<Vec<_>>().join(" ");
        }
        if let Some(url) = &self.url {
            return url.trim().trim_end_matches('/').to_ascii_lowercase();
        }
        String::new()
    }
}

/// Lexical path cleanup: drop `.` segments, collapse separators.
fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.components() {
        use std::path::Component;
        match component {
            Component::CurDir => {}
            Component::RootDir => parts.insert(0, ""),
            Component::Normal(p) => parts.push(p.to_str().unwrap_or_default()),
            Component::ParentDir => parts.push(".."),
            Component::Prefix(_) => {}
        }
    }
    parts.join("/")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRequest {
    pub id: ApprovalId,
    pub run_id: RunId,
    pub phase_id: String,
    pub reason: String,
    pub action: ApprovalAction,
    pub created_at: u64,
}

impl ApprovalRequest {
    pub fn new(
        run_id: RunId,
        phase_id: impl Into<String>,
        reason: impl Into<String>,
        action: ApprovalAction,
        created_at: u64,
    ) -> Self {
        Self {
            id: ApprovalId::generate(),
            run_id,
            phase_id: phase_id.into(),
            reason: reason.into(),
            action,
            created_at,
        }
    }
}

/// One decided approval, appended to `approvals.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    pub request: ApprovalRequest,
    pub decision: ApprovalDecision,
    pub decided_at: u64,
    pub remember: bool,
    pub remember_scope: RememberScope,
}

/// Composite store: process-local index backed by per-run JSONL files at
/// `{baseDir}/{runId}/approvals.jsonl`.
pub struct ApprovalStore {
    base_dir: PathBuf,
    index: Mutex<HashMap<String, Vec<ApprovalRecord>>>,
}

impl ApprovalStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into(), index: Mutex::new(HashMap::new()) }
    }

    fn log_path(&self, run_id: &str) -> PathBuf {
        self.base_dir.join(run_id).join("approvals.jsonl")
    }

    /// Append a record to the run's JSONL stream and the in-memory index.
    pub fn save(&self, record: &ApprovalRecord) -> Result<(), StorageError> {
        let path = self.log_path(&record.request.run_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        file.write_all(&line)?;
        file.sync_data()?;

        self.index
            .lock()
            .entry(record.request.run_id.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    /// All records for a run, oldest first. Falls back to the JSONL file
    /// when the process index has no entry (e.g. after restart).
    pub fn get_by_run(&self, run_id: &str) -> Result<Vec<ApprovalRecord>, StorageError> {
        if let Some(records) = self.index.lock().get(run_id) {
            return Ok(records.clone());
        }
        let records = self.read_log(run_id)?;
        if !records.is_empty() {
            self.index.lock().insert(run_id.to_string(), records.clone());
        }
        Ok(records)
    }

    fn read_log(&self, run_id: &str) -> Result<Vec<ApprovalRecord>, StorageError> {
        let data = match fs::read_to_string(self.log_path(run_id)) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for line in data.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    tracing::warn!(run_id, error = %e, "skipping corrupt approval line");
                }
            }
        }
        Ok(records)
    }

    /// Find a remembered decision covering this request.
    ///
    /// `once` records never match; `phase` records match within the same
    /// phase; `run` records match anywhere in the run. The newest matching
    /// record wins.
    pub fn find_matching(
        &self,
        request: &ApprovalRequest,
    ) -> Result<Option<ApprovalRecord>, StorageError> {
        let records = self.get_by_run(&request.run_id)?;
        let target = request.action.normalized_target();
        Ok(records
            .into_iter()
            .rev()
            .find(|record| {
                if !record.remember {
                    return false;
                }
                if record.request.action.action_type != request.action.action_type {
                    return false;
                }
                if record.request.action.normalized_target() != target {
                    return false;
                }
                match record.remember_scope {
                    RememberScope::Once => false,
                    RememberScope::Phase => record.request.phase_id == request.phase_id,
                    RememberScope::Run => true,
                }
            }))
    }

    /// Drop the run from the index and delete its JSONL file.
    pub fn clear_run(&self, run_id: &str) -> Result<(), StorageError> {
        self.index.lock().remove(run_id);
        match fs::remove_file(self.log_path(run_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
#[path = "approvals_tests.rs"]
mod tests;
