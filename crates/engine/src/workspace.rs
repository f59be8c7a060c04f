// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace preparation for a run.
//!
//! `in-place` uses the target repo directly; `copy` snapshots it into the
//! run directory; `worktree` creates a git worktree on a fresh branch.

use dc_core::{WorkspaceMode, WorkspaceSpec};
use dc_storage::RunPaths;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("target repo does not exist: {0}")]
    MissingTarget(PathBuf),
    #[error("target is not a git repository: {0}")]
    NotGit(PathBuf),
    #[error("git worktree failed: {0}")]
    Worktree(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Check the workspace spec's validation rules against the target.
pub fn validate(spec: &WorkspaceSpec) -> Result<(), WorkspaceError> {
    if !spec.target_repo.is_dir() {
        return Err(WorkspaceError::MissingTarget(spec.target_repo.clone()));
    }
    let needs_git = spec.require_git || spec.mode == WorkspaceMode::Worktree;
    if needs_git && !spec.target_repo.join(".git").exists() {
        return Err(WorkspaceError::NotGit(spec.target_repo.clone()));
    }
    Ok(())
}

/// Materialize the execution directory for a run.
pub async fn prepare(spec: &WorkspaceSpec, paths: &RunPaths) -> Result<PathBuf, WorkspaceError> {
    validate(spec)?;
    match spec.mode {
        WorkspaceMode::InPlace => Ok(spec.target_repo.clone()),
        WorkspaceMode::Copy => {
            let dest = paths.root().join("workspace");
            // Resume reuses the snapshot taken at first execution.
            if !dest.exists() {
                copy_tree(&spec.target_repo, &dest)?;
            }
            Ok(dest)
        }
        WorkspaceMode::Worktree => {
            let dest = paths.root().join("workspace");
            if dest.exists() {
                return Ok(dest);
            }
            let branch = spec
                .branch
                .clone()
                .unwrap_or_else(|| format!("dc/{}", paths.root().file_name().and_then(|n| n.to_str()).unwrap_or("run")));
            let start_point = spec.base_branch.clone().unwrap_or_else(|| "HEAD".to_string());

            let output = tokio::process::Command::new("git")
                .args([
                    "-C",
                    &spec.target_repo.display().to_string(),
                    "worktree",
                    "add",
                    "-b",
                    &branch,
                    &dest.display().to_string(),
                    &start_point,
                ])
                .env_remove("GIT_DIR")
                .env_remove("GIT_WORK_TREE")
                .output()
                .await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(WorkspaceError::Worktree(stderr.trim().to_string()));
            }
            Ok(dest)
        }
    }
}

/// Recursive copy skipping `.git` and `node_modules`.
fn copy_tree(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(to)?;
    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let name = entry.file_name();
        if name == ".git" || name == "node_modules" || name == "target" {
            continue;
        }
        let dest = to.join(&name);
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else {
            std::fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
