// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Atomic run-state persistence.

use crate::paths::RunPaths;
use dc_core::{RunId, WorkflowRun};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Truncated SHA-256 length in hex characters.
const CHECKSUM_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Stores run state as JSON files under a workflows root directory.
#[derive(Debug, Clone)]
pub struct RunStore {
    workflows_root: PathBuf,
}

impl RunStore {
    pub fn new(workflows_root: impl Into<PathBuf>) -> Self {
        Self { workflows_root: workflows_root.into() }
    }

    pub fn workflows_root(&self) -> &Path {
        &self.workflows_root
    }

    pub fn paths(&self, run_id: &str) -> RunPaths {
        RunPaths::new(&self.workflows_root, run_id)
    }

    /// Persist `run.json` atomically (temp file + rename).
    pub fn save(&self, run: &WorkflowRun) -> Result<(), StorageError> {
        let paths = self.paths(&run.id);
        fs::create_dir_all(paths.root())?;
        let json = serde_json::to_vec_pretty(run)?;
        atomic_write(&paths.run_state(), &json)?;
        Ok(())
    }

    /// Persist the original input snapshot (`input.json`).
    pub fn save_input(&self, run: &WorkflowRun) -> Result<(), StorageError> {
        let paths = self.paths(&run.id);
        fs::create_dir_all(paths.root())?;
        let json = serde_json::to_vec_pretty(&run.input)?;
        atomic_write(&paths.input_snapshot(), &json)?;
        Ok(())
    }

    /// Load a run's state; `None` when the run does not exist.
    pub fn load(&self, run_id: &str) -> Result<Option<WorkflowRun>, StorageError> {
        let path = self.paths(run_id).run_state();
        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_slice(&data)?))
    }

    /// Recursively remove the run directory.
    pub fn delete(&self, run_id: &str) -> Result<(), StorageError> {
        let root = self.paths(run_id).root().to_path_buf();
        match fs::remove_dir_all(&root) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Total bytes of all files under the run directory.
    pub fn disk_usage(&self, run_id: &str) -> Result<u64, StorageError> {
        Ok(dir_size(self.paths(run_id).root())?)
    }

    /// All run IDs under the workflows root, sorted (creation order).
    pub fn list_runs(&self) -> Result<Vec<RunId>, StorageError> {
        let mut ids = Vec::new();
        let entries = match fs::read_dir(&self.workflows_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(ids),
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.starts_with(RunId::PREFIX) {
                    ids.push(RunId::from_string(name));
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Truncated SHA-256 over the canonical JSON of the run state.
    pub fn checksum(run: &WorkflowRun) -> Result<String, StorageError> {
        let json = serde_json::to_vec(run)?;
        let digest = Sha256::digest(&json);
        let mut hex = String::with_capacity(CHECKSUM_LEN);
        for byte in digest.iter().take(CHECKSUM_LEN / 2) {
            hex.push_str(&format!("{:02x}", byte));
        }
        Ok(hex)
    }

    /// Persist state and its checksum side file.
    pub fn save_with_checksum(&self, run: &WorkflowRun) -> Result<(), StorageError> {
        self.save(run)?;
        let checksum = Self::checksum(run)?;
        atomic_write(&self.paths(&run.id).checksum(), checksum.as_bytes())?;
        Ok(())
    }

    /// Verify the stored checksum. Opt-in: absence of the side file is ok.
    pub fn verify_checksum(&self, run_id: &str) -> Result<bool, StorageError> {
        let paths = self.paths(run_id);
        let stored = match fs::read_to_string(paths.checksum()) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
            Err(e) => return Err(e.into()),
        };
        let Some(run) = self.load(run_id)? else {
            return Ok(false);
        };
        Ok(stored.trim() == Self::checksum(&run)?)
    }
}

/// Write via a sibling temp file then rename into place.
///
/// On platforms where rename over an existing target fails, unlink the
/// target and retry once.
fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(data)?;
        file.sync_all()?;
    }
    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(_) => {
            let _ = fs::remove_file(path);
            fs::rename(&tmp, path)
        }
    }
}

fn dir_size(path: &Path) -> std::io::Result<u64> {
    let mut total = 0;
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_dir() {
            total += dir_size(&entry.path())?;
        } else {
            total += meta.len();
        }
    }
    Ok(total)
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
