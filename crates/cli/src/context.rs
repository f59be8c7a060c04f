// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for CLI commands.

use anyhow::Context as _;
use dc_core::{Config, SystemClock};
use dc_facts::health::{HealthMonitor, HealthThresholds};
use dc_facts::{FactsStore, FactsTelemetry};
use dc_storage::RunStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct AppContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub clock: SystemClock,
}

impl AppContext {
    pub fn load(data_dir: &Path, config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = match config_path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Config::from_toml_str(&raw)?
            }
            None => Config::default(),
        };
        Ok(Self { config, data_dir: data_dir.to_path_buf(), clock: SystemClock })
    }

    pub fn workflows_root(&self) -> PathBuf {
        self.data_dir.join("workflows")
    }

    pub fn run_store(&self) -> RunStore {
        RunStore::new(self.workflows_root())
    }

    pub fn cleanup_log(&self) -> PathBuf {
        self.data_dir.join("cleanup.jsonl")
    }

    pub fn facts_db_path(&self) -> PathBuf {
        self.config
            .facts_memory
            .db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("facts.db"))
    }

    pub fn markdown_root(&self) -> Option<PathBuf> {
        self.config
            .facts_memory
            .markdown_path
            .clone()
            .or_else(|| Some(self.data_dir.clone()))
    }

    pub fn facts_store(&self) -> anyhow::Result<FactsStore> {
        Ok(FactsStore::open(&self.facts_db_path())?)
    }

    pub fn health_monitor(&self) -> Arc<HealthMonitor> {
        let thresholds = HealthThresholds {
            db_size_mb: self.config.facts_memory.retention.max_size_mb as f64,
            ..Default::default()
        };
        Arc::new(HealthMonitor::new(
            thresholds,
            self.config.facts_memory.alerts.health_check_enabled,
        ))
    }

    pub fn telemetry(&self) -> Arc<FactsTelemetry> {
        Arc::new(FactsTelemetry::default())
    }
}
