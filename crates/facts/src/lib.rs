// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dc-facts: SQLite-backed conversational memory.
//!
//! Content-addressed memory entries with hybrid retrieval (full-text +
//! importance + recency), periodic consolidation into daily/weekly
//! summaries, pruning, health monitoring, role-gated access, and JSONL
//! export/import.

pub mod access;
pub mod consolidate;
pub mod guardrails;
pub mod health;
pub mod llm;
pub mod model;
pub mod retrieval;
pub mod scheduler;
pub mod store;
pub mod transfer;

pub use access::Role;
pub use consolidate::{
    generate_daily_summary, generate_weekly_summary, prune_memories, run_consolidation,
    ConsolidationReport, PruneReport,
};
pub use guardrails::{ExtractionGate, FactsTelemetry, GuardrailVerdict, Message};
pub use health::{
    AlertSeverity, HealthAlert, HealthMonitor, HealthSnapshot, HealthStatus, HealthSummary,
    HealthThresholds,
};
pub use llm::{parse_summary_response, LlmSummary, Summarizer};
pub use model::{
    BlockLabel, DailySummary, FactsError, MemoryBlock, MemoryEntry, MemoryPatch, MemorySource,
    MemoryType, WeeklySummary,
};
pub use retrieval::{
    build_session_context, get_relevant_context, get_relevant_context_with_trace, RetrievalOptions,
    RetrievalTrace, ScoredMemory, SessionContextOptions, TraceReason, TraceSource,
    IMPORTANT_MEMORY_THRESHOLD,
};
pub use scheduler::{FactsScheduler, JobStatus};
pub use store::{FactsStore, ListOptions};
pub use transfer::{
    export_jsonl, import_jsonl, rebuild_fts, run_integrity_check, vacuum, ExportOptions,
    ExportReport, ImportMode, ImportReport, RepairReport,
};
