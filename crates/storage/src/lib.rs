// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dc-storage: durable on-disk state for workflow runs.
//!
//! Owns the run directory layout, atomic run-state JSON, the append-only
//! event log, the approval record store, and retention-driven cleanup.

pub mod approvals;
pub mod events;
pub mod paths;
pub mod retention;
pub mod state;

pub use approvals::{
    ApprovalAction, ApprovalDecision, ApprovalRecord, ApprovalRequest, ApprovalStore,
    RememberScope,
};
pub use events::EventLog;
pub use paths::RunPaths;
pub use retention::{
    CleanupEventKind, CleanupLog, CleanupMode, CleanupReport, CleanupRequest, RetentionSweeper,
};
pub use state::{RunStore, StorageError};
