// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! dc-engine: phase engines, runner abstraction, and the orchestrator.
//!
//! The orchestrator drives a run's phase loop; each phase is implemented by
//! one of three engines (planner, executor, reviewer) which produce
//! artifacts, delegating to an external agent runner in live mode.

pub mod engine;
pub mod executor;
pub mod gate;
pub mod markers;
pub mod orchestrator;
pub mod planner;
pub mod progress;
pub mod reviewer;
pub mod runner;
pub mod tasks;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use engine::{engine_for, Engine, EngineContext, EngineResult, Validation};
pub use gate::PolicyGate;
pub use orchestrator::{Orchestrator, OrchestratorError, OrchestratorOptions};
pub use progress::{ProgressEvent, ProgressSink};
pub use runner::{
    session_id, LiveRunner, Runner, RunnerError, RunnerMetrics, RunnerOutcome, RunnerRequest,
    StubRunner,
};
#[cfg(any(test, feature = "test-support"))]
pub use runner::ScriptedRunner;
pub use tasks::{PlanTask, TaskList, TaskStatus};
