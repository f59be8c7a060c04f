// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orchestrator events, one JSON object per `events.jsonl` line.

use crate::id::RunId;
use serde::{Deserialize, Serialize};

/// Event type discriminator, serialized as `namespace:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "workflow:started")]
    WorkflowStarted,
    #[serde(rename = "workflow:paused")]
    WorkflowPaused,
    #[serde(rename = "workflow:resumed")]
    WorkflowResumed,
    #[serde(rename = "workflow:completed")]
    WorkflowCompleted,
    #[serde(rename = "workflow:failed")]
    WorkflowFailed,
    #[serde(rename = "workflow:cancelled")]
    WorkflowCancelled,
    #[serde(rename = "phase:started")]
    PhaseStarted,
    #[serde(rename = "phase:completed")]
    PhaseCompleted,
    #[serde(rename = "phase:failed")]
    PhaseFailed,
    #[serde(rename = "artifact:created")]
    ArtifactCreated,
    #[serde(rename = "iteration:started")]
    IterationStarted,
}

crate::simple_display! {
    EventKind {
        WorkflowStarted => "workflow:started",
        WorkflowPaused => "workflow:paused",
        WorkflowResumed => "workflow:resumed",
        WorkflowCompleted => "workflow:completed",
        WorkflowFailed => "workflow:failed",
        WorkflowCancelled => "workflow:cancelled",
        PhaseStarted => "phase:started",
        PhaseCompleted => "phase:completed",
        PhaseFailed => "phase:failed",
        ArtifactCreated => "artifact:created",
        IterationStarted => "iteration:started",
    }
}

impl EventKind {
    /// Kinds that require run state to be persisted around emission.
    pub fn is_persistent(self) -> bool {
        !matches!(self, EventKind::ArtifactCreated | EventKind::IterationStarted)
    }
}

/// One orchestrator event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub workflow_id: RunId,
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl RunEvent {
    pub fn new(kind: EventKind, workflow_id: RunId, timestamp: u64) -> Self {
        Self { kind, workflow_id, timestamp, data: None }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
