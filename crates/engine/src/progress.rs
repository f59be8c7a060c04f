// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine progress callbacks.

use std::sync::Arc;

/// One progress notification from an engine or runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Status(String),
    Artifact(String),
    Task(String),
    Error(String),
}

type Callback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Cheap, cloneable fan-out point for progress events. A sink without a
/// callback swallows events.
#[derive(Clone, Default)]
pub struct ProgressSink {
    callback: Option<Callback>,
}

impl ProgressSink {
    pub fn new(callback: impl Fn(ProgressEvent) + Send + Sync + 'static) -> Self {
        Self { callback: Some(Arc::new(callback)) }
    }

    pub fn none() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }

    pub fn status(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Status(message.into()));
    }

    pub fn artifact(&self, name: impl Into<String>) {
        self.emit(ProgressEvent::Artifact(name.into()));
    }

    pub fn task(&self, name: impl Into<String>) {
        self.emit(ProgressEvent::Task(name.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(ProgressEvent::Error(message.into()));
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").field("attached", &self.callback.is_some()).finish()
    }
}

#[cfg(test)]
#[path = "progress_tests.rs"]
mod tests;
