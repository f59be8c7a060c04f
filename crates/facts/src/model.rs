// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Memory data model.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactsError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("integrity check failed: {0}")]
    Integrity(String),
    #[error("full-text index unavailable")]
    FtsUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Preference,
    Decision,
    Event,
    Todo,
}

dc_core::simple_display! {
    MemoryType {
        Fact => "fact",
        Preference => "preference",
        Decision => "decision",
        Event => "event",
        Todo => "todo",
    }
}

impl MemoryType {
    pub const ALL: [MemoryType; 5] = [
        MemoryType::Fact,
        MemoryType::Preference,
        MemoryType::Decision,
        MemoryType::Event,
        MemoryType::Todo,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.to_string() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemorySource {
    Explicit,
    Inferred,
    Conversation,
}

dc_core::simple_display! {
    MemorySource {
        Explicit => "explicit",
        Inferred => "inferred",
        Conversation => "conversation",
    }
}

impl MemorySource {
    pub fn parse(s: &str) -> Option<Self> {
        [MemorySource::Explicit, MemorySource::Inferred, MemorySource::Conversation]
            .into_iter()
            .find(|v| v.to_string() == s)
    }
}

/// One remembered fact/preference/decision/event/todo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    pub content: String,
    pub source: MemorySource,
    /// [0, 1]. Updating importance does not touch `created_at`.
    pub importance: f64,
    /// [0, 1].
    pub confidence: f64,
    pub created_at: u64,
    /// Advances only on explicit get/search.
    pub last_accessed_at: u64,
    pub updated_at: u64,
    pub access_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
}

impl MemoryEntry {
    /// Create a new entry stamped at `now_ms` with a fresh opaque id.
    pub fn new(
        memory_type: MemoryType,
        content: impl Into<String>,
        source: MemorySource,
        importance: f64,
        now_ms: u64,
    ) -> Self {
        Self {
            id: format!("mem-{}", nanoid::nanoid!(12)),
            memory_type,
            content: content.into(),
            source,
            importance: importance.clamp(0.0, 1.0),
            confidence: 1.0,
            created_at: now_ms,
            last_accessed_at: now_ms,
            updated_at: now_ms,
            access_count: 0,
            expires_at: None,
            tags: Vec::new(),
            supersedes: None,
            superseded_by: None,
            embedding: None,
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_expiry(mut self, expires_at: u64) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

/// Partial update for [`MemoryEntry`]; `None` fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MemoryPatch {
    pub content: Option<String>,
    pub importance: Option<f64>,
    pub confidence: Option<f64>,
    pub expires_at: Option<Option<u64>>,
    pub tags: Option<Vec<String>>,
    pub supersedes: Option<Option<String>>,
    pub superseded_by: Option<Option<String>>,
}

/// Singleton markdown buffers injected into every session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockLabel {
    Persona,
    UserProfile,
    ActiveContext,
}

dc_core::simple_display! {
    BlockLabel {
        Persona => "persona",
        UserProfile => "user_profile",
        ActiveContext => "active_context",
    }
}

impl BlockLabel {
    pub fn parse(s: &str) -> Option<Self> {
        [BlockLabel::Persona, BlockLabel::UserProfile, BlockLabel::ActiveContext]
            .into_iter()
            .find(|v| v.to_string() == s)
    }
}

/// At most one row per label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryBlock {
    pub label: BlockLabel,
    pub value: String,
    pub updated_at: u64,
}

/// Canonical digest of one day's memories. Re-generation overwrites.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub key_decisions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentioned_entities: Vec<String>,
    pub memory_count: u32,
    pub created_at: u64,
}

/// Digest over one ISO week, keyed `YYYY-Www`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklySummary {
    pub week: String,
    pub content: String,
    pub created_at: u64,
}

/// ISO week key for a date, e.g. `2026-W05`.
pub fn iso_week_key(date: NaiveDate) -> String {
    use chrono::Datelike;
    let week = date.iso_week();
    format!("{}-W{:02}", week.year(), week.week())
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
