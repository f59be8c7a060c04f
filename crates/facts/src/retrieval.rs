// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hybrid retrieval: full-text matches merged with important and recent
//! memories, scored and explained.

use crate::access::Role;
use crate::model::{BlockLabel, FactsError, MemoryEntry, MemoryType};
use crate::store::{FactsStore, ListOptions};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Importance floor for the non-FTS retrieval channel.
pub const IMPORTANT_MEMORY_THRESHOLD: f64 = 0.7;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Why a memory entered the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceSource {
    Fts,
    Importance,
    Recency,
    Semantic,
}

dc_core::simple_display! {
    TraceSource {
        Fts => "fts",
        Importance => "importance",
        Recency => "recency",
        Semantic => "semantic",
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceReason {
    pub memory_id: String,
    pub source: TraceSource,
    pub score: f64,
    pub importance: f64,
    pub access_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fts_score: Option<f64>,
}

/// Structured explanation of one retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalTrace {
    pub query: String,
    pub considered: usize,
    pub returned: usize,
    /// Entries removed by the role filter.
    pub excluded: usize,
    pub excluded_types: Vec<MemoryType>,
    pub reasons: Vec<TraceReason>,
}

#[derive(Debug, Clone)]
pub struct ScoredMemory {
    pub entry: MemoryEntry,
    pub score: f64,
    pub source: TraceSource,
    pub fts_score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct RetrievalOptions {
    pub limit: usize,
    pub min_score: f64,
    pub role: Option<Role>,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self { limit: 10, min_score: 0.0, role: None }
    }
}

/// `importance * recency_decay + access_boost`.
///
/// `recency_decay = max(0.1, 1 - age_days/365)`; the access boost caps at
/// ten accesses so hot entries cannot drown importance.
pub fn score_memory(entry: &MemoryEntry, now_ms: u64) -> f64 {
    let age_days = (now_ms.saturating_sub(entry.created_at)) as f64 / MS_PER_DAY;
    let recency_decay = (1.0 - age_days / 365.0).max(0.1);
    let access_boost = f64::from(entry.access_count.min(10)) * 0.01;
    entry.importance * recency_decay + access_boost
}

/// Merge FTS hits with important memories, dedup, filter, rank, cap.
pub fn get_relevant_context(
    store: &FactsStore,
    query: &str,
    now_ms: u64,
    opts: &RetrievalOptions,
) -> Result<Vec<ScoredMemory>, FactsError> {
    Ok(get_relevant_context_with_trace(store, query, now_ms, opts)?.0)
}

/// Like [`get_relevant_context`] but also returns the retrieval trace.
pub fn get_relevant_context_with_trace(
    store: &FactsStore,
    query: &str,
    now_ms: u64,
    opts: &RetrievalOptions,
) -> Result<(Vec<ScoredMemory>, RetrievalTrace), FactsError> {
    let mut candidates: Vec<ScoredMemory> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // Channel 1: full-text matches (empty when FTS is unavailable).
    for (entry, fts_score) in store.search_fts(query, opts.limit * 2)? {
        if seen.insert(entry.id.clone()) {
            let score = score_memory(&entry, now_ms);
            candidates.push(ScoredMemory {
                entry,
                score,
                source: TraceSource::Fts,
                fts_score: Some(fts_score),
            });
        }
    }

    // Channel 2: important memories regardless of text match.
    for entry in store.list(&ListOptions { memory_type: None, limit: Some(opts.limit * 2) })? {
        if entry.importance < IMPORTANT_MEMORY_THRESHOLD {
            continue;
        }
        if seen.insert(entry.id.clone()) {
            let score = score_memory(&entry, now_ms);
            candidates.push(ScoredMemory { entry, score, source: TraceSource::Importance, fts_score: None });
        }
    }

    let considered = candidates.len();

    // Role gate before ranking so excluded entries never count as returned.
    let mut excluded = 0usize;
    let mut excluded_types: Vec<MemoryType> = Vec::new();
    if let Some(role) = &opts.role {
        candidates.retain(|c| {
            if role.allows(c.entry.memory_type) {
                true
            } else {
                excluded += 1;
                if !excluded_types.contains(&c.entry.memory_type) {
                    excluded_types.push(c.entry.memory_type);
                }
                false
            }
        });
    }

    candidates.retain(|c| c.score >= opts.min_score);

    // Higher score wins; ties broken by descending created_at; stable after.
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.entry.created_at.cmp(&a.entry.created_at))
    });
    candidates.truncate(opts.limit);

    let trace = RetrievalTrace {
        query: query.to_string(),
        considered,
        returned: candidates.len(),
        excluded,
        excluded_types,
        reasons: candidates
            .iter()
            .map(|c| TraceReason {
                memory_id: c.entry.id.clone(),
                source: c.source,
                score: c.score,
                importance: c.entry.importance,
                access_count: c.entry.access_count,
                fts_score: c.fts_score,
            })
            .collect(),
    };
    Ok((candidates, trace))
}

#[derive(Debug, Clone)]
pub struct SessionContextOptions {
    /// Budget for the rendered context; tokens approximated as chars/4.
    pub max_tokens: usize,
    pub max_memories: usize,
}

impl Default for SessionContextOptions {
    fn default() -> Self {
        Self { max_tokens: 2_000, max_memories: 10 }
    }
}

/// Build the standing context injected at prompt-construction time:
/// `user_profile` block, most recent daily summary, then top memories.
pub fn build_session_context(
    store: &FactsStore,
    now_ms: u64,
    opts: &SessionContextOptions,
) -> Result<String, FactsError> {
    let budget_chars = opts.max_tokens.saturating_mul(4);
    let mut sections: Vec<String> = Vec::new();

    if let Some(profile) = store.get_block(BlockLabel::UserProfile)? {
        sections.push(format!("## User profile\n{}", profile.value));
    }

    if let Some(summary) = store.latest_daily_summary()? {
        sections.push(format!("## Daily summary ({})\n{}", summary.date, summary.content));
    }

    let mut entries = store.list(&ListOptions { memory_type: None, limit: Some(opts.max_memories * 4) })?;
    entries.retain(|e| !e.is_expired(now_ms));
    let mut scored: Vec<(f64, MemoryEntry)> =
        entries.into_iter().map(|e| (score_memory(&e, now_ms), e)).collect();
    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.1.created_at.cmp(&a.1.created_at))
    });
    if !scored.is_empty() {
        let mut lines = vec!["## Memories".to_string()];
        for (_, entry) in scored.iter().take(opts.max_memories) {
            lines.push(format!("- [{}] {}", entry.memory_type, entry.content));
        }
        sections.push(lines.join("\n"));
    }

    let mut out = String::new();
    for section in sections {
        // The budget is a hard cap: stop before overflowing it.
        let needed = section.len() + if out.is_empty() { 0 } else { 2 };
        if out.len() + needed > budget_chars {
            break;
        }
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&section);
    }
    Ok(out)
}

#[cfg(test)]
#[path = "retrieval_tests.rs"]
mod tests;
