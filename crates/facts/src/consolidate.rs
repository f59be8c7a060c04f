// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Consolidation: daily/weekly summaries and pruning.

use crate::guardrails::FactsTelemetry;
use crate::llm::{parse_summary_response, Summarizer};
use crate::model::{iso_week_key, DailySummary, FactsError, MemoryEntry, WeeklySummary};
use crate::store::FactsStore;
use chrono::{Datelike, Days, NaiveDate};
use dc_core::config::FactsRetentionConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;

const MS_PER_DAY: u64 = 86_400_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PruneReport {
    /// Rows removed because `expires_at` passed.
    pub expired: u64,
    /// Low-importance rows evicted by age.
    pub deleted: u64,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationReport {
    pub daily: Option<NaiveDate>,
    pub weekly: Option<String>,
    pub prune: PruneReport,
}

fn day_bounds_ms(date: NaiveDate) -> (u64, u64) {
    let start = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp_millis()).unwrap_or(0);
    (start.max(0) as u64, start.max(0) as u64 + MS_PER_DAY)
}

/// Summarize one day's memories.
///
/// Returns `None` (and writes nothing) when the day has no memories. With a
/// summarizer, delegates and parses; otherwise produces a deterministic
/// digest. Persists the row and, when `markdown_root` is given, writes
/// `memory/daily/<date>.md`.
pub fn generate_daily_summary(
    store: &FactsStore,
    date: NaiveDate,
    summarizer: Option<&dyn Summarizer>,
    markdown_root: Option<&Path>,
    now_ms: u64,
) -> Result<Option<DailySummary>, FactsError> {
    let (start, end) = day_bounds_ms(date);
    let memories = store.created_between(start, end)?;
    if memories.is_empty() {
        return Ok(None);
    }

    let summary = match summarizer {
        Some(s) => match s.summarize_daily(date, &memories) {
            Ok(raw) => match parse_summary_response(&raw) {
                Some(parsed) => DailySummary {
                    date,
                    content: parsed.summary,
                    key_decisions: parsed.key_decisions,
                    mentioned_entities: parsed.mentioned_entities,
                    memory_count: memories.len() as u32,
                    created_at: now_ms,
                },
                None => {
                    tracing::warn!(%date, "unparseable summarizer output, using digest");
                    deterministic_daily(date, &memories, now_ms)
                }
            },
            Err(e) => {
                tracing::warn!(%date, error = %e, "summarizer failed, using digest");
                deterministic_daily(date, &memories, now_ms)
            }
        },
        None => deterministic_daily(date, &memories, now_ms),
    };

    store.save_daily_summary(&summary)?;
    if let Some(root) = markdown_root {
        let dir = root.join("memory").join("daily");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(format!("{date}.md")), render_daily_markdown(&summary))?;
    }
    Ok(Some(summary))
}

fn deterministic_daily(date: NaiveDate, memories: &[MemoryEntry], now_ms: u64) -> DailySummary {
    let mut by_type: Vec<(String, Vec<&MemoryEntry>)> = Vec::new();
    for memory in memories {
        let key = memory.memory_type.to_string();
        match by_type.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(memory),
            None => by_type.push((key, vec![memory])),
        }
    }

    let mut lines = vec![format!("{} memories recorded on {date}.", memories.len())];
    for (kind, mut list) in by_type {
        list.sort_by(|a, b| {
            b.importance.partial_cmp(&a.importance).unwrap_or(std::cmp::Ordering::Equal)
        });
        let top: Vec<&str> = list.iter().take(3).map(|m| m.content.as_str()).collect();
        lines.push(format!("{} {}(s): {}", list.len(), kind, top.join("; ")));
    }

    let key_decisions = memories
        .iter()
        .filter(|m| m.memory_type == crate::model::MemoryType::Decision)
        .map(|m| m.content.clone())
        .collect();

    DailySummary {
        date,
        content: lines.join("\n"),
        key_decisions,
        mentioned_entities: Vec::new(),
        memory_count: memories.len() as u32,
        created_at: now_ms,
    }
}

fn render_daily_markdown(summary: &DailySummary) -> String {
    let mut out = format!("# Daily summary {}\n\n{}\n", summary.date, summary.content);
    if !summary.key_decisions.is_empty() {
        out.push_str("\n## Key decisions\n");
        for decision in &summary.key_decisions {
            out.push_str(&format!("- {decision}\n"));
        }
    }
    if !summary.mentioned_entities.is_empty() {
        out.push_str("\n## Entities\n");
        for entity in &summary.mentioned_entities {
            out.push_str(&format!("- {entity}\n"));
        }
    }
    out
}

/// Aggregate the last 7 daily summaries into `YYYY-Www`.
pub fn generate_weekly_summary(
    store: &FactsStore,
    date: NaiveDate,
    markdown_root: Option<&Path>,
    now_ms: u64,
) -> Result<Option<WeeklySummary>, FactsError> {
    let start = date.checked_sub_days(Days::new(6)).unwrap_or(date);
    let dailies = store.daily_summaries_between(start, date)?;
    if dailies.is_empty() {
        return Ok(None);
    }

    let week = iso_week_key(date);
    let mut lines = vec![format!("Week {week}: {} day(s) summarized.", dailies.len())];
    for daily in &dailies {
        lines.push(format!("## {}\n{}", daily.date, daily.content));
    }
    let summary = WeeklySummary { week: week.clone(), content: lines.join("\n\n"), created_at: now_ms };

    store.save_weekly_summary(&summary)?;
    if let Some(root) = markdown_root {
        let dir = root.join("memory").join("weekly");
        std::fs::create_dir_all(&dir)?;
        std::fs::write(dir.join(format!("{week}.md")), format!("# {}\n\n{}\n", week, summary.content))?;
    }
    Ok(Some(summary))
}

/// Delete expired rows, then low-importance aged rows.
///
/// Age eviction requires: older than `max_age_days`, importance below
/// `min_importance`, never accessed, and not superseding another row.
/// Rows with importance ≥ 0.7 are only ever removed by expiry.
pub fn prune_memories(
    store: &FactsStore,
    policy: &FactsRetentionConfig,
    now_ms: u64,
) -> Result<PruneReport, FactsError> {
    let mut report = PruneReport::default();
    let all = store.list(&crate::store::ListOptions::default())?;

    let expired: Vec<String> =
        all.iter().filter(|m| m.is_expired(now_ms)).map(|m| m.id.clone()).collect();
    let (rows, bytes) = store.delete_many(&expired)?;
    report.expired = rows;
    report.bytes_freed += bytes;

    if policy.prune_low_importance {
        let cutoff = now_ms.saturating_sub(u64::from(policy.max_age_days) * MS_PER_DAY);
        let stale: Vec<String> = all
            .iter()
            .filter(|m| !expired.contains(&m.id))
            .filter(|m| m.importance < 0.7)
            .filter(|m| {
                m.created_at < cutoff
                    && m.importance < policy.min_importance
                    && m.access_count == 0
                    && m.supersedes.is_none()
            })
            .map(|m| m.id.clone())
            .collect();
        let (rows, bytes) = store.delete_many(&stale)?;
        report.deleted = rows;
        report.bytes_freed += bytes;
    }

    Ok(report)
}

/// Daily summary + pruning; weekly summary only on the week boundary.
pub fn run_consolidation(
    store: &FactsStore,
    retention: &FactsRetentionConfig,
    date: NaiveDate,
    summarizer: Option<&dyn Summarizer>,
    markdown_root: Option<&Path>,
    telemetry: &FactsTelemetry,
    now_ms: u64,
) -> Result<ConsolidationReport, FactsError> {
    let daily = generate_daily_summary(store, date, summarizer, markdown_root, now_ms)?;

    // The week closes on Sunday; the weekly digest covers the 7 days ending today.
    let weekly = if date.weekday() == chrono::Weekday::Sun {
        generate_weekly_summary(store, date, markdown_root, now_ms)?
    } else {
        None
    };

    let prune = prune_memories(store, retention, now_ms)?;
    telemetry.record_cleanup(now_ms);

    Ok(ConsolidationReport {
        daily: daily.map(|d| d.date),
        weekly: weekly.map(|w| w.week),
        prune,
    })
}

#[cfg(test)]
#[path = "consolidate_tests.rs"]
mod tests;
