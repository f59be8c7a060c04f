// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSONL export/import and repair operations.

use crate::access::Role;
use crate::model::{
    BlockLabel, DailySummary, FactsError, MemoryBlock, MemoryEntry, MemoryType, WeeklySummary,
};
use crate::store::FactsStore;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::OnceLock;

/// One export line, discriminated by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ExportLine {
    Memory(MemoryEntry),
    Block(MemoryBlock),
    Summary(SummaryLine),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
enum SummaryLine {
    Daily(DailySummary),
    Weekly(WeeklySummary),
}

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub redact: bool,
    pub exclude_types: Vec<MemoryType>,
    /// Roles without `can_see_unredacted` force redaction and type gating.
    pub role: Option<Role>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub memories: u64,
    pub blocks: u64,
    pub summaries: u64,
    pub redacted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    /// Upsert by id; rows whose stored copy is same-or-newer are skipped.
    Merge,
    /// Transactional delete-all then insert.
    Replace,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub inserted: u64,
    pub updated: u64,
    pub skipped: u64,
    pub blocks: u64,
    pub summaries: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub ok: bool,
    pub messages: Vec<String>,
}

/// Default redaction patterns: API keys, bearer tokens, emails, phones,
/// SSH key headers, AWS keys, GitHub PATs.
fn redaction_patterns() -> &'static Vec<regex::Regex> {
    static PATTERNS: OnceLock<Vec<regex::Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        // Token-shaped patterns run before the phone pattern so a digit run
        // inside a key cannot be half-eaten by it.
        [
            r"(?i)api[_-]?key\s*[:=]\s*\S+",
            r"(?i)bearer\s+[A-Za-z0-9._~+/-]+=*",
            r"-----BEGIN [A-Z ]*PRIVATE KEY-----",
            r"AKIA[0-9A-Z]{16}",
            r"ghp_[A-Za-z0-9]{36}",
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            r"\+?\d[\d\s().-]{7,}\d",
        ]
        .iter()
        .filter_map(|p| regex::Regex::new(p).ok())
        .collect()
    })
}

/// Replace every redaction-pattern match with `[REDACTED]`.
pub fn redact_text(text: &str) -> String {
    let mut out = text.to_string();
    for pattern in redaction_patterns() {
        out = pattern.replace_all(&out, "[REDACTED]").into_owned();
    }
    out
}

/// Write the whole store as JSONL.
pub fn export_jsonl(
    store: &FactsStore,
    writer: &mut dyn Write,
    opts: &ExportOptions,
) -> Result<ExportReport, FactsError> {
    let mut report = ExportReport::default();

    let mut exclude = opts.exclude_types.clone();
    let redact = match &opts.role {
        Some(role) => {
            for memory_type in MemoryType::ALL {
                if !role.allows(memory_type) && !exclude.contains(&memory_type) {
                    exclude.push(memory_type);
                }
            }
            opts.redact || !role.can_see_unredacted
        }
        None => opts.redact,
    };
    report.redacted = redact;

    for mut entry in store.list(&crate::store::ListOptions::default())? {
        if exclude.contains(&entry.memory_type) {
            continue;
        }
        if redact {
            entry.content = redact_text(&entry.content);
        }
        write_line(writer, &ExportLine::Memory(entry))?;
        report.memories += 1;
    }

    for mut block in store.all_blocks()? {
        if redact {
            block.value = redact_text(&block.value);
        }
        write_line(writer, &ExportLine::Block(block))?;
        report.blocks += 1;
    }

    for summary in store.all_daily_summaries()? {
        let summary = if redact {
            DailySummary { content: redact_text(&summary.content), ..summary }
        } else {
            summary
        };
        write_line(writer, &ExportLine::Summary(SummaryLine::Daily(summary)))?;
        report.summaries += 1;
    }

    for summary in store.all_weekly_summaries()? {
        let summary = if redact {
            WeeklySummary { content: redact_text(&summary.content), ..summary }
        } else {
            summary
        };
        write_line(writer, &ExportLine::Summary(SummaryLine::Weekly(summary)))?;
        report.summaries += 1;
    }

    Ok(report)
}

fn write_line(writer: &mut dyn Write, line: &ExportLine) -> Result<(), FactsError> {
    let mut buf = serde_json::to_vec(line)?;
    buf.push(b'\n');
    writer.write_all(&buf)?;
    Ok(())
}

/// Read a JSONL export back into the store.
pub fn import_jsonl(
    store: &FactsStore,
    reader: &mut dyn BufRead,
    mode: ImportMode,
    now_ms: u64,
) -> Result<ImportReport, FactsError> {
    let mut report = ImportReport::default();

    if mode == ImportMode::Replace {
        store.clear_all()?;
    }

    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let parsed: ExportLine = match serde_json::from_str(&line) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "skipping unparseable import line");
                report.skipped += 1;
                continue;
            }
        };
        match parsed {
            ExportLine::Memory(entry) => match store.peek(&entry.id)? {
                None => {
                    store.add(&entry)?;
                    report.inserted += 1;
                }
                Some(existing) if mode == ImportMode::Merge => {
                    // Duplicates with an equal-or-newer stored copy are skipped.
                    if existing.updated_at >= entry.updated_at {
                        report.skipped += 1;
                    } else {
                        store.delete(&entry.id)?;
                        store.add(&entry)?;
                        report.updated += 1;
                    }
                }
                Some(_) => {
                    report.skipped += 1;
                }
            },
            ExportLine::Block(block) => {
                store.upsert_block(block.label, &block.value, block.updated_at.max(now_ms))?;
                report.blocks += 1;
            }
            ExportLine::Summary(SummaryLine::Daily(summary)) => {
                store.save_daily_summary(&summary)?;
                report.summaries += 1;
            }
            ExportLine::Summary(SummaryLine::Weekly(summary)) => {
                store.save_weekly_summary(&summary)?;
                report.summaries += 1;
            }
        }
    }
    Ok(report)
}

/// `PRAGMA integrity_check` wrapped in a report.
pub fn run_integrity_check(store: &FactsStore) -> Result<RepairReport, FactsError> {
    let messages = store.integrity_check()?;
    let ok = messages.iter().all(|m| m == "ok");
    Ok(RepairReport { ok, messages })
}

/// Rebuild the FTS index. Clear error when FTS is unavailable.
pub fn rebuild_fts(store: &FactsStore) -> Result<u64, FactsError> {
    store.rebuild_fts()
}

/// Reclaim free pages. Always safe.
pub fn vacuum(store: &FactsStore) -> Result<(), FactsError> {
    store.vacuum()
}

#[cfg(test)]
#[path = "transfer_tests.rs"]
mod tests;
