// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite facts store.
//!
//! Single writer: every connection use goes through one process-wide mutex.
//! The FTS5 index is best-effort; when it cannot be created, write paths
//! still succeed and search paths return empty.

use crate::model::{
    BlockLabel, DailySummary, FactsError, MemoryBlock, MemoryEntry, MemoryPatch, MemorySource,
    MemoryType, WeeklySummary,
};
use chrono::NaiveDate;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    importance REAL NOT NULL DEFAULT 0.5,
    confidence REAL NOT NULL DEFAULT 1.0,
    created_at INTEGER NOT NULL,
    last_accessed_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    access_count INTEGER NOT NULL DEFAULT 0,
    expires_at INTEGER,
    tags TEXT,
    supersedes TEXT,
    superseded_by TEXT,
    embedding TEXT
);

CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(type);
CREATE INDEX IF NOT EXISTS idx_memories_importance ON memories(importance);
CREATE INDEX IF NOT EXISTS idx_memories_created_at ON memories(created_at);

CREATE TABLE IF NOT EXISTS memory_blocks (
    label TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS daily_summaries (
    date TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    key_decisions TEXT,
    mentioned_entities TEXT,
    memory_count INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS weekly_summaries (
    week TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);
"#;

const FTS_SCHEMA: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS memories_fts USING fts5(
    content,
    content='memories',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS memories_fts_insert AFTER INSERT ON memories BEGIN
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_delete AFTER DELETE ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
END;

CREATE TRIGGER IF NOT EXISTS memories_fts_update AFTER UPDATE OF content ON memories BEGIN
    INSERT INTO memories_fts(memories_fts, rowid, content) VALUES ('delete', old.rowid, old.content);
    INSERT INTO memories_fts(rowid, content) VALUES (new.rowid, new.content);
END;
"#;

/// Listing options: optional type filter, importance+recency ordering.
#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    pub memory_type: Option<MemoryType>,
    pub limit: Option<usize>,
}

pub struct FactsStore {
    conn: Mutex<Connection>,
    fts_available: AtomicBool,
    db_path: Option<PathBuf>,
}

impl FactsStore {
    /// Open (or create) the database at `path` in WAL mode.
    pub fn open(path: &Path) -> Result<Self, FactsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// In-memory store for tests and ephemeral use.
    pub fn open_in_memory() -> Result<Self, FactsError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, db_path: Option<PathBuf>) -> Result<Self, FactsError> {
        conn.execute_batch(SCHEMA)?;
        // FTS is best-effort: SQLite builds without fts5 still get a
        // working store, reported through `fts_available`.
        let fts_available = match conn.execute_batch(FTS_SCHEMA) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "FTS5 unavailable, full-text search disabled");
                false
            }
        };
        Ok(Self {
            conn: Mutex::new(conn),
            fts_available: AtomicBool::new(fts_available),
            db_path,
        })
    }

    pub fn fts_available(&self) -> bool {
        self.fts_available.load(Ordering::Relaxed)
    }

    /// Database size in bytes (file size, or page math for in-memory).
    pub fn db_size_bytes(&self) -> Result<u64, FactsError> {
        if let Some(path) = &self.db_path {
            if let Ok(meta) = std::fs::metadata(path) {
                return Ok(meta.len());
            }
        }
        let conn = self.conn.lock();
        let pages: u64 = conn.query_row("PRAGMA page_count", [], |r| r.get(0))?;
        let page_size: u64 = conn.query_row("PRAGMA page_size", [], |r| r.get(0))?;
        Ok(pages * page_size)
    }

    // === Memories ===

    pub fn add(&self, entry: &MemoryEntry) -> Result<(), FactsError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memories (id, type, content, source, importance, confidence,
                created_at, last_accessed_at, updated_at, access_count, expires_at,
                tags, supersedes, superseded_by, embedding)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.id,
                entry.memory_type.to_string(),
                entry.content,
                entry.source.to_string(),
                entry.importance,
                entry.confidence,
                entry.created_at,
                entry.last_accessed_at,
                entry.updated_at,
                entry.access_count,
                entry.expires_at,
                to_json_opt(&entry.tags)?,
                entry.supersedes,
                entry.superseded_by,
                entry.embedding.as_ref().map(|e| serde_json::to_string(e)).transpose()?,
            ],
        )?;
        Ok(())
    }

    /// Get by id, bumping `access_count` and `last_accessed_at`.
    pub fn get(&self, id: &str, now_ms: u64) -> Result<Option<MemoryEntry>, FactsError> {
        let conn = self.conn.lock();
        let entry = Self::query_one(&conn, id)?;
        if entry.is_some() {
            conn.execute(
                "UPDATE memories SET access_count = access_count + 1, last_accessed_at = ?2 WHERE id = ?1",
                params![id, now_ms],
            )?;
        }
        Ok(entry.map(|mut e| {
            e.access_count += 1;
            e.last_accessed_at = now_ms;
            e
        }))
    }

    /// Get by id without touching access metadata.
    pub fn peek(&self, id: &str) -> Result<Option<MemoryEntry>, FactsError> {
        let conn = self.conn.lock();
        Self::query_one(&conn, id)
    }

    fn query_one(conn: &Connection, id: &str) -> Result<Option<MemoryEntry>, FactsError> {
        Ok(conn
            .query_row("SELECT * FROM memories WHERE id = ?1", params![id], row_to_entry)
            .optional()?)
    }

    /// Apply a partial patch. Returns false when the row does not exist.
    pub fn update(&self, id: &str, patch: &MemoryPatch, now_ms: u64) -> Result<bool, FactsError> {
        let conn = self.conn.lock();
        let Some(mut entry) = Self::query_one(&conn, id)? else {
            return Ok(false);
        };

        if let Some(content) = &patch.content {
            entry.content = content.clone();
        }
        if let Some(importance) = patch.importance {
            entry.importance = importance.clamp(0.0, 1.0);
        }
        if let Some(confidence) = patch.confidence {
            entry.confidence = confidence.clamp(0.0, 1.0);
        }
        if let Some(expires_at) = patch.expires_at {
            entry.expires_at = expires_at;
        }
        if let Some(tags) = &patch.tags {
            entry.tags = tags.clone();
        }
        if let Some(supersedes) = &patch.supersedes {
            entry.supersedes = supersedes.clone();
        }
        if let Some(superseded_by) = &patch.superseded_by {
            entry.superseded_by = superseded_by.clone();
        }

        conn.execute(
            "UPDATE memories SET content = ?2, importance = ?3, confidence = ?4,
                expires_at = ?5, tags = ?6, supersedes = ?7, superseded_by = ?8,
                updated_at = ?9
             WHERE id = ?1",
            params![
                id,
                entry.content,
                entry.importance,
                entry.confidence,
                entry.expires_at,
                to_json_opt(&entry.tags)?,
                entry.supersedes,
                entry.superseded_by,
                now_ms,
            ],
        )?;
        Ok(true)
    }

    /// Delete by id. Returns whether a row was removed.
    pub fn delete(&self, id: &str) -> Result<bool, FactsError> {
        let conn = self.conn.lock();
        Ok(conn.execute("DELETE FROM memories WHERE id = ?1", params![id])? > 0)
    }

    /// Delete many ids in one transaction. Returns (rows, content bytes).
    pub fn delete_many(&self, ids: &[String]) -> Result<(u64, u64), FactsError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut rows = 0u64;
        let mut bytes = 0u64;
        for id in ids {
            let freed: Option<u64> = tx
                .query_row("SELECT length(content) FROM memories WHERE id = ?1", params![id], |r| {
                    r.get(0)
                })
                .optional()?;
            if let Some(freed) = freed {
                tx.execute("DELETE FROM memories WHERE id = ?1", params![id])?;
                rows += 1;
                bytes += freed;
            }
        }
        tx.commit()?;
        Ok((rows, bytes))
    }

    /// List ordered by importance then recency.
    pub fn list(&self, opts: &ListOptions) -> Result<Vec<MemoryEntry>, FactsError> {
        let conn = self.conn.lock();
        let limit = opts.limit.unwrap_or(usize::MAX) as i64;
        let mut out = Vec::new();
        match opts.memory_type {
            Some(memory_type) => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM memories WHERE type = ?1
                     ORDER BY importance DESC, created_at DESC LIMIT ?2",
                )?;
                let rows = stmt.query_map(params![memory_type.to_string(), limit], row_to_entry)?;
                for row in rows {
                    out.push(row?);
                }
            }
            None => {
                let mut stmt = conn.prepare(
                    "SELECT * FROM memories ORDER BY importance DESC, created_at DESC LIMIT ?1",
                )?;
                let rows = stmt.query_map(params![limit], row_to_entry)?;
                for row in rows {
                    out.push(row?);
                }
            }
        }
        Ok(out)
    }

    /// Memories created within `[start_ms, end_ms)`.
    pub fn created_between(&self, start_ms: u64, end_ms: u64) -> Result<Vec<MemoryEntry>, FactsError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT * FROM memories WHERE created_at >= ?1 AND created_at < ?2
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![start_ms, end_ms], row_to_entry)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count(&self) -> Result<u64, FactsError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?)
    }

    /// Full-text search. Empty result when FTS is unavailable or the query
    /// has no searchable terms. Scores are higher-is-better.
    pub fn search_fts(&self, query: &str, limit: usize) -> Result<Vec<(MemoryEntry, f64)>, FactsError> {
        if !self.fts_available() {
            return Ok(Vec::new());
        }
        let Some(match_expr) = fts_match_expr(query) else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT m.*, bm25(memories_fts) AS rank
             FROM memories_fts f JOIN memories m ON m.rowid = f.rowid
             WHERE memories_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![match_expr, limit as i64], |row| {
            let entry = row_to_entry(row)?;
            let rank: f64 = row.get("rank")?;
            Ok((entry, -rank))
        });
        let rows = match rows {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(query, error = %e, "FTS query failed, returning empty");
                return Ok(Vec::new());
            }
        };
        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok(hit) => out.push(hit),
                Err(e) => {
                    tracing::warn!(query, error = %e, "FTS row failed, returning empty");
                    return Ok(Vec::new());
                }
            }
        }
        Ok(out)
    }

    // === Blocks ===

    pub fn upsert_block(&self, label: BlockLabel, value: &str, now_ms: u64) -> Result<(), FactsError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO memory_blocks (label, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(label) DO UPDATE SET value = ?2, updated_at = ?3",
            params![label.to_string(), value, now_ms],
        )?;
        Ok(())
    }

    pub fn get_block(&self, label: BlockLabel) -> Result<Option<MemoryBlock>, FactsError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT label, value, updated_at FROM memory_blocks WHERE label = ?1",
                params![label.to_string()],
                |row| {
                    let label_str: String = row.get(0)?;
                    Ok((label_str, row.get::<_, String>(1)?, row.get::<_, u64>(2)?))
                },
            )
            .optional()?
            .and_then(|(label_str, value, updated_at)| {
                BlockLabel::parse(&label_str).map(|label| MemoryBlock { label, value, updated_at })
            }))
    }

    pub fn all_blocks(&self) -> Result<Vec<MemoryBlock>, FactsError> {
        let mut out = Vec::new();
        for label in [BlockLabel::Persona, BlockLabel::UserProfile, BlockLabel::ActiveContext] {
            if let Some(block) = self.get_block(label)? {
                out.push(block);
            }
        }
        Ok(out)
    }

    // === Summaries ===

    pub fn save_daily_summary(&self, summary: &DailySummary) -> Result<(), FactsError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO daily_summaries (date, content, key_decisions, mentioned_entities, memory_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(date) DO UPDATE SET content = ?2, key_decisions = ?3,
                mentioned_entities = ?4, memory_count = ?5, created_at = ?6",
            params![
                summary.date.to_string(),
                summary.content,
                to_json_opt(&summary.key_decisions)?,
                to_json_opt(&summary.mentioned_entities)?,
                summary.memory_count,
                summary.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn get_daily_summary(&self, date: NaiveDate) -> Result<Option<DailySummary>, FactsError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT date, content, key_decisions, mentioned_entities, memory_count, created_at
                 FROM daily_summaries WHERE date = ?1",
                params![date.to_string()],
                row_to_daily,
            )
            .optional()?)
    }

    /// Most recent daily summary by date.
    pub fn latest_daily_summary(&self) -> Result<Option<DailySummary>, FactsError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT date, content, key_decisions, mentioned_entities, memory_count, created_at
                 FROM daily_summaries ORDER BY date DESC LIMIT 1",
                [],
                row_to_daily,
            )
            .optional()?)
    }

    /// Daily summaries within `[start, end]`, ascending.
    pub fn daily_summaries_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DailySummary>, FactsError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT date, content, key_decisions, mentioned_entities, memory_count, created_at
             FROM daily_summaries WHERE date >= ?1 AND date <= ?2 ORDER BY date ASC",
        )?;
        let rows = stmt.query_map(params![start.to_string(), end.to_string()], row_to_daily)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn count_daily_summaries(&self) -> Result<u64, FactsError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM daily_summaries", [], |r| r.get(0))?)
    }

    pub fn save_weekly_summary(&self, summary: &WeeklySummary) -> Result<(), FactsError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO weekly_summaries (week, content, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(week) DO UPDATE SET content = ?2, created_at = ?3",
            params![summary.week, summary.content, summary.created_at],
        )?;
        Ok(())
    }

    pub fn get_weekly_summary(&self, week: &str) -> Result<Option<WeeklySummary>, FactsError> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row(
                "SELECT week, content, created_at FROM weekly_summaries WHERE week = ?1",
                params![week],
                |row| {
                    Ok(WeeklySummary {
                        week: row.get(0)?,
                        content: row.get(1)?,
                        created_at: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    pub fn count_weekly_summaries(&self) -> Result<u64, FactsError> {
        let conn = self.conn.lock();
        Ok(conn.query_row("SELECT COUNT(*) FROM weekly_summaries", [], |r| r.get(0))?)
    }

    pub fn all_weekly_summaries(&self) -> Result<Vec<WeeklySummary>, FactsError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT week, content, created_at FROM weekly_summaries ORDER BY week ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok(WeeklySummary { week: row.get(0)?, content: row.get(1)?, created_at: row.get(2)? })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    pub fn all_daily_summaries(&self) -> Result<Vec<DailySummary>, FactsError> {
        let min = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        let max = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or_default();
        self.daily_summaries_between(min, max)
    }

    // === Maintenance ===

    /// Delete every row in all tables inside one transaction.
    pub fn clear_all(&self) -> Result<(), FactsError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM memories", [])?;
        tx.execute("DELETE FROM memory_blocks", [])?;
        tx.execute("DELETE FROM daily_summaries", [])?;
        tx.execute("DELETE FROM weekly_summaries", [])?;
        tx.commit()?;
        Ok(())
    }

    /// `PRAGMA integrity_check` messages; `["ok"]` when healthy.
    pub fn integrity_check(&self) -> Result<Vec<String>, FactsError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("PRAGMA integrity_check")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Rebuild the external-content FTS index. Errors when FTS is absent.
    pub fn rebuild_fts(&self) -> Result<u64, FactsError> {
        if !self.fts_available() {
            return Err(FactsError::FtsUnavailable);
        }
        let conn = self.conn.lock();
        conn.execute("INSERT INTO memories_fts(memories_fts) VALUES ('rebuild')", [])?;
        Ok(conn.query_row("SELECT COUNT(*) FROM memories", [], |r| r.get(0))?)
    }

    /// Always safe.
    pub fn vacuum(&self) -> Result<(), FactsError> {
        let conn = self.conn.lock();
        conn.execute("VACUUM", [])?;
        Ok(())
    }
}

fn to_json_opt(list: &[String]) -> Result<Option<String>, FactsError> {
    if list.is_empty() {
        Ok(None)
    } else {
        Ok(Some(serde_json::to_string(list)?))
    }
}

fn from_json_list(raw: Option<String>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MemoryEntry> {
    let type_str: String = row.get("type")?;
    let source_str: String = row.get("source")?;
    let tags: Option<String> = row.get("tags")?;
    let embedding: Option<String> = row.get("embedding")?;
    Ok(MemoryEntry {
        id: row.get("id")?,
        memory_type: MemoryType::parse(&type_str).unwrap_or(MemoryType::Fact),
        content: row.get("content")?,
        source: MemorySource::parse(&source_str).unwrap_or(MemorySource::Inferred),
        importance: row.get("importance")?,
        confidence: row.get("confidence")?,
        created_at: row.get("created_at")?,
        last_accessed_at: row.get("last_accessed_at")?,
        updated_at: row.get("updated_at")?,
        access_count: row.get("access_count")?,
        expires_at: row.get("expires_at")?,
        tags: from_json_list(tags),
        supersedes: row.get("supersedes")?,
        superseded_by: row.get("superseded_by")?,
        embedding: embedding.and_then(|s| serde_json::from_str(&s).ok()),
    })
}

fn row_to_daily(row: &Row<'_>) -> rusqlite::Result<DailySummary> {
    let date_str: String = row.get(0)?;
    let key_decisions: Option<String> = row.get(2)?;
    let mentioned_entities: Option<String> = row.get(3)?;
    Ok(DailySummary {
        date: date_str.parse().unwrap_or_default(),
        content: row.get(1)?,
        key_decisions: from_json_list(key_decisions),
        mentioned_entities: from_json_list(mentioned_entities),
        memory_count: row.get(4)?,
        created_at: row.get(5)?,
    })
}

/// Build a safe FTS match expression: quoted terms OR-ed together.
fn fts_match_expr(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" OR "))
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
