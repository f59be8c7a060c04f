// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Facts memory: role-gated retrieval, empty-day consolidation, and the
//! export/import round trip.

use chrono::NaiveDate;
use dc_facts::{
    export_jsonl, generate_daily_summary, get_relevant_context_with_trace, import_jsonl,
    ExportOptions, FactsStore, ImportMode, MemoryEntry, MemorySource, MemoryType,
    RetrievalOptions, Role,
};
use std::io::BufReader;
use tempfile::tempdir;

#[test]
fn guest_role_sees_facts_only_and_trace_reports_exclusions() {
    let store = FactsStore::open_in_memory().unwrap();
    for i in 0..3 {
        store
            .add(&MemoryEntry::new(
                MemoryType::Fact,
                format!("deploy fact {i}"),
                MemorySource::Explicit,
                0.9,
                100,
            ))
            .unwrap();
    }
    store
        .add(&MemoryEntry::new(
            MemoryType::Decision,
            "deploy decision",
            MemorySource::Explicit,
            0.9,
            100,
        ))
        .unwrap();

    let opts = RetrievalOptions { role: Some(Role::guest()), ..Default::default() };
    let (results, trace) =
        get_relevant_context_with_trace(&store, "deploy", 200, &opts).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.entry.memory_type == MemoryType::Fact));
    assert_eq!(trace.excluded, 1);
    assert_eq!(trace.excluded_types, vec![MemoryType::Decision]);
}

#[test]
fn consolidation_on_empty_day_returns_null_and_writes_no_file() {
    let store = FactsStore::open_in_memory().unwrap();
    let markdown_root = tempdir().unwrap();
    let future = NaiveDate::from_ymd_opt(2031, 6, 1).unwrap();

    let result =
        generate_daily_summary(&store, future, None, Some(markdown_root.path()), 1).unwrap();

    assert!(result.is_none());
    assert!(!markdown_root.path().join("memory/daily/2031-06-01.md").exists());
    assert!(store.get_daily_summary(future).unwrap().is_none());
}

#[test]
fn export_import_merge_into_empty_store_is_equal() {
    let source = FactsStore::open_in_memory().unwrap();
    for i in 0..5 {
        let mut entry = MemoryEntry::new(
            MemoryType::Fact,
            format!("fact number {i}"),
            MemorySource::Conversation,
            0.1 + 0.15 * i as f64,
            100 + i,
        );
        entry.tags = vec![format!("tag-{i}")];
        source.add(&entry).unwrap();
    }

    let mut buffer = Vec::new();
    export_jsonl(&source, &mut buffer, &ExportOptions::default()).unwrap();

    let target = FactsStore::open_in_memory().unwrap();
    let report = import_jsonl(
        &target,
        &mut BufReader::new(buffer.as_slice()),
        ImportMode::Merge,
        1_000,
    )
    .unwrap();
    assert_eq!(report.inserted, 5);

    // Equal under id and value equality on all non-access fields.
    for entry in source.list(&dc_facts::ListOptions::default()).unwrap() {
        let restored = target.peek(&entry.id).unwrap().unwrap();
        assert_eq!(restored, entry);
    }
}
