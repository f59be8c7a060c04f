// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::model::{MemoryEntry, MemorySource};

const DAY_MS: u64 = 86_400_000;

fn entry(content: &str, importance: f64, created_at: u64) -> MemoryEntry {
    MemoryEntry::new(MemoryType::Fact, content, MemorySource::Explicit, importance, created_at)
}

#[test]
fn score_decays_with_age() {
    let now = 400 * DAY_MS;
    let fresh = entry("x", 0.8, now);
    let year_old = entry("x", 0.8, now - 365 * DAY_MS);

    let fresh_score = score_memory(&fresh, now);
    let old_score = score_memory(&year_old, now);
    assert!(fresh_score > old_score);
    // At 365 days the decay floor applies: 0.8 * 0.1.
    assert!((old_score - 0.08).abs() < 1e-9);
}

#[test]
fn decay_never_drops_below_floor() {
    let now = 4000 * DAY_MS;
    let ancient = entry("x", 1.0, 0);
    assert!((score_memory(&ancient, now) - 0.1).abs() < 1e-9);
}

#[test]
fn access_boost_caps_at_ten() {
    let mut hot = entry("x", 0.5, 0);
    hot.access_count = 100;
    let mut warm = entry("x", 0.5, 0);
    warm.access_count = 10;
    assert_eq!(score_memory(&hot, 0), score_memory(&warm, 0));
    assert!((score_memory(&hot, 0) - 0.6).abs() < 1e-9);
}

#[test]
fn retrieval_merges_fts_and_importance() {
    let store = FactsStore::open_in_memory().unwrap();
    let fts_hit = entry("kubernetes deploy pipeline", 0.2, 100);
    let important = entry("architecture is hexagonal", 0.9, 100);
    let neither = entry("low importance note", 0.2, 100);
    for m in [&fts_hit, &important, &neither] {
        store.add(m).unwrap();
    }

    let (results, trace) = get_relevant_context_with_trace(
        &store,
        "kubernetes",
        200,
        &RetrievalOptions::default(),
    )
    .unwrap();

    let ids: Vec<_> = results.iter().map(|r| r.entry.id.as_str()).collect();
    assert!(ids.contains(&fts_hit.id.as_str()));
    assert!(ids.contains(&important.id.as_str()));
    assert!(!ids.contains(&neither.id.as_str()));

    let fts_reason = trace.reasons.iter().find(|r| r.memory_id == fts_hit.id).unwrap();
    assert_eq!(fts_reason.source, TraceSource::Fts);
    assert!(fts_reason.fts_score.is_some());

    let imp_reason = trace.reasons.iter().find(|r| r.memory_id == important.id).unwrap();
    assert_eq!(imp_reason.source, TraceSource::Importance);
}

#[test]
fn fts_hit_is_not_double_counted() {
    let store = FactsStore::open_in_memory().unwrap();
    // Important AND matching: must appear once, tagged fts.
    let both = entry("kubernetes everywhere", 0.9, 100);
    store.add(&both).unwrap();

    let (results, trace) =
        get_relevant_context_with_trace(&store, "kubernetes", 200, &RetrievalOptions::default())
            .unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(trace.reasons[0].source, TraceSource::Fts);
}

#[test]
fn role_filter_reports_exclusions() {
    let store = FactsStore::open_in_memory().unwrap();
    for i in 0..3 {
        store.add(&entry(&format!("team fact {i}"), 0.9, 100)).unwrap();
    }
    let decision =
        MemoryEntry::new(MemoryType::Decision, "we chose sqlite", MemorySource::Explicit, 0.9, 100);
    store.add(&decision).unwrap();

    let opts = RetrievalOptions { role: Some(Role::guest()), ..Default::default() };
    let (results, trace) =
        get_relevant_context_with_trace(&store, "team", 200, &opts).unwrap();

    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.entry.memory_type == MemoryType::Fact));
    assert_eq!(trace.excluded, 1);
    assert_eq!(trace.excluded_types, vec![MemoryType::Decision]);
}

#[test]
fn min_score_and_limit_apply() {
    let store = FactsStore::open_in_memory().unwrap();
    for i in 0..5 {
        store.add(&entry(&format!("topic alpha {i}"), 0.3 + 0.1 * i as f64, 100)).unwrap();
    }

    let opts = RetrievalOptions { limit: 2, min_score: 0.0, role: None };
    let results = get_relevant_context(&store, "alpha", 200, &opts).unwrap();
    assert_eq!(results.len(), 2);
    // Highest importance first.
    assert!(results[0].entry.importance >= results[1].entry.importance);

    let strict = RetrievalOptions { limit: 10, min_score: 10.0, role: None };
    assert!(get_relevant_context(&store, "alpha", 200, &strict).unwrap().is_empty());
}

#[test]
fn ties_break_by_created_at_desc() {
    let store = FactsStore::open_in_memory().unwrap();
    let older = entry("tie topic", 0.8, 100);
    let newer = entry("tie topic", 0.8, 200);
    store.add(&older).unwrap();
    store.add(&newer).unwrap();

    let results =
        get_relevant_context(&store, "tie", 200, &RetrievalOptions::default()).unwrap();
    assert_eq!(results[0].entry.id, newer.id);
    assert_eq!(results[1].entry.id, older.id);
}

#[test]
fn session_context_orders_profile_summary_memories() {
    let store = FactsStore::open_in_memory().unwrap();
    store.upsert_block(BlockLabel::UserProfile, "name: sam", 1).unwrap();
    store
        .save_daily_summary(&crate::model::DailySummary {
            date: chrono::NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            content: "did things".to_string(),
            key_decisions: vec![],
            mentioned_entities: vec![],
            memory_count: 1,
            created_at: 1,
        })
        .unwrap();
    store.add(&entry("likes rust", 0.9, 100)).unwrap();

    let context =
        build_session_context(&store, 200, &SessionContextOptions::default()).unwrap();
    let profile_pos = context.find("User profile").unwrap();
    let summary_pos = context.find("Daily summary").unwrap();
    let memories_pos = context.find("Memories").unwrap();
    assert!(profile_pos < summary_pos && summary_pos < memories_pos);
    assert!(context.contains("likes rust"));
}

#[test]
fn session_context_respects_token_budget() {
    let store = FactsStore::open_in_memory().unwrap();
    store.upsert_block(BlockLabel::UserProfile, &"x".repeat(400), 1).unwrap();
    store.add(&entry(&"y".repeat(400), 0.9, 100)).unwrap();

    // 120 tokens = 480 chars: only the profile section fits.
    let opts = SessionContextOptions { max_tokens: 120, max_memories: 10 };
    let context = build_session_context(&store, 200, &opts).unwrap();
    assert!(context.len() <= 480);
    assert!(context.contains("User profile"));
    assert!(!context.contains("Memories"));
}

#[test]
fn session_context_skips_expired_memories() {
    let store = FactsStore::open_in_memory().unwrap();
    store.add(&entry("stale", 0.9, 100).with_expiry(150)).unwrap();
    store.add(&entry("fresh", 0.9, 100)).unwrap();

    let context =
        build_session_context(&store, 200, &SessionContextOptions::default()).unwrap();
    assert!(context.contains("fresh"));
    assert!(!context.contains("stale"));
}
