// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn new_entry_has_fresh_id_and_clamped_importance() {
    let entry = MemoryEntry::new(MemoryType::Fact, "likes rust", MemorySource::Explicit, 1.5, 100);
    assert!(entry.id.starts_with("mem-"));
    assert_eq!(entry.importance, 1.0);
    assert_eq!(entry.created_at, 100);
    assert_eq!(entry.access_count, 0);
}

#[test]
fn expiry_check() {
    let entry = MemoryEntry::new(MemoryType::Todo, "x", MemorySource::Inferred, 0.5, 100)
        .with_expiry(200);
    assert!(!entry.is_expired(199));
    assert!(entry.is_expired(200));
    assert!(entry.is_expired(201));
}

#[test]
fn entry_serializes_type_field() {
    let entry = MemoryEntry::new(MemoryType::Decision, "use sqlite", MemorySource::Explicit, 0.9, 1);
    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["type"], "decision");
    assert_eq!(json["createdAt"], 1);
    // Empty optional fields are omitted.
    assert!(json.get("expiresAt").is_none());
    assert!(json.get("tags").is_none());
}

#[yare::parameterized(
    fact       = { "fact", Some(MemoryType::Fact) },
    preference = { "preference", Some(MemoryType::Preference) },
    decision   = { "decision", Some(MemoryType::Decision) },
    event      = { "event", Some(MemoryType::Event) },
    todo       = { "todo", Some(MemoryType::Todo) },
    unknown    = { "wish", None },
)]
fn memory_type_parse(s: &str, expected: Option<MemoryType>) {
    assert_eq!(MemoryType::parse(s), expected);
}

#[yare::parameterized(
    persona  = { "persona", Some(BlockLabel::Persona) },
    profile  = { "user_profile", Some(BlockLabel::UserProfile) },
    context  = { "active_context", Some(BlockLabel::ActiveContext) },
    unknown  = { "misc", None },
)]
fn block_label_parse(s: &str, expected: Option<BlockLabel>) {
    assert_eq!(BlockLabel::parse(s), expected);
}

#[yare::parameterized(
    midyear       = { 2026, 3, 14, "2026-W11" },
    new_year_iso  = { 2027, 1, 1, "2026-W53" },
    week_one      = { 2026, 1, 5, "2026-W02" },
)]
fn iso_week_keys(y: i32, m: u32, d: u32, expected: &str) {
    let date = NaiveDate::from_ymd_opt(y, m, d).unwrap();
    assert_eq!(iso_week_key(date), expected);
}
