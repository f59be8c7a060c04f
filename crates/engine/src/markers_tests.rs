// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extracts_named_section() {
    let output = "preamble\n--- BEGIN plan.md ---\n# Plan\nsteps\n--- END plan.md ---\ntrailer";
    assert_eq!(extract_section(output, "plan.md"), Some("# Plan\nsteps"));
}

#[test]
fn section_names_do_not_cross_match() {
    let output = "--- BEGIN tasks.json ---\n{}\n--- END tasks.json ---";
    assert_eq!(extract_section(output, "plan.md"), None);
    assert_eq!(extract_section(output, "tasks.json"), Some("{}"));
}

#[test]
fn missing_end_marker_is_none() {
    assert_eq!(extract_section("--- BEGIN plan.md ---\nbody", "plan.md"), None);
}

#[test]
fn fenced_block_fallback() {
    let output = "chat text\n```json\n{\"version\": \"1\"}\n```\nmore";
    assert_eq!(extract_fenced(output), Some("{\"version\": \"1\"}"));
}

#[test]
fn json_artifact_prefers_marker_section() {
    let output = concat!(
        "--- BEGIN tasks.json ---\n{\"from\": \"marker\"}\n--- END tasks.json ---\n",
        "```json\n{\"from\": \"fence\"}\n```"
    );
    let value = extract_json_artifact(output, "tasks.json").unwrap();
    assert_eq!(value["from"], "marker");
}

#[test]
fn json_artifact_falls_back_to_fence() {
    let output = "no markers here\n```json\n{\"from\": \"fence\"}\n```";
    let value = extract_json_artifact(output, "tasks.json").unwrap();
    assert_eq!(value["from"], "fence");
}

#[test]
fn json_artifact_none_when_both_invalid() {
    assert!(extract_json_artifact("nothing useful", "tasks.json").is_none());
}

#[test]
fn parses_task_report() {
    let output = concat!(
        "--- SUMMARY ---\n",
        "Implemented the endpoint.\n",
        "--- FILES CHANGED ---\n",
        "- src/index.ts\n",
        "  src/routes/hello.ts\n",
        "\n",
        "--- END ---\n"
    );
    let report = parse_task_report(output).unwrap();
    assert_eq!(report.summary, "Implemented the endpoint.");
    assert_eq!(report.files_changed, vec!["src/index.ts", "src/routes/hello.ts"]);
}

#[test]
fn task_report_requires_all_markers() {
    assert!(parse_task_report("--- SUMMARY ---\nx\n--- END ---").is_none());
    assert!(parse_task_report("no markers").is_none());
}
