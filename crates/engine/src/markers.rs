// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Marker-delimited section parsing for agent output.
//!
//! Planner/reviewer artifacts arrive as
//! `--- BEGIN <name> ---` / `--- END <name> ---` blocks; executor task
//! results use `--- SUMMARY ---` / `--- FILES CHANGED ---` / `--- END ---`.

/// Extract the body between `--- BEGIN name ---` and `--- END name ---`.
pub fn extract_section<'a>(output: &'a str, name: &str) -> Option<&'a str> {
    let begin = format!("--- BEGIN {name} ---");
    let end = format!("--- END {name} ---");
    let start = output.find(&begin)? + begin.len();
    let rest = &output[start..];
    let stop = rest.find(&end)?;
    Some(rest[..stop].trim_matches(['\n', '\r']))
}

/// First fenced code block body (```json or bare ```).
pub fn extract_fenced(output: &str) -> Option<&str> {
    let start = output.find("```")?;
    let after = &output[start + 3..];
    let body_start = after.find('\n')?;
    let body = &after[body_start + 1..];
    let stop = body.find("```")?;
    Some(body[..stop].trim())
}

/// Extract a named JSON artifact: marker section first, fenced block as
/// the fallback.
pub fn extract_json_artifact(output: &str, name: &str) -> Option<serde_json::Value> {
    if let Some(section) = extract_section(output, name) {
        if let Ok(value) = serde_json::from_str(section) {
            return Some(value);
        }
    }
    extract_fenced(output).and_then(|body| serde_json::from_str(body).ok())
}

/// One executor task result block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskReport {
    pub summary: String,
    pub files_changed: Vec<String>,
}

/// Parse `--- SUMMARY ---` / `--- FILES CHANGED ---` / `--- END ---`.
pub fn parse_task_report(output: &str) -> Option<TaskReport> {
    let summary_start = output.find("--- SUMMARY ---")? + "--- SUMMARY ---".len();
    let rest = &output[summary_start..];
    let files_marker = rest.find("--- FILES CHANGED ---")?;
    let summary = rest[..files_marker].trim().to_string();

    let files_start = files_marker + "--- FILES CHANGED ---".len();
    let tail = &rest[files_start..];
    let end = tail.find("--- END ---")?;
    let files_changed = tail[..end]
        .lines()
        .map(|line| line.trim().trim_start_matches('-').trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    Some(TaskReport { summary, files_changed })
}

#[cfg(test)]
#[path = "markers_tests.rs"]
mod tests;
