// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Summarization seam.
//!
//! The platform never talks to a model directly; consolidation accepts any
//! [`Summarizer`] and parses its raw output, falling back to a
//! deterministic digest when parsing fails.

use crate::model::MemoryEntry;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Parsed summarizer response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LlmSummary {
    pub summary: String,
    pub key_decisions: Vec<String>,
    pub mentioned_entities: Vec<String>,
}

/// Produces a raw summary response for one day's memories.
pub trait Summarizer: Send + Sync {
    fn summarize_daily(&self, date: NaiveDate, memories: &[MemoryEntry]) -> Result<String, String>;
}

/// Parse `{summary, keyDecisions?, mentionedEntities?}` from raw model
/// output, accepting a fenced JSON block as a fallback.
pub fn parse_summary_response(raw: &str) -> Option<LlmSummary> {
    let candidate = raw.trim();
    if let Ok(parsed) = serde_json::from_str::<LlmSummary>(candidate) {
        if !parsed.summary.is_empty() {
            return Some(parsed);
        }
    }
    let fenced = extract_fenced_json(candidate)?;
    serde_json::from_str::<LlmSummary>(&fenced).ok().filter(|p| !p.summary.is_empty())
}

/// Pull the body out of the first ```json fenced block.
fn extract_fenced_json(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('\n')?;
    let body = &after_fence[body_start + 1..];
    let end = body.find("```")?;
    Some(body[..end].trim().to_string())
}

#[cfg(test)]
#[path = "llm_tests.rs"]
mod tests;
