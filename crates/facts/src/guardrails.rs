// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Guardrails applied before every extraction call, plus shared telemetry.

use dc_core::config::ExtractionLimits;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

const MS_PER_DAY: u64 = 86_400_000;

/// One conversational message in an extraction batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self { role: role.into(), content: content.into() }
    }
}

/// chars/4 token approximation, shared with retrieval budgeting.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    messages.iter().map(|m| m.content.len() + m.role.len()).sum::<usize>() / 4
}

/// Counters shared between guardrails, consolidation and health.
#[derive(Debug, Default)]
pub struct FactsTelemetry {
    skipped_cooldown: AtomicU64,
    skipped_tokens: AtomicU64,
    truncated_batches: AtomicU64,
    capped_facts: AtomicU64,
    last_extraction_at: AtomicU64,
    last_cleanup_at: AtomicU64,
    /// Timestamps of recent extraction errors (trimmed to a day window).
    error_times: Mutex<VecDeque<u64>>,
}

impl FactsTelemetry {
    pub fn record_skip_cooldown(&self) {
        self.skipped_cooldown.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skip_tokens(&self) {
        self.skipped_tokens.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_truncated_batch(&self) {
        self.truncated_batches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_capped_facts(&self) {
        self.capped_facts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_extraction(&self, now_ms: u64) {
        self.last_extraction_at.store(now_ms, Ordering::Relaxed);
    }

    pub fn record_extraction_error(&self, now_ms: u64) {
        let mut errors = self.error_times.lock();
        errors.push_back(now_ms);
        let cutoff = now_ms.saturating_sub(MS_PER_DAY);
        while errors.front().is_some_and(|t| *t < cutoff) {
            errors.pop_front();
        }
    }

    pub fn record_cleanup(&self, now_ms: u64) {
        self.last_cleanup_at.store(now_ms, Ordering::Relaxed);
    }

    /// Extraction errors within the trailing day.
    pub fn errors_last_day(&self, now_ms: u64) -> u32 {
        let cutoff = now_ms.saturating_sub(MS_PER_DAY);
        self.error_times.lock().iter().filter(|t| **t >= cutoff).count() as u32
    }

    pub fn last_extraction_at(&self) -> Option<u64> {
        match self.last_extraction_at.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        }
    }

    pub fn last_cleanup_at(&self) -> Option<u64> {
        match self.last_cleanup_at.load(Ordering::Relaxed) {
            0 => None,
            at => Some(at),
        }
    }

    pub fn counters(&self) -> TelemetryCounters {
        TelemetryCounters {
            skipped_cooldown: self.skipped_cooldown.load(Ordering::Relaxed),
            skipped_tokens: self.skipped_tokens.load(Ordering::Relaxed),
            truncated_batches: self.truncated_batches.load(Ordering::Relaxed),
            capped_facts: self.capped_facts.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryCounters {
    pub skipped_cooldown: u64,
    pub skipped_tokens: u64,
    pub truncated_batches: u64,
    pub capped_facts: u64,
}

/// Gate decision for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailVerdict {
    /// Proceed with the (possibly truncated) batch.
    Proceed { messages: Vec<Message>, truncated: bool },
    /// Cooldown since the last successful extraction has not elapsed.
    SkipCooldown { remaining_ms: u64 },
    /// Batch would exceed the token budget even after truncation.
    SkipTokens { estimated: usize },
}

/// Enforces cooldown, batch truncation, token budget and fact caps.
pub struct ExtractionGate {
    limits: ExtractionLimits,
    last_success: Mutex<HashMap<String, u64>>,
}

impl ExtractionGate {
    pub fn new(limits: ExtractionLimits) -> Self {
        Self { limits, last_success: Mutex::new(HashMap::new()) }
    }

    pub fn limits(&self) -> &ExtractionLimits {
        &self.limits
    }

    /// Apply the pre-extraction checks for one session's batch.
    pub fn admit(
        &self,
        session_key: &str,
        messages: Vec<Message>,
        telemetry: &FactsTelemetry,
        now_ms: u64,
    ) -> GuardrailVerdict {
        if let Some(last) = self.last_success.lock().get(session_key) {
            let elapsed = now_ms.saturating_sub(*last);
            if elapsed < self.limits.cooldown_ms {
                let remaining_ms = self.limits.cooldown_ms - elapsed;
                telemetry.record_skip_cooldown();
                tracing::info!(session_key, remaining_ms, "extraction skipped: cooldown");
                return GuardrailVerdict::SkipCooldown { remaining_ms };
            }
        }

        let truncated = messages.len() > self.limits.max_messages;
        let messages: Vec<Message> = if truncated {
            telemetry.record_truncated_batch();
            tracing::info!(
                session_key,
                dropped = messages.len() - self.limits.max_messages,
                "extraction batch truncated to most recent messages"
            );
            let skip = messages.len() - self.limits.max_messages;
            messages.into_iter().skip(skip).collect()
        } else {
            messages
        };

        let estimated = estimate_tokens(&messages);
        if estimated > self.limits.max_tokens {
            telemetry.record_skip_tokens();
            tracing::info!(session_key, estimated, "extraction skipped: token budget");
            return GuardrailVerdict::SkipTokens { estimated };
        }

        GuardrailVerdict::Proceed { messages, truncated }
    }

    /// Record a successful extraction, starting the session's cooldown.
    pub fn record_success(&self, session_key: &str, telemetry: &FactsTelemetry, now_ms: u64) {
        self.last_success.lock().insert(session_key.to_string(), now_ms);
        telemetry.record_extraction(now_ms);
    }

    /// Cap adopted facts to `max_facts`.
    pub fn cap_facts<T>(&self, facts: Vec<T>, telemetry: &FactsTelemetry) -> Vec<T> {
        if facts.len() > self.limits.max_facts {
            telemetry.record_capped_facts();
            tracing::info!(
                kept = self.limits.max_facts,
                dropped = facts.len() - self.limits.max_facts,
                "extracted facts capped"
            );
            let mut facts = facts;
            facts.truncate(self.limits.max_facts);
            facts
        } else {
            facts
        }
    }
}

#[cfg(test)]
#[path = "guardrails_tests.rs"]
mod tests;
