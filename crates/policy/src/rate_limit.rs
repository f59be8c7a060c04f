// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sliding-window rate limiter for exec approvals.

use dc_core::Clock;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// When denied, how long until the oldest request leaves the window.
    pub retry_after_ms: u64,
}

/// Per-key sliding window. A request is admitted when fewer than
/// `max_per_window` requests happened in the trailing window.
pub struct RateLimiter<C: Clock> {
    max_per_window: u32,
    window_ms: u64,
    windows: Mutex<HashMap<String, VecDeque<u64>>>,
    clock: C,
}

impl<C: Clock> RateLimiter<C> {
    /// Default exec-approval limit: 60 per minute.
    pub fn per_minute(max_per_window: u32, clock: C) -> Self {
        Self::new(max_per_window, 60_000, clock)
    }

    pub fn new(max_per_window: u32, window_ms: u64, clock: C) -> Self {
        Self { max_per_window, window_ms, windows: Mutex::new(HashMap::new()), clock }
    }

    /// Check and record one request for the session key.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = self.clock.epoch_ms();
        let mut windows = self.windows.lock();
        let window = windows.entry(key.to_string()).or_default();

        let cutoff = now.saturating_sub(self.window_ms);
        while window.front().is_some_and(|t| *t <= cutoff) {
            window.pop_front();
        }

        if window.len() < self.max_per_window as usize {
            window.push_back(now);
            return RateDecision { allowed: true, retry_after_ms: 0 };
        }

        let retry_after_ms = window
            .front()
            .map(|oldest| (oldest + self.window_ms).saturating_sub(now))
            .unwrap_or(self.window_ms);
        tracing::info!(key, retry_after_ms, "exec approval rate limited");
        RateDecision { allowed: false, retry_after_ms }
    }
}

#[cfg(test)]
#[path = "rate_limit_tests.rs"]
mod tests;
