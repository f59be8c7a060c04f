// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use dc_core::FakeClock;
use std::time::Duration;

#[test]
fn admits_up_to_the_limit() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::new(3, 60_000, clock);

    for _ in 0..3 {
        assert!(limiter.check("sess-1").allowed);
    }
    let denied = limiter.check("sess-1");
    assert!(!denied.allowed);
    assert!(denied.retry_after_ms > 0 && denied.retry_after_ms <= 60_000);
}

#[test]
fn window_slides_with_time() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::new(2, 60_000, clock.clone());

    assert!(limiter.check("sess-1").allowed);
    clock.advance(Duration::from_secs(30));
    assert!(limiter.check("sess-1").allowed);
    assert!(!limiter.check("sess-1").allowed);

    // First request falls out of the window after 60s total.
    clock.advance(Duration::from_secs(31));
    assert!(limiter.check("sess-1").allowed);
}

#[test]
fn keys_are_independent() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::new(1, 60_000, clock);

    assert!(limiter.check("sess-1").allowed);
    assert!(limiter.check("sess-2").allowed);
    assert!(!limiter.check("sess-1").allowed);
}

#[test]
fn retry_after_reflects_oldest_entry() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::new(1, 60_000, clock.clone());

    assert!(limiter.check("sess-1").allowed);
    clock.advance(Duration::from_secs(45));
    let denied = limiter.check("sess-1");
    assert!(!denied.allowed);
    assert_eq!(denied.retry_after_ms, 15_000);
}

#[test]
fn per_minute_constructor_uses_minute_window() {
    let clock = FakeClock::new();
    let limiter = RateLimiter::per_minute(60, clock);
    for _ in 0..60 {
        assert!(limiter.check("k").allowed);
    }
    assert!(!limiter.check("k").allowed);
}
