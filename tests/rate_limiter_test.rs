// ABOUTME: Token bucket tests: burst exhaustion, refill, per-key isolation
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::time::Duration;

use dbbridge::rate_limit::RateLimiter;

#[test]
fn admits_burst_then_denies() {
    // 60/min refills one token a second; a tight loop sees only the burst
    let limiter = RateLimiter::new(60.0, 10);
    let admitted = (0..11).filter(|_| limiter.allow("key-1")).count();
    assert_eq!(admitted, 10);
    assert!(!limiter.allow("key-1"));
}

#[test]
fn keys_are_limited_independently() {
    let limiter = RateLimiter::new(60.0, 2);
    assert!(limiter.allow("a"));
    assert!(limiter.allow("a"));
    assert!(!limiter.allow("a"));

    assert!(limiter.allow("b"));
    assert_eq!(limiter.bucket_count(), 2);
}

#[test]
fn tokens_refill_over_time() {
    // 1200/min = 20 tokens a second
    let limiter = RateLimiter::new(1200.0, 1);
    assert!(limiter.allow("k"));
    assert!(!limiter.allow("k"));

    std::thread::sleep(Duration::from_millis(120));
    assert!(limiter.allow("k"));
}

#[test]
fn refill_is_capped_at_burst() {
    let limiter = RateLimiter::new(6000.0, 3);
    assert!(limiter.allow("k"));
    // 100 tokens/sec for 200ms would add ~20 tokens; the cap holds it at 3
    std::thread::sleep(Duration::from_millis(200));
    let admitted = (0..10).filter(|_| limiter.allow("k")).count();
    assert_eq!(admitted, 3);
}

#[test]
fn admission_bound_holds_over_a_window() {
    // rate r per minute, burst b: admitted in a window of length d is at most
    // b + ceil(r * d / 60)
    let limiter = RateLimiter::new(600.0, 5);
    let window = Duration::from_millis(300);
    let start = std::time::Instant::now();
    let mut admitted = 0u32;
    while start.elapsed() < window {
        if limiter.allow("w") {
            admitted += 1;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    let elapsed = start.elapsed().as_secs_f64();
    let bound = 5.0 + (600.0 * elapsed / 60.0).ceil();
    assert!(
        f64::from(admitted) <= bound,
        "admitted {admitted} exceeds bound {bound}"
    );
}
