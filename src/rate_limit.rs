// ABOUTME: Per-key token bucket rate limiter with background eviction
// ABOUTME: One mutex over the bucket map; operations are O(1)
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 DbBridge Contributors

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::debug;

/// How often the sweeper runs
const SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);
/// Buckets idle longer than this are evicted
const IDLE_EVICTION: Duration = Duration::from_secs(10 * 60);

struct Bucket {
    tokens: f64,
    last_check: Instant,
}

/// Token bucket rate limiter keyed by an opaque string (API key or client IP).
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<Mutex<HashMap<String, Bucket>>>,
    /// Tokens added per second
    rate: f64,
    /// Bucket capacity
    burst: f64,
}

impl RateLimiter {
    /// Creates a limiter admitting `rate_per_minute` sustained requests with
    /// bursts up to `burst`.
    #[must_use]
    pub fn new(rate_per_minute: f64, burst: u32) -> Self {
        Self {
            buckets: Arc::new(Mutex::new(HashMap::new())),
            rate: rate_per_minute / 60.0,
            burst: f64::from(burst),
        }
    }

    /// Checks whether a request under `key` is admitted right now.
    ///
    /// An unseen key starts with a full bucket minus the token this request
    /// consumes. Existing buckets refill by elapsed time, capped at the burst
    /// capacity.
    pub fn allow(&self, key: &str) -> bool {
        let mut buckets = match self.buckets.lock() {
            Ok(guard) => guard,
            // A poisoned map only ever holds counters; keep limiting.
            Err(poisoned) => poisoned.into_inner(),
        };
        let now = Instant::now();

        match buckets.get_mut(key) {
            None => {
                buckets.insert(
                    key.to_owned(),
                    Bucket {
                        tokens: self.burst - 1.0,
                        last_check: now,
                    },
                );
                true
            }
            Some(bucket) => {
                let elapsed = now.duration_since(bucket.last_check).as_secs_f64();
                bucket.tokens = (bucket.tokens + elapsed * self.rate).min(self.burst);
                bucket.last_check = now;

                if bucket.tokens >= 1.0 {
                    bucket.tokens -= 1.0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Starts the background task that evicts buckets idle for more than ten
    /// minutes. Runs until the process exits.
    pub fn spawn_sweeper(&self) {
        let buckets = Arc::clone(&self.buckets);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(SWEEP_INTERVAL);
            // First tick completes immediately; skip it
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let now = Instant::now();
                let mut map = match buckets.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let before = map.len();
                map.retain(|_, bucket| now.duration_since(bucket.last_check) < IDLE_EVICTION);
                let evicted = before - map.len();
                if evicted > 0 {
                    debug!(evicted, "evicted idle rate limit buckets");
                }
            }
        });
    }

    /// Number of live buckets, for tests and monitoring.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        match self.buckets.lock() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}
