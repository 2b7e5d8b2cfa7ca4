//! # Sign-in Throttling
//!
//! Fixed-window attempt counter keyed by username. Every attempt is reserved
//! before the password is checked; a successful sign-in clears the key, so
//! only failures stay counted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

/// Rate limiter configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum failures per window.
    pub max_failures: u32,
    /// Window duration.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Five failed attempts per fifteen minutes.
    pub fn login() -> Self {
        Self {
            max_failures: 5,
            window: Duration::from_secs(15 * 60),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::login()
    }
}

/// Per-key failure state.
#[derive(Debug, Clone)]
struct BucketState {
    failures: u32,
    window_start: Instant,
}

/// Shared failure counter.
#[derive(Debug, Clone)]
pub struct LoginLimiter {
    config: RateLimitConfig,
    buckets: Arc<RwLock<HashMap<String, BucketState>>>,
}

impl LoginLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            buckets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Reserve one sign-in attempt for `key`. Returns false once the window
    /// already holds `max_failures` attempts.
    ///
    /// The attempt counts as a failure until `reset` clears the key, so
    /// concurrent requests cannot all slip past the check while their
    /// passwords are being verified.
    pub fn try_acquire(&self, key: &str) -> bool {
        self.try_acquire_at(key, Instant::now())
    }

    /// Forget all attempts for `key`. Called after a successful sign-in.
    pub fn reset(&self, key: &str) {
        self.buckets.write().remove(key);
    }

    fn try_acquire_at(&self, key: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.write();

        // Drop expired windows so the map does not grow with every
        // mistyped username.
        let window = self.config.window;
        buckets.retain(|_, b| now.duration_since(b.window_start) < window);

        let bucket = buckets.entry(key.to_string()).or_insert(BucketState {
            failures: 0,
            window_start: now,
        });
        if bucket.failures >= self.config.max_failures {
            return false;
        }
        bucket.failures += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter() -> LoginLimiter {
        LoginLimiter::new(RateLimitConfig {
            max_failures: 3,
            window: Duration::from_secs(60),
        })
    }

    #[test]
    fn refuses_once_window_is_full() {
        let l = limiter();
        let t0 = Instant::now();
        for _ in 0..3 {
            assert!(l.try_acquire_at("clerk", t0));
        }
        assert!(!l.try_acquire_at("clerk", t0));
        assert!(l.try_acquire_at("other", t0));
    }

    #[test]
    fn window_expiry_unblocks() {
        let l = limiter();
        let t0 = Instant::now();
        for _ in 0..3 {
            l.try_acquire_at("clerk", t0);
        }
        assert!(l.try_acquire_at("clerk", t0 + Duration::from_secs(61)));
    }

    #[test]
    fn reset_clears_attempts() {
        let l = limiter();
        for _ in 0..3 {
            l.try_acquire("clerk");
        }
        assert!(!l.try_acquire("clerk"));
        l.reset("clerk");
        assert!(l.try_acquire("clerk"));
    }

    #[test]
    fn concurrent_attempts_never_exceed_the_limit() {
        let l = limiter();
        let granted: usize = std::thread::scope(|s| {
            let handles: Vec<_> = (0..16)
                .map(|_| s.spawn(|| l.try_acquire("clerk")))
                .collect();
            handles
                .into_iter()
                .map(|h| usize::from(h.join().unwrap()))
                .sum()
        });
        assert_eq!(granted, 3);
    }
}
