//! Sliding-window request rate limiter.
//!
//! Fixed window per client key, held in process memory. Keys with no recent
//! traffic are only pruned of stale timestamps on their next check, never
//! evicted outright; correct for a single process instance only.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Allowed,
    /// Rejected; hint for how long the client should wait before retrying.
    Limited { retry_after: Duration },
}

impl RateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// Sliding-window limiter: at most `max_requests` timestamps per key within
/// the trailing `window`.
#[derive(Debug)]
pub struct RateLimiter {
    buckets: Mutex<HashMap<String, Vec<Instant>>>,
    window: Duration,
    max_requests: usize,
}

impl RateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            buckets: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    /// Prune stale timestamps for `key`, then admit or reject.
    pub fn check(&self, key: &str) -> RateDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(key.to_string()).or_default();

        bucket.retain(|t| now.duration_since(*t) < self.window);

        if bucket.len() >= self.max_requests {
            // Oldest surviving timestamp decides when a slot frees up.
            let retry_after = bucket
                .first()
                .map(|t| self.window.saturating_sub(now.duration_since(*t)))
                .unwrap_or(self.window);
            return RateDecision::Limited { retry_after };
        }

        bucket.push(now);
        RateDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_max_then_rejects() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 10);

        for _ in 0..10 {
            assert!(limiter.check("chat:1.2.3.4").is_allowed());
        }
        assert!(!limiter.check("chat:1.2.3.4").is_allowed());
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 2);

        assert!(limiter.check("chat:a").is_allowed());
        assert!(limiter.check("chat:a").is_allowed());
        assert!(!limiter.check("chat:a").is_allowed());

        assert!(limiter.check("chat:b").is_allowed());
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(Duration::from_millis(100), 2);

        assert!(limiter.check("k").is_allowed());
        assert!(limiter.check("k").is_allowed());
        assert!(!limiter.check("k").is_allowed());

        std::thread::sleep(Duration::from_millis(120));
        assert!(limiter.check("k").is_allowed());
    }

    #[test]
    fn limited_decision_carries_retry_hint() {
        let limiter = RateLimiter::new(Duration::from_secs(60), 1);
        assert!(limiter.check("k").is_allowed());

        match limiter.check("k") {
            RateDecision::Limited { retry_after } => {
                assert!(retry_after <= Duration::from_secs(60));
                assert!(retry_after > Duration::from_secs(58));
            }
            RateDecision::Allowed => panic!("expected rejection"),
        }
    }
}
