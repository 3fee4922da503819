//! Per-capability token-bucket rate limiting, grounded on the teacher's
//! `dashflow-streaming::rate_limiter` token bucket (trimmed of the
//! Prometheus/Redis machinery this workspace has no use for).

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Rate limit configuration for one capability.
#[derive(Debug, Clone, Copy)]
pub struct RateLimit {
    /// Requests allowed per minute, sustained.
    pub per_minute: u32,
    /// Burst capacity (max tokens held at once).
    pub burst: u32,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            per_minute: 100,
            burst: 20,
        }
    }
}

/// A token bucket guarding one Provider Gateway capability.
pub struct TokenBucket {
    state: Mutex<BucketState>,
    capacity: f64,
    refill_per_sec: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Build a bucket from a [`RateLimit`], starting full.
    #[must_use]
    pub fn new(limit: RateLimit) -> Self {
        let capacity = limit.burst.max(1) as f64;
        Self {
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            refill_per_sec: f64::from(limit.per_minute) / 60.0,
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.last_refill = now;
    }

    /// Try to consume one token without blocking. Returns `true` on success.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        self.refill(&mut state);
        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Seconds to wait before the next token is likely available, given the
    /// bucket's current state. Used to derive a bounded queue wait.
    #[must_use]
    pub fn estimated_wait(&self) -> Duration {
        let state = self.state.lock();
        if state.tokens >= 1.0 || self.refill_per_sec <= 0.0 {
            return Duration::ZERO;
        }
        let deficit = 1.0 - state.tokens;
        Duration::from_secs_f64(deficit / self.refill_per_sec)
    }

    /// Block (cooperatively) until a token is available or `max_wait`
    /// elapses, then acquire if possible. Returns `true` if a token was
    /// acquired before the deadline.
    pub async fn acquire(&self, max_wait: Duration) -> bool {
        let deadline = Instant::now() + max_wait;
        loop {
            if self.try_acquire() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            let wait = self.estimated_wait().min(Duration::from_millis(50)).max(Duration::from_millis(1));
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_full_and_drains() {
        let bucket = TokenBucket::new(RateLimit {
            per_minute: 60,
            burst: 3,
        });
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(bucket.try_acquire());
        assert!(!bucket.try_acquire());
    }

    #[tokio::test]
    async fn acquire_times_out_when_exhausted() {
        let bucket = TokenBucket::new(RateLimit {
            per_minute: 1,
            burst: 1,
        });
        assert!(bucket.try_acquire());
        let ok = bucket.acquire(Duration::from_millis(20)).await;
        assert!(!ok);
    }
}
