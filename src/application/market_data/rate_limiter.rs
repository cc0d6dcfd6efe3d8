//! Sliding-window rate limiter with headroom.
//!
//! Grounded on `application/simulator.rs::GlobalRateLimiter`'s
//! mutex-guarded counter with sleep-until-available, corrected from a
//! fixed per-minute window to a true sliding window per
//! `original_source/.../hyperliquid/rate_limiter.py` (same
//! headroom-then-deque-of-timestamps design), cross-checked against
//! `leemthai-sniper/src/data/rate_limiter.rs`.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    /// `max_requests` scaled down by the headroom fraction, so the limiter
    /// starts throttling before the exchange's own hard limit is hit.
    effective_limit: usize,
    timestamps: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// `headroom_percent` is held back from `max_requests`, e.g. 0.3 means
    /// the limiter only ever allows 70% of the exchange's stated limit.
    pub fn new(max_requests: usize, window: Duration, headroom_percent: f64) -> Self {
        let effective_limit =
            ((max_requests as f64) * (1.0 - headroom_percent)).floor().max(1.0) as usize;
        Self {
            max_requests,
            window,
            effective_limit,
            timestamps: Mutex::new(VecDeque::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.max_requests
    }

    pub fn effective_limit(&self) -> usize {
        self.effective_limit
    }

    async fn drop_expired(&self, timestamps: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = timestamps.front() {
            if now.duration_since(front) >= self.window {
                timestamps.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wait (if necessary) until a slot frees up, then record this request.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock().await;
                let now = Instant::now();
                self.drop_expired(&mut timestamps, now).await;

                if timestamps.len() < self.effective_limit {
                    timestamps.push_back(now);
                    return;
                }
                let oldest = *timestamps.front().expect("len checked above");
                self.window.saturating_sub(now.duration_since(oldest))
            };
            tokio::time::sleep(wait).await;
        }
    }

    /// Requests currently counted within the window, without blocking.
    pub async fn current_usage(&self) -> usize {
        let mut timestamps = self.timestamps.lock().await;
        let now = Instant::now();
        self.drop_expired(&mut timestamps, now).await;
        timestamps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_requests_up_to_effective_limit_without_waiting() {
        let limiter = RateLimiter::new(10, Duration::from_secs(60), 0.3);
        assert_eq!(limiter.effective_limit(), 7);
        for _ in 0..7 {
            limiter.acquire().await;
        }
        assert_eq!(limiter.current_usage().await, 7);
    }

    #[tokio::test]
    async fn headroom_reduces_effective_limit_below_capacity() {
        let limiter = RateLimiter::new(100, Duration::from_secs(60), 0.5);
        assert_eq!(limiter.effective_limit(), 50);
        assert_eq!(limiter.capacity(), 100);
    }

    #[tokio::test]
    async fn zero_headroom_uses_full_capacity() {
        let limiter = RateLimiter::new(5, Duration::from_millis(50), 0.0);
        assert_eq!(limiter.effective_limit(), 5);
    }
}
