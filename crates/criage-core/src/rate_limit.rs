//! Token-bucket rate limiter for outbound registry calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Used when a non-positive rate is requested.
pub const DEFAULT_RATE: i64 = 10;

/// Token bucket with capacity `n` refilled at one token per `1/n` seconds.
///
/// The bucket starts full, so the first `n` calls to [`wait`](Self::wait)
/// return immediately. A background task owned by the limiter adds tokens;
/// it stops when the limiter is closed or dropped.
#[derive(Debug)]
pub struct RateLimiter {
    tokens: Arc<Semaphore>,
    refill: JoinHandle<()>,
    capacity: usize,
    period: Duration,
}

impl RateLimiter {
    /// Create a limiter allowing `requests_per_second` calls per second.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(requests_per_second: i64) -> Self {
        let rate = if requests_per_second <= 0 {
            DEFAULT_RATE
        } else {
            requests_per_second
        };
        let capacity = rate as usize;
        let period = Duration::from_secs(1) / rate as u32;

        let tokens = Arc::new(Semaphore::new(capacity));
        let refill = tokio::spawn(refill_loop(Arc::clone(&tokens), capacity, period));

        Self {
            tokens,
            refill,
            capacity,
            period,
        }
    }

    /// Block until a token is available, then consume it.
    ///
    /// Never fails. After [`close`](Self::close) it returns immediately.
    pub async fn wait(&self) {
        if let Ok(permit) = self.tokens.acquire().await {
            permit.forget();
        }
    }

    /// Stop the refill task and release every waiter.
    pub fn close(&self) {
        self.refill.abort();
        self.tokens.close();
    }

    /// Bucket size.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Interval between refills.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> usize {
        self.tokens.available_permits()
    }
}

impl Drop for RateLimiter {
    fn drop(&mut self) {
        self.refill.abort();
    }
}

async fn refill_loop(tokens: Arc<Semaphore>, capacity: usize, period: Duration) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        if tokens.is_closed() {
            return;
        }
        // A full bucket drops the token.
        if tokens.available_permits() < capacity {
            tokens.add_permits(1);
        }
    }
}
