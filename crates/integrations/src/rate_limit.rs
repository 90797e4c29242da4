//! Token-bucket limiter for image-generation calls, with a per-minute window
//! guard on top of the bucket.

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

const WINDOW: Duration = Duration::from_secs(60);
/// Floor on a computed wait so float rounding can never spin the loop.
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    last_refill: Instant,
    /// Grant instants inside the trailing 60s window, oldest first.
    grants: VecDeque<Instant>,
}

/// Async rate limiter shared by every generation task.
///
/// The bucket starts full with `max_per_minute` tokens and refills
/// continuously at `max_per_minute / 60` tokens per second. Independently,
/// no more than `max_per_minute` permits are granted in any 60 second
/// window. State lives behind a single lock that is never held across an
/// await.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: u32,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        let capacity = max_per_minute.max(1);
        Self {
            capacity,
            refill_per_sec: f64::from(capacity) / 60.0,
            state: Mutex::new(BucketState {
                tokens: f64::from(capacity),
                last_refill: Instant::now(),
                grants: VecDeque::with_capacity(capacity as usize),
            }),
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Wait until a permit is available and take it.
    pub async fn acquire(&self) {
        let started = Instant::now();
        loop {
            let wait = match self.try_take(Instant::now()) {
                Ok(()) => break,
                Err(wait) => wait,
            };
            debug!(wait_ms = wait.as_millis() as u64, "rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }

        let waited = started.elapsed();
        if !waited.is_zero() {
            metrics::histogram!("rate_limiter.wait_seconds").record(waited.as_secs_f64());
        }
        metrics::counter!("rate_limiter.granted").increment(1);
    }

    /// Take a permit if one is available right now.
    pub fn try_acquire(&self) -> bool {
        self.try_take(Instant::now()).is_ok()
    }

    /// Tokens currently in the bucket.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock();
        self.refill(&mut state, Instant::now());
        state.tokens
    }

    /// Either consume a permit at `now` or report how long to wait.
    fn try_take(&self, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock();
        self.refill(&mut state, now);
        while state
            .grants
            .front()
            .is_some_and(|&t| now.saturating_duration_since(t) >= WINDOW)
        {
            state.grants.pop_front();
        }

        let window_full = state.grants.len() >= self.capacity as usize;
        if state.tokens >= 1.0 && !window_full {
            state.tokens -= 1.0;
            state.grants.push_back(now);
            return Ok(());
        }

        let token_wait = if state.tokens >= 1.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64((1.0 - state.tokens) / self.refill_per_sec)
        };
        let window_wait = match state.grants.front() {
            Some(&oldest) if window_full => (oldest + WINDOW).saturating_duration_since(now),
            _ => Duration::ZERO,
        };
        Err(token_wait.max(window_wait).max(MIN_WAIT))
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(f64::from(self.capacity));
            state.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_burst_up_to_capacity_is_immediate() {
        let limiter = RateLimiter::new(5);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert!(!limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_capacity_in_any_minute() {
        let limiter = Arc::new(RateLimiter::new(4));
        let grants = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..14 {
            let limiter = Arc::clone(&limiter);
            let grants = Arc::clone(&grants);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                grants.lock().push(Instant::now());
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        let mut grants = grants.lock().clone();
        grants.sort();
        assert_eq!(grants.len(), 14);
        for (i, &start) in grants.iter().enumerate() {
            let in_window = grants[i..].iter().filter(|&&t| t - start < WINDOW).count();
            assert!(in_window <= 4, "{in_window} grants inside one minute");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_refills_over_time() {
        let limiter = RateLimiter::new(60);
        for _ in 0..60 {
            assert!(limiter.try_acquire());
        }
        assert!(!limiter.try_acquire());
        assert!(limiter.available() < 1.0);

        // One token per second, but the minute window is still full.
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(limiter.available() >= 4.9);
        assert!(!limiter.try_acquire());

        tokio::time::advance(Duration::from_secs(55)).await;
        assert!(limiter.try_acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_resumes_after_window() {
        let limiter = RateLimiter::new(2);
        limiter.acquire().await;
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_secs(60));
    }
}
