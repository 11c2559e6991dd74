//! Request rate limiting using token bucket algorithm
//!
//! One `RequestLimiter` is shared by every session in a run (the sequential
//! session as well as each worker in the extraction pool), capping the total
//! number of in-flight fetches issued against the remote registry per second.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global request limiter shared across all sessions of a run
///
/// Uses a token bucket with lock-free token tracking:
/// - tokens represent fetches that may start now
/// - tokens refill at a constant rate (`limit_rps`)
/// - a session acquires one token before each fetch, waiting on an empty
///   bucket until refill
///
/// A limit of 0 (constructed from `None`) means unlimited.
#[derive(Clone)]
pub struct RequestLimiter {
    /// Fetches per second (0 = unlimited)
    limit_rps: Arc<AtomicU64>,
    /// Available tokens (fetches that may start now)
    tokens: Arc<AtomicU64>,
    /// Last refill timestamp (nanoseconds since arbitrary epoch)
    last_refill: Arc<AtomicU64>,
}

impl RequestLimiter {
    /// Create a new limiter with the specified rate (None = unlimited)
    #[must_use]
    pub fn new(limit_rps: Option<u32>) -> Self {
        let limit = u64::from(limit_rps.unwrap_or(0));
        let now = Self::now_nanos();

        Self {
            limit_rps: Arc::new(AtomicU64::new(limit)),
            tokens: Arc::new(AtomicU64::new(limit)),
            last_refill: Arc::new(AtomicU64::new(now)),
        }
    }

    /// Set a new rate. Takes effect immediately; raising the rate adds the
    /// difference to the bucket so waiting fetches wake promptly.
    pub fn set_limit(&self, limit_rps: Option<u32>) {
        let new_limit = u64::from(limit_rps.unwrap_or(0));
        let old_limit = self.limit_rps.swap(new_limit, Ordering::SeqCst);

        if new_limit > old_limit {
            self.tokens.fetch_add(new_limit - old_limit, Ordering::SeqCst);
        }
    }

    /// Get the current rate (None = unlimited)
    pub fn get_limit(&self) -> Option<u32> {
        let limit = self.limit_rps.load(Ordering::Relaxed);
        if limit == 0 { None } else { Some(limit as u32) }
    }

    /// Acquire permission to start one fetch, waiting until a token is
    /// available. Returns immediately when unlimited.
    pub async fn acquire(&self) {
        if self.limit_rps.load(Ordering::Relaxed) == 0 {
            return;
        }

        loop {
            // Re-read the limit each iteration so dynamic changes take effect
            let limit = self.limit_rps.load(Ordering::Relaxed);
            if limit == 0 {
                return;
            }

            self.refill_tokens();

            let current_tokens = self.tokens.load(Ordering::SeqCst);
            if current_tokens > 0
                && self
                    .tokens
                    .compare_exchange(
                        current_tokens,
                        current_tokens - 1,
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
            {
                return;
            }

            // No token available. Sleep roughly one token interval, capped
            // so dynamic limit changes are noticed promptly.
            let wait_ms = (1000.0 / limit as f64) as u64;
            tokio::time::sleep(Duration::from_millis(wait_ms.clamp(10, 100))).await;
        }
    }

    /// Refill tokens based on elapsed time since last refill
    fn refill_tokens(&self) {
        let limit = self.limit_rps.load(Ordering::Relaxed);
        if limit == 0 {
            return;
        }

        let now = Self::now_nanos();
        let last = self.last_refill.load(Ordering::SeqCst);

        let elapsed_secs = now.saturating_sub(last) as f64 / 1_000_000_000.0;
        let tokens_to_add = (limit as f64 * elapsed_secs) as u64;

        if tokens_to_add > 0
            && self
                .last_refill
                .compare_exchange(last, now, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        {
            // Cap at limit: the bucket never holds more than one second of burst
            let current_tokens = self.tokens.load(Ordering::SeqCst);
            let new_tokens = (current_tokens + tokens_to_add).min(limit);
            self.tokens.store(new_tokens, Ordering::SeqCst);
        }
    }

    /// Monotonic time in nanoseconds since an arbitrary per-process epoch
    fn now_nanos() -> u64 {
        static START: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();
        let start = START.get_or_init(Instant::now);
        start.elapsed().as_nanos() as u64
    }
}
