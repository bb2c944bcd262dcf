//! Per-key bucket state and the refill arithmetic.

use std::time::Duration;
use tokio::time::Instant;

/// The limiter's answer to a [`consume`](crate::TokenBucketLimiter::consume)
/// call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Whether the requested cost was granted.
    pub allowed: bool,
    /// Whole tokens left in the bucket after this call.
    pub remaining: u64,
    /// On rejection, how long until enough tokens accumulate.
    pub retry_after: Option<Duration>,
}

/// A read-only snapshot of one key's bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketState {
    /// Current available tokens, `0.0 ..= max_tokens`.
    pub tokens: f64,
    /// When tokens were last recomputed.
    pub last_refill: Instant,
}

/// One key's bucket. Mutated in place on every access; never refilled by a
/// background timer.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenBucket {
    pub(crate) tokens: f64,
    pub(crate) last_refill: Instant,
}

impl TokenBucket {
    /// A fresh bucket starts at full capacity.
    pub(crate) fn new(max_tokens: f64, now: Instant) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: now,
        }
    }

    /// Recomputes tokens from elapsed time, capped at capacity.
    pub(crate) fn refill(&mut self, max_tokens: f64, refill_per_second: f64, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        self.tokens = (self.tokens + elapsed.as_secs_f64() * refill_per_second).min(max_tokens);
        self.last_refill = now;
    }

    /// Attempts to take `cost` tokens from an already-refilled bucket.
    ///
    /// Zero cost is always granted and consumes nothing. On rejection,
    /// returns the whole seconds until the deficit refills.
    pub(crate) fn try_consume(&mut self, cost: f64, refill_per_second: f64) -> Result<(), Duration> {
        if cost == 0.0 {
            return Ok(());
        }
        if self.tokens >= cost {
            self.tokens -= cost;
            Ok(())
        } else {
            let deficit = cost - self.tokens;
            Err(Duration::from_secs(
                (deficit / refill_per_second).ceil() as u64
            ))
        }
    }

    pub(crate) fn snapshot(&self) -> BucketState {
        BucketState {
            tokens: self.tokens,
            last_refill: self.last_refill,
        }
    }
}
