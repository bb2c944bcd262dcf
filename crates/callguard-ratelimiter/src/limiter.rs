//! The keyed limiter.

use crate::bucket::{BucketState, Decision, TokenBucket};
use crate::config::TokenBucketConfig;
use crate::error::RateLimitedError;
use crate::events::RateLimiterEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::time::Instant;

/// Per-key token-bucket admission control.
///
/// One instance guards one class of work (e.g. "uploads per user"); keys
/// select the bucket. Buckets are created lazily on first access, refilled
/// lazily on every access, and dropped by the ceiling/expiry rules in
/// [`TokenBucketConfig`].
///
/// All operations are synchronous arithmetic over a short critical section;
/// the limiter contains no suspension points and is safe to call from
/// concurrent tasks.
pub struct TokenBucketLimiter {
    config: TokenBucketConfig,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

impl TokenBucketLimiter {
    pub(crate) fn new(config: TokenBucketConfig) -> Self {
        Self {
            config,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Decides whether `cost` tokens can be consumed for `key` right now.
    ///
    /// A cost of zero is always allowed and consumes nothing. On rejection
    /// the decision carries `retry_after`, the whole seconds until the
    /// deficit refills.
    pub fn consume(&self, key: &str, cost: f64) -> Decision {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();

        self.expire_if_idle(&mut buckets, key, now);

        if !buckets.contains_key(key) {
            buckets.insert(key.to_string(), TokenBucket::new(self.config.max_tokens, now));
            self.enforce_ceiling(&mut buckets, key);
        }

        let per_second = self.config.refill_per_second();
        let bucket = buckets
            .get_mut(key)
            .expect("bucket inserted above");
        bucket.refill(self.config.max_tokens, per_second, now);

        let decision = match bucket.try_consume(cost, per_second) {
            Ok(()) => Decision {
                allowed: true,
                remaining: bucket.tokens.floor() as u64,
                retry_after: None,
            },
            Err(retry_after) => Decision {
                allowed: false,
                remaining: bucket.tokens.floor() as u64,
                retry_after: Some(retry_after),
            },
        };
        drop(buckets);

        if decision.allowed {
            self.config
                .event_listeners
                .emit(&RateLimiterEvent::Admitted {
                    limiter_name: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    key: key.to_string(),
                    remaining: decision.remaining,
                });

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_decisions_total", "limiter" => self.config.name.clone(), "outcome" => "allowed")
                .increment(1);
        } else {
            #[cfg(feature = "tracing")]
            tracing::trace!(
                limiter = %self.config.name,
                key,
                retry_after = ?decision.retry_after,
                "rate limit exceeded"
            );

            self.config
                .event_listeners
                .emit(&RateLimiterEvent::Rejected {
                    limiter_name: self.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    key: key.to_string(),
                    retry_after: decision.retry_after.unwrap_or_default(),
                });

            #[cfg(feature = "metrics")]
            counter!("ratelimiter_decisions_total", "limiter" => self.config.name.clone(), "outcome" => "rejected")
                .increment(1);
        }

        decision
    }

    /// `Result` form of [`consume`](Self::consume) for `?`-style call
    /// sites. Returns the remaining whole tokens on success.
    pub fn check(&self, key: &str, cost: f64) -> Result<u64, RateLimitedError> {
        let decision = self.consume(key, cost);
        if decision.allowed {
            Ok(decision.remaining)
        } else {
            Err(RateLimitedError {
                retry_after: decision.retry_after.unwrap_or_default(),
            })
        }
    }

    /// Returns the refilled (but not consumed) state of `key`'s bucket, or
    /// `None` if the key has no live bucket.
    pub fn bucket_state(&self, key: &str) -> Option<BucketState> {
        let now = Instant::now();
        let mut buckets = self.buckets.lock().unwrap();
        self.expire_if_idle(&mut buckets, key, now);
        let bucket = buckets.get_mut(key)?;
        bucket.refill(self.config.max_tokens, self.config.refill_per_second(), now);
        Some(bucket.snapshot())
    }

    /// Deletes the bucket for `key`; the next consume starts fresh at full
    /// capacity.
    pub fn reset(&self, key: &str) {
        self.buckets.lock().unwrap().remove(key);
    }

    /// Deletes all buckets.
    pub fn clear(&self) {
        self.buckets.lock().unwrap().clear();
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap().len()
    }

    fn expire_if_idle(
        &self,
        buckets: &mut HashMap<String, TokenBucket>,
        key: &str,
        now: Instant,
    ) {
        if let Some(bucket) = buckets.get(key) {
            if now.saturating_duration_since(bucket.last_refill) > self.config.idle_expiry {
                buckets.remove(key);
            }
        }
    }

    /// Shrinks the population to `evict_to`, oldest buckets first, when the
    /// ceiling has been exceeded. The bucket named by `keep` is never a
    /// candidate: timestamps can tie (buckets created within one timer
    /// granule), and the tie-break must not evict the bucket the current
    /// call is about to use.
    fn enforce_ceiling(&self, buckets: &mut HashMap<String, TokenBucket>, keep: &str) {
        if buckets.len() <= self.config.max_buckets {
            #[cfg(feature = "metrics")]
            gauge!("ratelimiter_buckets", "limiter" => self.config.name.clone())
                .set(buckets.len() as f64);
            return;
        }

        let mut by_age: Vec<(String, Instant)> = buckets
            .iter()
            .filter(|(k, _)| k.as_str() != keep)
            .map(|(k, b)| (k.clone(), b.last_refill))
            .collect();
        by_age.sort_by_key(|(_, last_refill)| *last_refill);

        let excess = buckets.len().saturating_sub(self.config.evict_to);
        let mut evicted = 0usize;
        for (key, _) in by_age.into_iter().take(excess) {
            buckets.remove(&key);
            evicted += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            limiter = %self.config.name,
            evicted,
            remaining = buckets.len(),
            "bucket ceiling exceeded, evicted oldest buckets"
        );

        self.config
            .event_listeners
            .emit(&RateLimiterEvent::BucketsEvicted {
                limiter_name: self.config.name.clone(),
                timestamp: std::time::Instant::now(),
                evicted,
            });

        #[cfg(feature = "metrics")]
        {
            counter!("ratelimiter_evictions_total", "limiter" => self.config.name.clone())
                .increment(evicted as u64);
            gauge!("ratelimiter_buckets", "limiter" => self.config.name.clone())
                .set(buckets.len() as f64);
        }
    }
}
