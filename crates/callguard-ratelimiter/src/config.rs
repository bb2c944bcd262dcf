//! Configuration for the token-bucket limiter.

use crate::events::RateLimiterEvent;
use crate::limiter::TokenBucketLimiter;
use callguard_core::events::EventListeners;
use std::time::Duration;

/// Configuration for a [`TokenBucketLimiter`].
#[derive(Clone)]
pub struct TokenBucketConfig {
    /// Burst capacity of every bucket.
    pub(crate) max_tokens: f64,
    /// Sustained refill rate, expressed per minute.
    pub(crate) refill_per_minute: f64,
    /// Ceiling on the bucket population; exceeding it on creation evicts.
    pub(crate) max_buckets: usize,
    /// Eviction target once the ceiling is exceeded.
    pub(crate) evict_to: usize,
    /// Buckets idle this long are treated as absent on next access.
    pub(crate) idle_expiry: Duration,
    /// Name of this limiter instance, for observability.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<RateLimiterEvent>,
}

impl TokenBucketConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> TokenBucketConfigBuilder {
        TokenBucketConfigBuilder::new()
    }

    pub(crate) fn refill_per_second(&self) -> f64 {
        self.refill_per_minute / 60.0
    }
}

/// Builder for [`TokenBucketConfig`].
pub struct TokenBucketConfigBuilder {
    max_tokens: f64,
    refill_per_minute: f64,
    max_buckets: usize,
    evict_to: usize,
    idle_expiry: Duration,
    name: String,
    event_listeners: EventListeners<RateLimiterEvent>,
}

impl TokenBucketConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_tokens: 10.0,
            refill_per_minute: 60.0,
            max_buckets: 10_000,
            evict_to: 5_000,
            idle_expiry: Duration::from_secs(3600),
            name: "ratelimiter".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the burst capacity of each bucket.
    ///
    /// Default: 10
    pub fn max_tokens(mut self, max: f64) -> Self {
        self.max_tokens = max;
        self
    }

    /// Sets the sustained refill rate in tokens per minute.
    ///
    /// Default: 60 (one token per second)
    pub fn refill_per_minute(mut self, rate: f64) -> Self {
        self.refill_per_minute = rate;
        self
    }

    /// Sets the ceiling on the number of live buckets.
    ///
    /// Exceeding the ceiling on bucket creation evicts the oldest buckets
    /// down to [`evict_to`](Self::evict_to).
    ///
    /// Default: 10 000
    pub fn max_buckets(mut self, max: usize) -> Self {
        self.max_buckets = max;
        self
    }

    /// Sets the population the eviction pass shrinks to.
    ///
    /// Default: 5 000
    pub fn evict_to(mut self, target: usize) -> Self {
        self.evict_to = target;
        self
    }

    /// Sets how long a bucket may sit unused before it is treated as
    /// absent on its next access.
    ///
    /// Default: 1 hour
    pub fn idle_expiry(mut self, expiry: Duration) -> Self {
        self.idle_expiry = expiry;
        self
    }

    /// Give this limiter a human-readable name for observability.
    ///
    /// Default: `ratelimiter`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a consume call is granted.
    ///
    /// # Callback Signature
    /// `Fn(&str, u64)` - the key and the whole tokens remaining after the
    /// grant.
    pub fn on_admitted<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, u64) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let RateLimiterEvent::Admitted { key, remaining, .. } = event {
                f(key, *remaining);
            }
        });
        self
    }

    /// Registers a callback invoked when a consume call is denied.
    ///
    /// # Callback Signature
    /// `Fn(&str, Duration)` - the key and the time until enough tokens
    /// accumulate.
    pub fn on_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let RateLimiterEvent::Rejected {
                key, retry_after, ..
            } = event
            {
                f(key, *retry_after);
            }
        });
        self
    }

    /// Registers a callback invoked when the bucket ceiling triggers an
    /// eviction pass.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - the number of buckets evicted.
    pub fn on_eviction<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let RateLimiterEvent::BucketsEvicted { evicted, .. } = event {
                f(*evicted);
            }
        });
        self
    }

    /// Builds the limiter.
    ///
    /// # Panics
    ///
    /// Panics if `evict_to > max_buckets` or if `refill_per_minute` is not
    /// strictly positive.
    pub fn build(self) -> TokenBucketLimiter {
        assert!(
            self.evict_to <= self.max_buckets,
            "evict_to must not exceed max_buckets"
        );
        assert!(
            self.refill_per_minute > 0.0,
            "refill_per_minute must be positive"
        );
        TokenBucketLimiter::new(TokenBucketConfig {
            max_tokens: self.max_tokens,
            refill_per_minute: self.refill_per_minute,
            max_buckets: self.max_buckets,
            evict_to: self.evict_to,
            idle_expiry: self.idle_expiry,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for TokenBucketConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
