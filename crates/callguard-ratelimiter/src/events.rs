//! Events emitted by the token-bucket limiter.

use callguard_core::GuardEvent;
use std::time::{Duration, Instant};

/// Observability events for a [`TokenBucketLimiter`](crate::TokenBucketLimiter).
#[derive(Debug, Clone)]
pub enum RateLimiterEvent {
    /// A consume call was granted.
    Admitted {
        limiter_name: String,
        timestamp: Instant,
        key: String,
        /// Whole tokens left after the grant.
        remaining: u64,
    },
    /// A consume call was denied.
    Rejected {
        limiter_name: String,
        timestamp: Instant,
        key: String,
        /// Time until enough tokens accumulate.
        retry_after: Duration,
    },
    /// The bucket ceiling was exceeded and the oldest buckets were dropped.
    BucketsEvicted {
        limiter_name: String,
        timestamp: Instant,
        /// Number of buckets removed.
        evicted: usize,
    },
}

impl GuardEvent for RateLimiterEvent {
    fn kind(&self) -> &'static str {
        match self {
            RateLimiterEvent::Admitted { .. } => "admitted",
            RateLimiterEvent::Rejected { .. } => "rejected",
            RateLimiterEvent::BucketsEvicted { .. } => "buckets_evicted",
        }
    }

    fn at(&self) -> Instant {
        match self {
            RateLimiterEvent::Admitted { timestamp, .. }
            | RateLimiterEvent::Rejected { timestamp, .. }
            | RateLimiterEvent::BucketsEvicted { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            RateLimiterEvent::Admitted { limiter_name, .. }
            | RateLimiterEvent::Rejected { limiter_name, .. }
            | RateLimiterEvent::BucketsEvicted { limiter_name, .. } => limiter_name,
        }
    }
}
