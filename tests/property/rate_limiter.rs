//! Property tests for the token-bucket rate limiter.
//!
//! Invariants tested:
//! - Zero cost is always admitted and never mutates the bucket
//! - A fresh bucket admits any cost up to its capacity
//! - Under frozen time, remaining drops by exactly the cost consumed
//! - Refill converges to exactly the capacity, never beyond

use super::paused_runtime;
use callguard_ratelimiter::TokenBucketConfig;
use proptest::prelude::*;
use std::time::Duration;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: `consume(key, 0)` always passes and leaves the bucket
    /// untouched.
    #[test]
    fn zero_cost_never_mutates(
        max_tokens in 1.0f64..1000.0,
        spend in 0.0f64..1000.0,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = TokenBucketConfig::builder()
                .max_tokens(max_tokens)
                .refill_per_minute(60.0)
                .build();

            limiter.consume("k", spend.min(max_tokens));
            let before = limiter.bucket_state("k").map(|s| s.tokens);

            let probe = limiter.consume("k", 0.0);
            prop_assert!(probe.allowed);
            let after = limiter.bucket_state("k").map(|s| s.tokens);
            prop_assert_eq!(before, after);
            Ok(())
        })?;
    }

    /// Property: a fresh bucket admits any cost up to capacity.
    #[test]
    fn fresh_bucket_admits_up_to_capacity(
        max_tokens in 1.0f64..1000.0,
        fraction in 0.0f64..=1.0,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = TokenBucketConfig::builder()
                .max_tokens(max_tokens)
                .refill_per_minute(60.0)
                .build();

            let decision = limiter.consume("k", max_tokens * fraction);
            prop_assert!(decision.allowed);
            Ok(())
        })?;
    }

    /// Property: with the clock frozen, two consecutive integer-cost
    /// consumes report `remaining` values differing by exactly the cost.
    #[test]
    fn frozen_time_accounting_is_exact(
        cost in 1u64..=50,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = TokenBucketConfig::builder()
                .max_tokens(1000.0)
                .refill_per_minute(60.0)
                .build();

            let first = limiter.consume("k", cost as f64);
            let second = limiter.consume("k", cost as f64);
            prop_assert!(first.allowed && second.allowed);
            prop_assert_eq!(first.remaining - second.remaining, cost);
            Ok(())
        })?;
    }

    /// Property: draining a bucket and then waiting exactly
    /// `max_tokens / refill_per_second` refills to capacity, capped.
    #[test]
    fn refill_converges_to_capacity(
        max_tokens in 1u64..=600,
    ) {
        let rt = paused_runtime();
        rt.block_on(async {
            let limiter = TokenBucketConfig::builder()
                .max_tokens(max_tokens as f64)
                .refill_per_minute(60.0) // 1 token per second
                .build();

            limiter.consume("k", max_tokens as f64);

            // Waiting twice as long must still cap at capacity.
            tokio::time::advance(Duration::from_secs(max_tokens * 2)).await;
            let state = limiter.bucket_state("k").expect("bucket exists");
            prop_assert_eq!(state.tokens, max_tokens as f64);
            Ok(())
        })?;
    }
}
