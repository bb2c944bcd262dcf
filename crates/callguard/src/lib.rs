//! # callguard
//!
//! Client-side resource protection primitives: a keyed token-bucket
//! rate limiter, a circuit breaker, and a bounded connection pool, plus
//! a [`GuardedClient`] that chains all three behind one call surface.
//!
//! Each primitive is an explicit instance constructed once at
//! application start and passed by reference to whatever needs it.
//! There are no process-wide globals.
//!
//! ## Quick start
//!
//! ```rust
//! use callguard::{
//!     BreakerConfig, GuardedClient, PoolConfig, TokenBucketConfig,
//! };
//! use callguard::ClassifyError;
//! use std::time::Duration;
//!
//! #[derive(Debug)]
//! struct FetchError;
//! impl ClassifyError for FetchError {}
//!
//! # async fn example() {
//! let breaker = BreakerConfig::builder()
//!     .failure_threshold(5)
//!     .open_timeout(Duration::from_secs(30))
//!     .build();
//!
//! let pool = PoolConfig::builder()
//!     .max_concurrent(6)
//!     .circuit_breaker(breaker)
//!     .build();
//!
//! let client = GuardedClient::builder()
//!     .rate_limiter(
//!         TokenBucketConfig::builder()
//!             .max_tokens(10.0)
//!             .refill_per_minute(60.0)
//!             .build(),
//!     )
//!     .pool(pool)
//!     .build();
//!
//! match client
//!     .call("user-42", 1.0, || async { Ok::<_, FetchError>("body") })
//!     .await
//! {
//!     Ok(body) => println!("{body}"),
//!     Err(err) => {
//!         if let Some(wait) = err.retry_after() {
//!             println!("try again in {wait:?}");
//!         }
//!     }
//! }
//! # }
//! ```
//!
//! The primitives are also usable on their own; see
//! [`callguard_ratelimiter`], [`callguard_circuitbreaker`], and
//! [`callguard_pool`].

mod client;

pub use client::{GuardedClient, GuardedClientBuilder};

pub use callguard_core::{EventListener, EventListeners, GuardError, GuardEvent};

pub use callguard_ratelimiter::{
    BucketState, Decision, RateLimitedError, RateLimiterEvent, TokenBucketConfig,
    TokenBucketConfigBuilder, TokenBucketLimiter,
};

pub use callguard_circuitbreaker::{
    BreakerConfig, BreakerConfigBuilder, BreakerError, BreakerEvent, BreakerStats,
    CircuitBreaker, CircuitState, ClassifyError, ErrorClass,
};

pub use callguard_pool::{
    CancellationToken, ConnectionPool, ExecuteOptions, HostEnvironment, PoolConfig,
    PoolConfigBuilder, PoolError, PoolEvent, PoolStats, Priority,
};
