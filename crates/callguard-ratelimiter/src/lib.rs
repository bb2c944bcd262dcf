//! Keyed token-bucket rate limiting.
//!
//! A [`TokenBucketLimiter`] decides, per key (a user id, an IP, an origin),
//! whether a requested number of tokens can be consumed right now, and if
//! not, how long until they can. Buckets refill lazily on access; there is
//! no background timer, and the arithmetic is exact regardless of call
//! cadence.
//!
//! ## Usage
//!
//! ```rust
//! use callguard_ratelimiter::TokenBucketConfig;
//!
//! let limiter = TokenBucketConfig::builder()
//!     .max_tokens(10.0)
//!     .refill_per_minute(60.0)
//!     .name("api")
//!     .build();
//!
//! let decision = limiter.consume("user-1", 1.0);
//! if !decision.allowed {
//!     // surface decision.retry_after to the caller, e.g. as Retry-After
//! }
//! ```
//!
//! ## Memory bound
//!
//! Unbounded key spaces (per-IP buckets) cannot exhaust memory: bucket
//! creation past `max_buckets` evicts the oldest buckets down to
//! `evict_to`, and buckets idle past `idle_expiry` are treated as absent on
//! their next access.
//!
//! ## Feature flags
//! - `metrics`: decision counters and bucket-population gauge via the
//!   `metrics` crate
//! - `tracing`: rejection/eviction logging via the `tracing` crate

mod bucket;
mod config;
mod error;
mod events;
mod limiter;

pub use bucket::{BucketState, Decision};
pub use config::{TokenBucketConfig, TokenBucketConfigBuilder};
pub use error::RateLimitedError;
pub use events::RateLimiterEvent;
pub use limiter::TokenBucketLimiter;
