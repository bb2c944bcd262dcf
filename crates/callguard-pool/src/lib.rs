//! Bounded connection pool with priority queueing.
//!
//! Caps concurrent in-flight async operations the way a browser caps
//! per-origin connections, queues the overflow in priority order, and
//! releases queued work as slots free.
//!
//! ## Usage
//!
//! ```rust
//! use callguard_pool::{ExecuteOptions, PoolConfig, Priority};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let pool = PoolConfig::builder()
//!     .max_concurrent(4)
//!     .default_timeout(Duration::from_secs(30))
//!     .name("api")
//!     .build();
//!
//! // Runs immediately if a slot is free, otherwise queues.
//! let body = pool
//!     .execute(|| async { Ok::<_, std::io::Error>("body") })
//!     .await;
//!
//! // Jump the queue for latency-sensitive work.
//! let urgent = pool
//!     .execute_with(ExecuteOptions::new().priority(Priority::High), || async {
//!         Ok::<_, std::io::Error>("urgent")
//!     })
//!     .await;
//! # let _ = (body, urgent);
//! # }
//! ```
//!
//! ## Queue ordering
//!
//! High priority inserts at the queue front and low at the back. Normal
//! inserts at the current midpoint, so a fresh normal request does not
//! sit behind an arbitrarily long run of older normal requests while
//! high-priority work still goes first. Within one tier of a deep queue,
//! dispatch order follows insertion order.
//!
//! ## Timeouts and cancellation
//!
//! Every pooled call races a per-call timeout (default 30s). A timeout
//! fails the call and frees the slot but leaves the operation running
//! detached; the pool never force-cancels work it has dispatched. A
//! [`CancellationToken`](tokio_util::sync::CancellationToken) attached
//! via [`ExecuteOptions::cancel`] only applies while the request is
//! still queued.
//!
//! ## Breaker routing
//!
//! A pool built with [`circuit_breaker`](PoolConfigBuilder::circuit_breaker)
//! routes every non-bypassed call through that breaker, so a failing
//! backend trips one shared circuit no matter which call site hit it.
//!
//! ## Feature flags
//! - `tracing`: queue/dispatch/timeout logging via the `tracing` crate
//! - `metrics`: request counters and wait-time histogram via the
//!   `metrics` crate

mod config;
mod environment;
mod error;
mod events;
mod pool;
mod queue;

pub use config::{PoolConfig, PoolConfigBuilder};
pub use environment::HostEnvironment;
pub use error::PoolError;
pub use events::PoolEvent;
pub use pool::{ConnectionPool, ExecuteOptions, PoolStats};
pub use queue::Priority;

pub use tokio_util::sync::CancellationToken;

