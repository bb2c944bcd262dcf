//! Property-based tests for the callguard primitives.

pub mod circuit_breaker;
pub mod pool;
pub mod rate_limiter;

use tokio::runtime::Runtime;

/// A current-thread runtime with the clock paused, so no wall time
/// elapses between operations unless a test advances it explicitly.
pub fn paused_runtime() -> Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("runtime")
}
