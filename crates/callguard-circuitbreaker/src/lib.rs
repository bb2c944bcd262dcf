//! Circuit breaker for guarded client calls.
//!
//! A circuit breaker watches an arbitrary async operation for failures and
//! temporarily stops calling it once failures accumulate, so a degraded
//! backend gets cooldown time instead of a retry storm.
//!
//! ## States
//! - **Closed**: normal operation, all calls pass through
//! - **Open**: calls are rejected (or served by a fallback) until the open
//!   timeout elapses
//! - **Half-open**: exactly one trial call probes recovery; success closes
//!   the circuit, failure reopens it and restarts the cooldown
//!
//! ## Usage
//!
//! ```rust
//! use callguard_circuitbreaker::{BreakerConfig, BreakerError, ClassifyError};
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
//!     .name("api")
//!     .build();
//!
//! match breaker.execute(|| async { Ok::<_, FetchError>("body") }).await {
//!     Ok(body) => println!("{body}"),
//!     Err(BreakerError::Open { retry_after }) => {
//!         println!("circuit open, retry in {retry_after:?}");
//!     }
//!     Err(BreakerError::Inner(_)) => println!("call itself failed"),
//! }
//! # }
//! ```
//!
//! ## Fallbacks and bypass
//!
//! ```rust
//! # use callguard_circuitbreaker::{BreakerConfig, ClassifyError};
//! # #[derive(Debug)]
//! # struct FetchError;
//! # impl ClassifyError for FetchError {}
//! # async fn example() {
//! let breaker = BreakerConfig::builder().build();
//!
//! // Serve a degraded-but-valid result while the circuit is open.
//! let cached = breaker
//!     .execute_with_fallback(
//!         || async { Ok::<_, FetchError>("fresh") },
//!         || async { Ok::<_, FetchError>("cached") },
//!     )
//!     .await;
//!
//! // Critical paths that must never be blocked still feed the stats.
//! let _ = breaker
//!     .execute_unchecked(|| async { Ok::<_, FetchError>(()) })
//!     .await;
//! # }
//! ```
//!
//! ## Failure classification
//!
//! Implement [`ClassifyError`] on the operation's error type to tag
//! failures with an [`ErrorClass`]. A
//! [`ResourceExhaustion`](ErrorClass::ResourceExhaustion) error opens the
//! circuit immediately; other classes count one failure each.
//!
//! ## Self-healing
//!
//! A background monitor tick (default every second) drives the time-based
//! transitions, so a breaker left idle while open still moves to half-open
//! on schedule. The monitor stops when the breaker is dropped or
//! [`shutdown`](CircuitBreaker::shutdown) is called.
//!
//! ## Feature flags
//! - `tracing`: transition and failure logging via the `tracing` crate
//! - `metrics`: call/transition counters via the `metrics` crate

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub use circuit::{BreakerStats, CircuitState};
pub use classify::{ClassifyError, ErrorClass};
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use error::BreakerError;
pub use events::BreakerEvent;

mod circuit;
mod classify;
mod config;
mod error;
mod events;
mod monitor;

use circuit::Circuit;
use monitor::Monitor;

pub(crate) struct Shared {
    pub(crate) config: BreakerConfig,
    pub(crate) circuit: Mutex<Circuit>,
}

/// A three-state failure detector wrapping arbitrary async operations.
///
/// Cheap to clone; clones share the same circuit. Typically constructed
/// once at application start and passed by reference to whatever performs
/// guarded calls.
pub struct CircuitBreaker {
    shared: Arc<Shared>,
    state_atomic: Arc<AtomicU8>,
    monitor: Arc<Monitor>,
}

impl CircuitBreaker {
    pub(crate) fn new(config: BreakerConfig) -> Self {
        let state_atomic = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        let shared = Arc::new(Shared {
            circuit: Mutex::new(Circuit::new(Arc::clone(&state_atomic))),
            config,
        });
        let monitor = match shared.config.monitor_interval {
            Some(period) => Monitor::spawn(&shared, period),
            None => Monitor::disabled(),
        };
        Self {
            shared,
            state_atomic,
            monitor: Arc::new(monitor),
        }
    }

    /// Runs `op` under the breaker's admission check.
    ///
    /// Rejected calls fail with [`BreakerError::Open`] carrying the
    /// remaining cooldown. The operation's own error propagates unchanged
    /// as [`BreakerError::Inner`].
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyError,
    {
        match self.acquire() {
            Ok(trial) => self
                .run_and_record(op, trial)
                .await
                .map_err(BreakerError::Inner),
            Err(retry_after) => Err(BreakerError::Open { retry_after }),
        }
    }

    /// Like [`execute`](Self::execute), but a blocked call runs `fallback`
    /// instead of failing, returning its (degraded but valid) result.
    pub async fn execute_with_fallback<F, Fut, FB, FbFut, T, E>(
        &self,
        op: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> FbFut,
        FbFut: Future<Output = Result<T, E>>,
        E: ClassifyError,
    {
        match self.acquire() {
            Ok(trial) => self
                .run_and_record(op, trial)
                .await
                .map_err(BreakerError::Inner),
            Err(_) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(breaker = %self.shared.config.name, "serving fallback");
                fallback().await.map_err(BreakerError::Inner)
            }
        }
    }

    /// Runs `op` without the admission check.
    ///
    /// The call still counts toward the request total and its outcome
    /// still feeds the failure stats; it just can never be blocked. For
    /// critical paths only.
    pub async fn execute_unchecked<F, Fut, T, E>(&self, op: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyError,
    {
        self.shared.circuit.lock().unwrap().note_request();
        self.run_and_record(op, false).await
    }

    /// Returns whether the circuit is currently open. Lock-free.
    pub fn is_open(&self) -> bool {
        self.state() == CircuitState::Open
    }

    /// Returns the current state without taking the circuit lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state_atomic.load(Ordering::Acquire))
    }

    /// Remaining cooldown while open; `None` in other states.
    pub fn time_until_close(&self) -> Option<Duration> {
        let circuit = self.shared.circuit.lock().unwrap();
        (circuit.state() == CircuitState::Open)
            .then(|| circuit.remaining_cooldown(&self.shared.config, Instant::now()))
    }

    /// Point-in-time snapshot of the breaker's counters.
    pub fn stats(&self) -> BreakerStats {
        self.shared
            .circuit
            .lock()
            .unwrap()
            .stats(&self.shared.config, Instant::now())
    }

    /// Forces the circuit closed with zero failures.
    pub fn reset(&self) {
        self.shared.circuit.lock().unwrap().reset(&self.shared.config);
    }

    /// Forces the circuit open immediately, cooldown clock restarted.
    /// For externally detected outages.
    pub fn trip(&self) {
        self.shared
            .circuit
            .lock()
            .unwrap()
            .trip(&self.shared.config, Instant::now());
    }

    /// Stops the background monitor. The breaker stays usable; time-based
    /// transitions then only happen on call boundaries.
    pub fn shutdown(&self) {
        self.monitor.shutdown();
    }

    /// `Ok(true)` means this call holds the half-open trial slot.
    fn acquire(&self) -> Result<bool, Duration> {
        let mut circuit = self.shared.circuit.lock().unwrap();
        circuit.note_request();
        circuit.try_acquire(&self.shared.config, Instant::now())
    }

    async fn run_and_record<F, Fut, T, E>(&self, op: F, trial: bool) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: ClassifyError,
    {
        // If this future is dropped (or `op` panics) before the outcome is
        // recorded, an unreleased trial slot would reject every later call;
        // the guard hands the slot back instead.
        let mut guard = TrialGuard {
            shared: &self.shared,
            armed: trial,
        };
        let result = op().await;
        guard.armed = false;
        let mut circuit = self.shared.circuit.lock().unwrap();
        match &result {
            Ok(_) => circuit.record_success(&self.shared.config, Instant::now()),
            Err(e) => circuit.record_failure(&self.shared.config, e.error_class(), Instant::now()),
        }
        result
    }
}

struct TrialGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.circuit.lock().unwrap().abandon_trial();
        }
    }
}

impl Clone for CircuitBreaker {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            state_atomic: Arc::clone(&self.state_atomic),
            monitor: Arc::clone(&self.monitor),
        }
    }
}
