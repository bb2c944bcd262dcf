//! Unified error type for composed guard stacks.
//!
//! Call sites that chain the rate limiter, circuit breaker and connection
//! pool would otherwise juggle three error enums. [`GuardError`] folds the
//! guard-level rejections into one type while keeping the wrapped
//! operation's own error intact in the [`GuardError::Application`] variant,
//! so callers can still pattern-match on the original error.
//!
//! The individual guard crates provide `From` conversions into this type.

use std::time::Duration;
use thiserror::Error;

/// Any rejection a guard stack can produce, or the operation's own error.
///
/// `E` is the error type of the guarded operation; it passes through
/// unchanged.
#[derive(Debug, Clone, Error)]
pub enum GuardError<E> {
    /// The rate limiter denied admission.
    #[error("rate limited")]
    RateLimited {
        /// Time until enough tokens accumulate, if known.
        retry_after: Option<Duration>,
    },

    /// The circuit breaker is open.
    #[error("circuit open, closes in {retry_after:?}")]
    CircuitOpen {
        /// Remaining cooldown before the next half-open trial.
        retry_after: Duration,
    },

    /// The connection pool's per-call timeout fired.
    #[error("guarded call timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was raced against the call.
        timeout: Duration,
    },

    /// A still-queued request was cancelled via its abort signal.
    #[error("queued request aborted")]
    Aborted,

    /// A still-queued request was rejected by an explicit queue clear.
    #[error("queue cleared before dispatch")]
    QueueCleared,

    /// The wrapped operation ran and failed with its own error.
    #[error("application error: {0}")]
    Application(E),
}

impl<E> GuardError<E> {
    /// True for the rate limiter's admission rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, GuardError::RateLimited { .. })
    }

    /// True for the circuit breaker's open-circuit rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, GuardError::CircuitOpen { .. })
    }

    /// True for the pool's timeout race firing.
    pub fn is_timeout(&self) -> bool {
        matches!(self, GuardError::Timeout { .. })
    }

    /// True when the operation itself ran and failed.
    pub fn is_application(&self) -> bool {
        matches!(self, GuardError::Application(_))
    }

    /// Suggested wait before retrying, where one applies.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GuardError::RateLimited { retry_after } => *retry_after,
            GuardError::CircuitOpen { retry_after } => Some(*retry_after),
            _ => None,
        }
    }

    /// Extracts the operation's own error, if present.
    pub fn into_application(self) -> Option<E> {
        match self {
            GuardError::Application(e) => Some(e),
            _ => None,
        }
    }

    /// Maps the operation's error type, leaving guard rejections as-is.
    pub fn map_application<F, T>(self, f: F) -> GuardError<T>
    where
        F: FnOnce(E) -> T,
    {
        match self {
            GuardError::RateLimited { retry_after } => GuardError::RateLimited { retry_after },
            GuardError::CircuitOpen { retry_after } => GuardError::CircuitOpen { retry_after },
            GuardError::Timeout { timeout } => GuardError::Timeout { timeout },
            GuardError::Aborted => GuardError::Aborted,
            GuardError::QueueCleared => GuardError::QueueCleared,
            GuardError::Application(e) => GuardError::Application(f(e)),
        }
    }
}
