//! Error types for the connection pool.

use callguard_core::GuardError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by pooled execution.
///
/// The wrapped operation's own error propagates unchanged as
/// [`PoolError::Inner`]; the other variants are pool-level outcomes a
/// caller can distinguish from a "ran and failed" error.
#[derive(Debug, Error)]
pub enum PoolError<E> {
    /// The per-call timeout fired before the operation settled. The
    /// operation itself may still be running detached.
    #[error("pooled call timed out after {timeout:?}")]
    Timeout {
        /// The timeout that fired.
        timeout: Duration,
    },

    /// The request was cancelled while still queued.
    #[error("pooled call aborted while queued")]
    Aborted,

    /// The queue was explicitly cleared while the request was waiting.
    #[error("pooled call dropped by queue clear")]
    QueueCleared,

    /// The shared circuit breaker rejected the call.
    #[error("circuit open, retry in {retry_after:?}")]
    CircuitOpen {
        /// Remaining cooldown before the breaker admits a trial call.
        retry_after: Duration,
    },

    /// The wrapped operation itself failed.
    #[error("operation error: {0}")]
    Inner(E),
}

impl<E> PoolError<E> {
    /// Returns the wrapped operation's error, if that is what this is.
    pub fn into_inner(self) -> Option<E> {
        match self {
            PoolError::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Whether this is a pool-level rejection rather than an operation
    /// failure.
    pub fn is_pool_level(&self) -> bool {
        !matches!(self, PoolError::Inner(_))
    }
}

impl<E> From<PoolError<E>> for GuardError<E> {
    fn from(err: PoolError<E>) -> Self {
        match err {
            PoolError::Timeout { timeout } => GuardError::Timeout { timeout },
            PoolError::Aborted => GuardError::Aborted,
            PoolError::QueueCleared => GuardError::QueueCleared,
            PoolError::CircuitOpen { retry_after } => GuardError::CircuitOpen { retry_after },
            PoolError::Inner(e) => GuardError::Application(e),
        }
    }
}
