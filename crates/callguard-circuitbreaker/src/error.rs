use callguard_core::GuardError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by [`CircuitBreaker::execute`](crate::CircuitBreaker::execute).
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the call was not attempted.
    #[error("circuit is open; call not permitted (retry in {retry_after:?})")]
    Open {
        /// Remaining cooldown before the next half-open trial.
        retry_after: Duration,
    },

    /// The guarded operation ran and failed with its own error, which
    /// passes through unchanged.
    #[error("inner operation error: {0}")]
    Inner(E),
}

impl<E> BreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_open(&self) -> bool {
        matches!(self, BreakerError::Open { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            BreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl<E> From<BreakerError<E>> for GuardError<E> {
    fn from(err: BreakerError<E>) -> Self {
        match err {
            BreakerError::Open { retry_after } => GuardError::CircuitOpen { retry_after },
            BreakerError::Inner(e) => GuardError::Application(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn helpers_distinguish_variants() {
        let err: BreakerError<&str> = BreakerError::Open {
            retry_after: Duration::from_secs(12),
        };
        assert!(err.is_open());
        assert_eq!(err.into_inner(), None);

        let err = BreakerError::Inner("boom");
        assert!(!err.is_open());
        assert_eq!(err.into_inner(), Some("boom"));
    }

    #[test]
    fn converts_into_guard_error() {
        let err: BreakerError<&str> = BreakerError::Open {
            retry_after: Duration::from_secs(5),
        };
        let unified: GuardError<&str> = err.into();
        assert!(unified.is_circuit_open());
        assert_eq!(unified.retry_after(), Some(Duration::from_secs(5)));
    }
}
