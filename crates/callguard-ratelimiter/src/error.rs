//! Error form of an admission rejection.

use callguard_core::GuardError;
use std::time::Duration;
use thiserror::Error;

/// Returned by [`check`](crate::TokenBucketLimiter::check) when the
/// requested cost cannot be granted.
///
/// An admission rejection is ordinarily a plain
/// [`Decision`](crate::Decision) value, not an error; this type exists for
/// `?`-style call sites.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("rate limited, retry after {retry_after:?}")]
pub struct RateLimitedError {
    /// Time until enough tokens accumulate.
    pub retry_after: Duration,
}

impl<E> From<RateLimitedError> for GuardError<E> {
    fn from(err: RateLimitedError) -> Self {
        GuardError::RateLimited {
            retry_after: Some(err.retry_after),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_retry_after() {
        let err = RateLimitedError {
            retry_after: Duration::from_secs(7),
        };
        assert!(err.to_string().contains("7s"));
    }

    #[test]
    fn converts_into_guard_error() {
        let err = RateLimitedError {
            retry_after: Duration::from_secs(2),
        };
        let unified: GuardError<()> = err.into();
        assert!(unified.is_rate_limited());
        assert_eq!(unified.retry_after(), Some(Duration::from_secs(2)));
    }
}
