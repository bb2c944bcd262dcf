//! A convenience wrapper chaining the three guards.

use callguard_circuitbreaker::ClassifyError;
use callguard_core::GuardError;
use callguard_pool::{ConnectionPool, ExecuteOptions, PoolConfig};
use callguard_ratelimiter::TokenBucketLimiter;
use std::future::Future;
use std::sync::Arc;

/// Binds a rate limiter and a pool (with its breaker, if configured)
/// behind one call surface, so call sites get the full protection chain
/// without threading three instances around.
///
/// The admission order is rate limiter first, then pool slot, then the
/// pool's circuit breaker around the operation itself. A rate-limited
/// call is rejected before it can occupy a slot.
#[derive(Clone)]
pub struct GuardedClient {
    limiter: Option<Arc<TokenBucketLimiter>>,
    pool: ConnectionPool,
}

impl GuardedClient {
    /// Creates a new client builder.
    pub fn builder() -> GuardedClientBuilder {
        GuardedClientBuilder::new()
    }

    /// Runs `op` through the full chain under `key`'s rate budget.
    pub async fn call<F, Fut, T, E>(
        &self,
        key: &str,
        cost: f64,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: ClassifyError + Send + 'static,
    {
        self.call_with(key, cost, ExecuteOptions::new(), op).await
    }

    /// Like [`call`](Self::call) with explicit pool options.
    pub async fn call_with<F, Fut, T, E>(
        &self,
        key: &str,
        cost: f64,
        options: ExecuteOptions,
        op: F,
    ) -> Result<T, GuardError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: ClassifyError + Send + 'static,
    {
        if let Some(limiter) = &self.limiter {
            limiter.check(key, cost).map_err(GuardError::from)?;
        }
        self.pool
            .execute_with(options, op)
            .await
            .map_err(GuardError::from)
    }

    /// The underlying pool, for stats and queue management.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// The underlying rate limiter, if one is configured.
    pub fn rate_limiter(&self) -> Option<&TokenBucketLimiter> {
        self.limiter.as_deref()
    }
}

/// Builder for [`GuardedClient`].
#[derive(Default)]
pub struct GuardedClientBuilder {
    limiter: Option<Arc<TokenBucketLimiter>>,
    pool: Option<ConnectionPool>,
}

impl GuardedClientBuilder {
    /// Creates a new builder with no limiter and a default pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies a per-key rate budget ahead of the pool.
    pub fn rate_limiter(mut self, limiter: impl Into<Arc<TokenBucketLimiter>>) -> Self {
        self.limiter = Some(limiter.into());
        self
    }

    /// Uses the given pool. Defaults to a pool with default
    /// configuration when not set.
    pub fn pool(mut self, pool: ConnectionPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Builds the client.
    pub fn build(self) -> GuardedClient {
        GuardedClient {
            limiter: self.limiter,
            pool: self.pool.unwrap_or_else(|| PoolConfig::builder().build()),
        }
    }
}
