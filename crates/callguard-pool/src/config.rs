//! Configuration for the connection pool.

use crate::environment::HostEnvironment;
use crate::events::PoolEvent;
use crate::queue::Priority;
use crate::ConnectionPool;
use callguard_circuitbreaker::CircuitBreaker;
use callguard_core::events::EventListeners;
use std::time::Duration;
use tokio::sync::watch;

/// Configuration for a [`ConnectionPool`].
#[derive(Clone)]
pub struct PoolConfig {
    /// Maximum operations in flight at once.
    pub(crate) max_concurrent: usize,
    /// Per-call timeout unless overridden per call.
    pub(crate) default_timeout: Duration,
    /// Breaker every non-bypassed call is routed through, if any.
    pub(crate) breaker: Option<CircuitBreaker>,
    /// Host visibility/connectivity signal, if any.
    pub(crate) environment: Option<watch::Receiver<HostEnvironment>>,
    /// Name of this pool instance, for observability.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<PoolEvent>,
}

impl PoolConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }
}

/// Builder for [`PoolConfig`].
pub struct PoolConfigBuilder {
    max_concurrent: usize,
    default_timeout: Duration,
    breaker: Option<CircuitBreaker>,
    environment: Option<watch::Receiver<HostEnvironment>>,
    name: String,
    event_listeners: EventListeners<PoolEvent>,
}

impl PoolConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            max_concurrent: 6,
            default_timeout: Duration::from_secs(30),
            breaker: None,
            environment: None,
            name: "pool".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the maximum number of operations in flight at once.
    ///
    /// Default: 6, matching common per-origin browser connection limits.
    pub fn max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Sets the per-call timeout applied when a call does not override it.
    ///
    /// Default: 30 seconds
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Routes every non-bypassed call through the given circuit breaker.
    /// The breaker is shared; clones observe the same circuit.
    pub fn circuit_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Some(breaker);
        self
    }

    /// Subscribes the pool to a host environment signal. While the host
    /// is not visible, queued work stays queued; a connectivity regain
    /// triggers an immediate drain attempt.
    pub fn environment(mut self, signal: watch::Receiver<HostEnvironment>) -> Self {
        self.environment = Some(signal);
        self
    }

    /// Give this pool a human-readable name for observability.
    ///
    /// Default: `pool`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked when a request is queued.
    ///
    /// # Callback Signature
    /// `Fn(Priority, usize)` - the request's priority and the queue depth
    /// after insertion.
    pub fn on_queued<F>(mut self, f: F) -> Self
    where
        F: Fn(Priority, usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let PoolEvent::Queued {
                priority, depth, ..
            } = event
            {
                f(*priority, *depth);
            }
        });
        self
    }

    /// Registers a callback invoked when a request is dispatched.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - how long the request waited in the queue; zero
    /// for immediate admission.
    pub fn on_dispatched<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let PoolEvent::Dispatched { waited, .. } = event {
                f(*waited);
            }
        });
        self
    }

    /// Registers a callback invoked when a pooled call times out.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - the timeout that fired.
    pub fn on_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let PoolEvent::TimedOut { timeout, .. } = event {
                f(*timeout);
            }
        });
        self
    }

    /// Registers a callback invoked when the queue is cleared.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - how many queued requests were dropped.
    pub fn on_queue_cleared<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let PoolEvent::QueueCleared { cleared, .. } = event {
                f(*cleared);
            }
        });
        self
    }

    /// Builds the pool.
    ///
    /// Must be called within a Tokio runtime when an environment signal
    /// is configured, since the subscription is a spawned task.
    pub fn build(self) -> ConnectionPool {
        assert!(self.max_concurrent > 0, "max_concurrent must be at least 1");
        ConnectionPool::new(PoolConfig {
            max_concurrent: self.max_concurrent,
            default_timeout: self.default_timeout,
            breaker: self.breaker,
            environment: self.environment,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for PoolConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
