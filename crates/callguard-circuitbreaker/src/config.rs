//! Configuration for the circuit breaker.

use crate::circuit::CircuitState;
use crate::classify::ErrorClass;
use crate::events::BreakerEvent;
use crate::CircuitBreaker;
use callguard_core::events::EventListeners;
use std::time::Duration;

/// Configuration for a [`CircuitBreaker`].
#[derive(Clone)]
pub struct BreakerConfig {
    /// Failures counted before the circuit opens.
    pub(crate) failure_threshold: u32,
    /// How long the circuit stays open before a half-open trial.
    pub(crate) open_timeout: Duration,
    /// Quiet period after which a closed circuit's failure count decays.
    pub(crate) reset_timeout: Duration,
    /// Cadence of the background self-heal monitor; `None` disables it.
    pub(crate) monitor_interval: Option<Duration>,
    /// Name of this breaker instance, for observability.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> BreakerConfigBuilder {
        BreakerConfigBuilder::new()
    }
}

/// Builder for [`BreakerConfig`].
pub struct BreakerConfigBuilder {
    failure_threshold: u32,
    open_timeout: Duration,
    reset_timeout: Duration,
    monitor_interval: Option<Duration>,
    name: String,
    event_listeners: EventListeners<BreakerEvent>,
}

impl BreakerConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            reset_timeout: Duration::from_secs(60),
            monitor_interval: Some(Duration::from_secs(1)),
            name: "circuitbreaker".to_string(),
            event_listeners: EventListeners::new(),
        }
    }

    /// Sets the failure count at which the circuit opens.
    ///
    /// Default: 5
    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Sets how long the circuit stays open before allowing a half-open
    /// trial call.
    ///
    /// Default: 30 seconds
    pub fn open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    /// Sets the quiet period after which a closed circuit forgets
    /// accumulated failures.
    ///
    /// Default: 60 seconds
    pub fn reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }

    /// Sets the cadence of the background monitor that drives time-based
    /// transitions even when no calls arrive. `None` disables the monitor;
    /// transitions then only happen on call boundaries.
    ///
    /// Default: 1 second
    pub fn monitor_interval(mut self, interval: Option<Duration>) -> Self {
        self.monitor_interval = interval;
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `circuitbreaker`
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback invoked on every state transition.
    ///
    /// # Callback Signature
    /// `Fn(CircuitState, CircuitState)` - the state being entered, then the
    /// state being left.
    pub fn on_state_change<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let BreakerEvent::StateTransition { from, to, .. } = event {
                f(*to, *from);
            }
        });
        self
    }

    /// Registers a callback invoked when a call is rejected.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - the remaining cooldown before the next trial.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let BreakerEvent::CallRejected { retry_after, .. } = event {
                f(*retry_after);
            }
        });
        self
    }

    /// Registers a callback invoked when a guarded call fails.
    ///
    /// # Callback Signature
    /// `Fn(ErrorClass)` - the recorded failure class.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(ErrorClass) + Send + Sync + 'static,
    {
        self.event_listeners.add_fn(move |event| {
            if let BreakerEvent::FailureRecorded { class, .. } = event {
                f(*class);
            }
        });
        self
    }

    /// Builds the breaker and starts its background monitor.
    ///
    /// Must be called within a Tokio runtime when the monitor is enabled
    /// (the default), since the monitor is a spawned task.
    pub fn build(self) -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: self.failure_threshold,
            open_timeout: self.open_timeout,
            reset_timeout: self.reset_timeout,
            monitor_interval: self.monitor_interval,
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}

impl Default for BreakerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
