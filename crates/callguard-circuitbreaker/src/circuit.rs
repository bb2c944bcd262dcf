//! The breaker's state machine, separated from the async facade so the
//! transitions can be unit tested with plain method calls.

use crate::classify::ErrorClass;
use crate::config::BreakerConfig;
use crate::events::BreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// The three states of the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Normal operation; all calls pass through.
    Closed = 0,
    /// Calls are rejected until the open timeout elapses.
    Open = 1,
    /// One trial call is allowed to probe recovery.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable label for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

/// Point-in-time snapshot of the breaker's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct BreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Consecutive failures counted toward the threshold; zeroed by any
    /// success, a close, or the quiet-period decay.
    pub failures: u32,
    /// Current failure streak; zeroed by any success.
    pub consecutive_failures: u32,
    /// Current success streak; zeroed by any failure.
    pub consecutive_successes: u32,
    /// All requests ever submitted, including rejected and bypassed ones.
    pub total_requests: u64,
    /// All recorded failures. Never reset.
    pub total_failures: u64,
    /// All recorded successes. Never reset.
    pub total_successes: u64,
    /// When the most recent failure was recorded.
    pub last_failure_at: Option<Instant>,
    /// When the most recent success was recorded.
    pub last_success_at: Option<Instant>,
    /// Remaining cooldown while open; `None` otherwise.
    pub time_until_close: Option<Duration>,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    failures: u32,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
    last_success_at: Option<Instant>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    /// Set while the single half-open trial call is outstanding.
    trial_in_flight: bool,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        Self {
            state: CircuitState::Closed,
            state_atomic,
            failures: 0,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_failure_at: None,
            last_success_at: None,
            total_requests: 0,
            total_failures: 0,
            total_successes: 0,
            trial_in_flight: false,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Counts a submitted request. Every `execute` path goes through here,
    /// including rejected and bypassed calls.
    pub(crate) fn note_request(&mut self) {
        self.total_requests += 1;
    }

    /// Decides whether a call may proceed right now.
    ///
    /// `Ok(true)` means the call holds the single half-open trial slot
    /// and must settle (or abandon) it. Returns the remaining cooldown on
    /// rejection. Also performs the two time-based transitions so a call
    /// arriving after the cooldown acts as the half-open trial.
    pub(crate) fn try_acquire(
        &mut self,
        config: &BreakerConfig,
        now: Instant,
    ) -> Result<bool, Duration> {
        match self.state {
            CircuitState::Closed => {
                self.decay_failures(config, now);
                self.permit(config);
                Ok(false)
            }
            CircuitState::Open => {
                let remaining = self.remaining_cooldown(config, now);
                if remaining == Duration::ZERO {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.trial_in_flight = true;
                    self.permit(config);
                    Ok(true)
                } else {
                    self.reject(config, remaining);
                    Err(remaining)
                }
            }
            CircuitState::HalfOpen => {
                if self.trial_in_flight {
                    // The single trial slot is taken; fail fast.
                    self.reject(config, Duration::ZERO);
                    Err(Duration::ZERO)
                } else {
                    self.trial_in_flight = true;
                    self.permit(config);
                    Ok(true)
                }
            }
        }
    }

    /// Releases the half-open trial slot without recording an outcome,
    /// for a trial call whose future was dropped before it settled. The
    /// next caller becomes the trial instead of being rejected forever.
    pub(crate) fn abandon_trial(&mut self) {
        if self.state == CircuitState::HalfOpen {
            self.trial_in_flight = false;
        }
    }

    pub(crate) fn record_success(&mut self, config: &BreakerConfig, now: Instant) {
        self.total_successes += 1;
        self.consecutive_successes += 1;
        self.consecutive_failures = 0;
        // A success ends the failure streak; only consecutive failures
        // count toward the threshold.
        self.failures = 0;
        self.last_success_at = Some(now);

        config.event_listeners.emit(&BreakerEvent::SuccessRecorded {
            breaker_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => config.name.clone(), "outcome" => "success")
            .increment(1);

        if self.state == CircuitState::HalfOpen {
            // The trial call came back healthy.
            self.transition_to(CircuitState::Closed, config);
        }
    }

    pub(crate) fn record_failure(
        &mut self,
        config: &BreakerConfig,
        class: ErrorClass,
        now: Instant,
    ) {
        self.total_failures += 1;
        self.consecutive_failures += 1;
        self.consecutive_successes = 0;
        self.last_failure_at = Some(now);

        // A single resource-exhaustion signal counts as much as a full run
        // of ordinary failures.
        if class == ErrorClass::ResourceExhaustion {
            self.failures = config.failure_threshold;
        } else {
            self.failures += 1;
        }

        config.event_listeners.emit(&BreakerEvent::FailureRecorded {
            breaker_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
            class,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(
            breaker = %config.name,
            class = class.as_str(),
            failures = self.failures,
            "failure recorded"
        );

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => config.name.clone(), "outcome" => "failure", "class" => class.as_str())
            .increment(1);

        match self.state {
            CircuitState::HalfOpen => {
                // Trial failed; restart the cooldown clock.
                self.transition_to(CircuitState::Open, config);
            }
            CircuitState::Closed if self.failures >= config.failure_threshold => {
                self.transition_to(CircuitState::Open, config);
            }
            _ => {}
        }
    }

    /// Time-based transitions, driven by the background monitor so an idle
    /// breaker still self-heals.
    pub(crate) fn check_timers(&mut self, config: &BreakerConfig, now: Instant) {
        match self.state {
            CircuitState::Open => {
                if self.remaining_cooldown(config, now) == Duration::ZERO {
                    self.transition_to(CircuitState::HalfOpen, config);
                }
            }
            CircuitState::Closed => self.decay_failures(config, now),
            CircuitState::HalfOpen => {}
        }
    }

    /// Forces the circuit open with the failure clock restarted at `now`.
    pub(crate) fn trip(&mut self, config: &BreakerConfig, now: Instant) {
        self.last_failure_at = Some(now);
        self.failures = config.failure_threshold;
        self.transition_to(CircuitState::Open, config);
    }

    /// Forces the circuit closed with zero failures.
    pub(crate) fn reset(&mut self, config: &BreakerConfig) {
        self.transition_to(CircuitState::Closed, config);
        // A reset clears the counters even when already closed.
        self.failures = 0;
        self.consecutive_failures = 0;
    }

    pub(crate) fn remaining_cooldown(&self, config: &BreakerConfig, now: Instant) -> Duration {
        match self.last_failure_at {
            Some(at) => config
                .open_timeout
                .saturating_sub(now.saturating_duration_since(at)),
            None => Duration::ZERO,
        }
    }

    pub(crate) fn stats(&self, config: &BreakerConfig, now: Instant) -> BreakerStats {
        BreakerStats {
            state: self.state,
            failures: self.failures,
            consecutive_failures: self.consecutive_failures,
            consecutive_successes: self.consecutive_successes,
            total_requests: self.total_requests,
            total_failures: self.total_failures,
            total_successes: self.total_successes,
            last_failure_at: self.last_failure_at,
            last_success_at: self.last_success_at,
            time_until_close: (self.state == CircuitState::Open)
                .then(|| self.remaining_cooldown(config, now)),
        }
    }

    /// Zeroes the failure count after a quiet `reset_timeout` in Closed.
    fn decay_failures(&mut self, config: &BreakerConfig, now: Instant) {
        if self.failures == 0 {
            return;
        }
        if let Some(at) = self.last_failure_at {
            if now.saturating_duration_since(at) >= config.reset_timeout {
                #[cfg(feature = "tracing")]
                tracing::trace!(
                    breaker = %config.name,
                    dropped = self.failures,
                    "failure count decayed after quiet period"
                );
                self.failures = 0;
                self.consecutive_failures = 0;
            }
        }
    }

    fn permit(&self, config: &BreakerConfig) {
        config.event_listeners.emit(&BreakerEvent::CallPermitted {
            breaker_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            state: self.state,
        });
    }

    fn reject(&self, config: &BreakerConfig, retry_after: Duration) {
        config.event_listeners.emit(&BreakerEvent::CallRejected {
            breaker_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            retry_after,
        });

        #[cfg(feature = "metrics")]
        counter!("circuitbreaker_calls_total", "breaker" => config.name.clone(), "outcome" => "rejected")
            .increment(1);
    }

    fn transition_to(&mut self, state: CircuitState, config: &BreakerConfig) {
        if self.state == state {
            return;
        }
        let from = self.state;

        config.event_listeners.emit(&BreakerEvent::StateTransition {
            breaker_name: config.name.clone(),
            timestamp: std::time::Instant::now(),
            from,
            to: state,
        });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "breaker" => config.name.clone(),
                "from" => from.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "breaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.trial_in_flight = false;
        if state == CircuitState::Closed {
            self.failures = 0;
        }
    }
}
