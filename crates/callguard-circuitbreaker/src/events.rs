//! Events emitted by the circuit breaker.

use crate::circuit::CircuitState;
use crate::classify::ErrorClass;
use callguard_core::GuardEvent;
use std::time::{Duration, Instant};

/// Observability events for a [`CircuitBreaker`](crate::CircuitBreaker).
#[derive(Debug, Clone)]
pub enum BreakerEvent {
    /// The circuit moved between states.
    StateTransition {
        breaker_name: String,
        timestamp: Instant,
        from: CircuitState,
        to: CircuitState,
    },
    /// A call was allowed through.
    CallPermitted {
        breaker_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A call was blocked because the circuit is open (or the half-open
    /// trial slot is taken).
    CallRejected {
        breaker_name: String,
        timestamp: Instant,
        /// Remaining cooldown before the next half-open trial.
        retry_after: Duration,
    },
    /// A guarded call succeeded.
    SuccessRecorded {
        breaker_name: String,
        timestamp: Instant,
        state: CircuitState,
    },
    /// A guarded call failed.
    FailureRecorded {
        breaker_name: String,
        timestamp: Instant,
        state: CircuitState,
        class: ErrorClass,
    },
}

impl GuardEvent for BreakerEvent {
    fn kind(&self) -> &'static str {
        match self {
            BreakerEvent::StateTransition { .. } => "state_transition",
            BreakerEvent::CallPermitted { .. } => "call_permitted",
            BreakerEvent::CallRejected { .. } => "call_rejected",
            BreakerEvent::SuccessRecorded { .. } => "success_recorded",
            BreakerEvent::FailureRecorded { .. } => "failure_recorded",
        }
    }

    fn at(&self) -> Instant {
        match self {
            BreakerEvent::StateTransition { timestamp, .. }
            | BreakerEvent::CallPermitted { timestamp, .. }
            | BreakerEvent::CallRejected { timestamp, .. }
            | BreakerEvent::SuccessRecorded { timestamp, .. }
            | BreakerEvent::FailureRecorded { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            BreakerEvent::StateTransition { breaker_name, .. }
            | BreakerEvent::CallPermitted { breaker_name, .. }
            | BreakerEvent::CallRejected { breaker_name, .. }
            | BreakerEvent::SuccessRecorded { breaker_name, .. }
            | BreakerEvent::FailureRecorded { breaker_name, .. } => breaker_name,
        }
    }
}
