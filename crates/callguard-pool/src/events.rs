//! Events emitted by the connection pool.

use crate::queue::Priority;
use callguard_core::GuardEvent;
use std::time::Duration;
use std::time::Instant;

/// Events emitted by the pool as requests move through it.
#[derive(Debug, Clone)]
pub enum PoolEvent {
    /// A request could not run immediately and was queued.
    Queued {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The request's priority tier.
        priority: Priority,
        /// Queue depth after insertion.
        depth: usize,
    },
    /// A request was admitted and its operation started.
    Dispatched {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Time spent queued before dispatch; zero for immediate admission.
        waited: Duration,
    },
    /// A pooled operation settled successfully.
    Completed {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A pooled operation settled with an error.
    Failed {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// The per-call timeout fired before the operation settled.
    TimedOut {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The timeout that fired.
        timeout: Duration,
    },
    /// A still-queued request was cancelled by its caller.
    Cancelled {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// The queue was explicitly cleared.
    QueueCleared {
        /// Pool name.
        pool_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Requests dropped from the queue.
        cleared: usize,
    },
}

impl GuardEvent for PoolEvent {
    fn kind(&self) -> &'static str {
        match self {
            PoolEvent::Queued { .. } => "queued",
            PoolEvent::Dispatched { .. } => "dispatched",
            PoolEvent::Completed { .. } => "completed",
            PoolEvent::Failed { .. } => "failed",
            PoolEvent::TimedOut { .. } => "timed_out",
            PoolEvent::Cancelled { .. } => "cancelled",
            PoolEvent::QueueCleared { .. } => "queue_cleared",
        }
    }

    fn at(&self) -> Instant {
        match self {
            PoolEvent::Queued { timestamp, .. }
            | PoolEvent::Dispatched { timestamp, .. }
            | PoolEvent::Completed { timestamp, .. }
            | PoolEvent::Failed { timestamp, .. }
            | PoolEvent::TimedOut { timestamp, .. }
            | PoolEvent::Cancelled { timestamp, .. }
            | PoolEvent::QueueCleared { timestamp, .. } => *timestamp,
        }
    }

    fn source(&self) -> &str {
        match self {
            PoolEvent::Queued { pool_name, .. }
            | PoolEvent::Dispatched { pool_name, .. }
            | PoolEvent::Completed { pool_name, .. }
            | PoolEvent::Failed { pool_name, .. }
            | PoolEvent::TimedOut { pool_name, .. }
            | PoolEvent::Cancelled { pool_name, .. }
            | PoolEvent::QueueCleared { pool_name, .. } => pool_name,
        }
    }
}
