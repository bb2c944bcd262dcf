//! The pool's priority wait queue.

use std::collections::VecDeque;
use tokio::sync::oneshot;
use tokio::time::Instant;

/// Priority tier for a pooled request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    /// Dispatched before anything already queued.
    High,
    /// Inserted at the queue midpoint.
    #[default]
    Normal,
    /// Appended behind everything already queued.
    Low,
}

impl Priority {
    /// Stable label for logging and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Normal => "normal",
            Priority::Low => "low",
        }
    }
}

/// A queued request waiting for a slot. Dropping the permit sender tells
/// the waiting caller the queue was cleared.
pub(crate) struct Waiter {
    pub(crate) id: u64,
    pub(crate) priority: Priority,
    pub(crate) enqueued_at: Instant,
    pub(crate) permit_tx: oneshot::Sender<()>,
}

/// Priority-then-insertion ordered queue.
///
/// High goes to the front and low to the back. Normal is inserted at the
/// current midpoint, which keeps a fresh normal request from sitting
/// behind an arbitrarily long run of older normal requests while still
/// dispatching explicit high-priority work first.
#[derive(Default)]
pub(crate) struct PendingQueue {
    waiters: VecDeque<Waiter>,
}

impl PendingQueue {
    pub(crate) fn insert(&mut self, waiter: Waiter) {
        match waiter.priority {
            Priority::High => self.waiters.push_front(waiter),
            Priority::Low => self.waiters.push_back(waiter),
            Priority::Normal => {
                let mid = self.waiters.len() / 2;
                self.waiters.insert(mid, waiter);
            }
        }
    }

    pub(crate) fn pop_front(&mut self) -> Option<Waiter> {
        self.waiters.pop_front()
    }

    /// Removes a still-queued request by id. Returns whether it was found.
    pub(crate) fn remove(&mut self, id: u64) -> bool {
        match self.waiters.iter().position(|w| w.id == id) {
            Some(idx) => {
                self.waiters.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Drops every queued waiter, returning how many there were.
    pub(crate) fn clear(&mut self) -> usize {
        let cleared = self.waiters.len();
        self.waiters.clear();
        cleared
    }

    pub(crate) fn len(&self) -> usize {
        self.waiters.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.waiters.is_empty()
    }
}
