//! Host environment signal.
//!
//! The pool can react to its host's visibility and connectivity, the way
//! a browser tab would to `visibilitychange` and `online`/`offline`. The
//! signal is an injected watch channel so the pool stays testable and
//! portable to hosts with no such notion; a pool built without one simply
//! never pauses.

use tokio::sync::watch;

/// Best-effort snapshot of the hosting environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostEnvironment {
    /// Whether the host considers itself visible to the user. While
    /// hidden, the pool stops dispatching queued work.
    pub visible: bool,
    /// Whether the host believes it has network connectivity. A regain
    /// triggers an immediate drain attempt.
    pub online: bool,
}

impl Default for HostEnvironment {
    fn default() -> Self {
        Self {
            visible: true,
            online: true,
        }
    }
}

impl HostEnvironment {
    /// Creates a signal channel starting from the default (visible,
    /// online) state. Hand the receiver to the pool builder and publish
    /// updates through the sender.
    pub fn channel() -> (watch::Sender<HostEnvironment>, watch::Receiver<HostEnvironment>) {
        watch::channel(HostEnvironment::default())
    }
}
