//! Background self-heal monitor.
//!
//! A breaker that stops receiving calls while open would otherwise stay
//! open forever waiting for the next call to run the time checks. The
//! monitor is a repeating tick owned by the breaker instance; it holds only
//! a `Weak` reference, so dropping the last breaker handle ends the task,
//! and `shutdown` ends it explicitly.

use crate::Shared;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant, MissedTickBehavior};

pub(crate) struct Monitor {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    /// Spawns the repeating tick. Requires a Tokio runtime.
    pub(crate) fn spawn(shared: &Arc<Shared>, period: Duration) -> Self {
        let weak: Weak<Shared> = Arc::downgrade(shared);
        let handle = tokio::spawn(async move {
            let mut tick = interval(period);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tick.tick().await;
                let Some(shared) = weak.upgrade() else { break };
                // Monitor problems are logged, never propagated; the task
                // runs detached from any caller.
                match shared.circuit.lock() {
                    Ok(mut circuit) => {
                        circuit.check_timers(&shared.config, Instant::now());
                    }
                    Err(_poisoned) => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            breaker = %shared.config.name,
                            "skipping monitor tick: circuit lock poisoned"
                        );
                    }
                };
            }
        });
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    /// A monitor that never ticks, for `monitor_interval(None)`.
    pub(crate) fn disabled() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    /// Stops the tick. Idempotent.
    pub(crate) fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}
