//! The connection pool itself.

use crate::config::PoolConfig;
use crate::environment::HostEnvironment;
use crate::error::PoolError;
use crate::events::PoolEvent;
use crate::queue::{PendingQueue, Priority, Waiter};
use callguard_circuitbreaker::{BreakerError, ClassifyError};
#[cfg(feature = "metrics")]
use metrics::{counter, gauge, histogram};
use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{oneshot, watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const WAIT_SAMPLE_WINDOW: usize = 100;

/// Per-call options for [`ConnectionPool::execute_with`].
#[derive(Debug, Clone, Default)]
pub struct ExecuteOptions {
    priority: Priority,
    timeout: Option<Duration>,
    cancel: Option<CancellationToken>,
    bypass_breaker: bool,
}

impl ExecuteOptions {
    /// Options with defaults: normal priority, the pool's default
    /// timeout, no cancellation, breaker routing on.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the queue priority tier.
    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Overrides the pool's default per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Attaches a cancellation token. Cancelling it while the request is
    /// still queued rejects the request with [`PoolError::Aborted`];
    /// cancelling after dispatch has no effect on the running operation.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Skips the pool's circuit breaker for this call. The slot and
    /// timeout accounting still apply.
    pub fn bypass_breaker(mut self) -> Self {
        self.bypass_breaker = true;
        self
    }
}

/// Point-in-time snapshot of the pool's counters.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    /// Operations currently running.
    pub in_flight: usize,
    /// Requests waiting for a slot.
    pub queued: usize,
    /// Slots free right now.
    pub available_slots: usize,
    /// Pooled calls that settled successfully.
    pub processed: u64,
    /// Pooled calls that settled with an error, including breaker
    /// rejections.
    pub errored: u64,
    /// Pooled calls whose per-call timeout fired.
    pub timed_out: u64,
    /// Requests whose caller stopped waiting, whether cancelled while
    /// queued or dropped while in flight.
    pub cancelled: u64,
    /// Mean queue wait over the last hundred dispatches; zero when no
    /// dispatch has happened yet.
    pub average_wait: Duration,
}

struct PoolState {
    next_id: u64,
    in_flight: HashSet<u64>,
    queue: PendingQueue,
    /// Set while the host environment reports not-visible; drain skips
    /// the queue until cleared.
    paused: bool,
    processed: u64,
    errored: u64,
    timed_out: u64,
    cancelled: u64,
    wait_samples: VecDeque<Duration>,
}

impl PoolState {
    fn new() -> Self {
        Self {
            next_id: 0,
            in_flight: HashSet::new(),
            queue: PendingQueue::default(),
            paused: false,
            processed: 0,
            errored: 0,
            timed_out: 0,
            cancelled: 0,
            wait_samples: VecDeque::with_capacity(WAIT_SAMPLE_WINDOW),
        }
    }

    fn push_wait_sample(&mut self, waited: Duration) {
        if self.wait_samples.len() == WAIT_SAMPLE_WINDOW {
            self.wait_samples.pop_front();
        }
        self.wait_samples.push_back(waited);
    }

    fn average_wait(&self) -> Duration {
        if self.wait_samples.is_empty() {
            return Duration::ZERO;
        }
        let total: Duration = self.wait_samples.iter().sum();
        total / self.wait_samples.len() as u32
    }
}

struct Inner {
    config: PoolConfig,
    state: Mutex<PoolState>,
    idle: Notify,
}

enum Outcome {
    Completed,
    Failed,
    TimedOut(Duration),
    /// The caller's future was dropped after admission; the operation's
    /// result, if any, went unobserved.
    Abandoned,
}

impl Inner {
    /// Moves queued waiters into flight while capacity allows. Returns
    /// the wait duration of each dispatched request so the caller can
    /// emit events outside the lock.
    fn drain_locked(&self, state: &mut PoolState) -> Vec<Duration> {
        let mut dispatched = Vec::new();
        while !state.paused && state.in_flight.len() < self.config.max_concurrent {
            let Some(waiter) = state.queue.pop_front() else {
                break;
            };
            let waited = waiter.enqueued_at.elapsed();
            // Claim the slot before handing over the permit so a racing
            // submission cannot overshoot the cap.
            state.in_flight.insert(waiter.id);
            if waiter.permit_tx.send(()).is_err() {
                // The caller stopped waiting while queued.
                state.in_flight.remove(&waiter.id);
                state.cancelled += 1;
                continue;
            }
            state.push_wait_sample(waited);
            dispatched.push(waited);
        }
        dispatched
    }

    fn emit_dispatched(&self, waits: &[Duration]) {
        for &waited in waits {
            self.config.event_listeners.emit(&PoolEvent::Dispatched {
                pool_name: self.config.name.clone(),
                timestamp: std::time::Instant::now(),
                waited,
            });

            #[cfg(feature = "metrics")]
            histogram!("pool_queue_wait_seconds", "pool" => self.config.name.clone())
                .record(waited.as_secs_f64());
        }
    }

    fn release(&self, id: u64, outcome: Outcome) {
        let (waits, idle_now) = {
            let mut state = self.state.lock().unwrap();
            state.in_flight.remove(&id);
            match outcome {
                Outcome::Completed => state.processed += 1,
                Outcome::Failed => state.errored += 1,
                Outcome::TimedOut(_) => state.timed_out += 1,
                Outcome::Abandoned => state.cancelled += 1,
            }
            let waits = self.drain_locked(&mut state);
            (waits, state.in_flight.is_empty())
        };

        let timestamp = std::time::Instant::now();
        let event = match outcome {
            Outcome::Completed => PoolEvent::Completed {
                pool_name: self.config.name.clone(),
                timestamp,
            },
            Outcome::Failed => PoolEvent::Failed {
                pool_name: self.config.name.clone(),
                timestamp,
            },
            Outcome::TimedOut(timeout) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    pool = %self.config.name,
                    ?timeout,
                    "pooled call timed out, operation left running detached"
                );
                PoolEvent::TimedOut {
                    pool_name: self.config.name.clone(),
                    timestamp,
                    timeout,
                }
            }
            Outcome::Abandoned => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    pool = %self.config.name,
                    "caller dropped mid-call, slot reclaimed"
                );
                PoolEvent::Cancelled {
                    pool_name: self.config.name.clone(),
                    timestamp,
                }
            }
        };
        self.config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        {
            let outcome_label = match event {
                PoolEvent::Completed { .. } => "completed",
                PoolEvent::TimedOut { .. } => "timed_out",
                PoolEvent::Cancelled { .. } => "abandoned",
                _ => "failed",
            };
            counter!("pool_requests_total", "pool" => self.config.name.clone(), "outcome" => outcome_label)
                .increment(1);
            gauge!("pool_in_flight", "pool" => self.config.name.clone())
                .set(self.state.lock().unwrap().in_flight.len() as f64);
        }

        self.emit_dispatched(&waits);
        if idle_now {
            self.idle.notify_waiters();
        }
    }

    fn apply_environment(&self, env: HostEnvironment, prev: HostEnvironment) {
        #[cfg(feature = "tracing")]
        {
            if prev.online && !env.online {
                tracing::warn!(pool = %self.config.name, "connectivity lost");
            }
            if !prev.online && env.online {
                tracing::info!(pool = %self.config.name, "connectivity restored");
            }
            if prev.visible != env.visible {
                tracing::debug!(pool = %self.config.name, visible = env.visible, "visibility changed");
            }
        }

        let waits = {
            let mut state = self.state.lock().unwrap();
            state.paused = !env.visible;
            let regained =
                (env.visible && !prev.visible) || (env.online && !prev.online);
            if regained {
                self.drain_locked(&mut state)
            } else {
                Vec::new()
            }
        };
        self.emit_dispatched(&waits);
    }
}

/// An admitted slot. [`finish`](SlotGuard::finish) releases it with the
/// call's outcome; if the caller's future is instead dropped mid-call
/// (task abort, losing `select!` arm), `Drop` releases it as abandoned
/// so the capacity cannot leak.
struct SlotGuard {
    inner: Arc<Inner>,
    id: u64,
    armed: bool,
}

impl SlotGuard {
    fn new(inner: Arc<Inner>, id: u64) -> Self {
        Self {
            inner,
            id,
            armed: true,
        }
    }

    fn finish(mut self, outcome: Outcome) {
        self.armed = false;
        self.inner.release(self.id, outcome);
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release(self.id, Outcome::Abandoned);
        }
    }
}

/// Watches the host environment signal on behalf of the pool. Holds a
/// weak reference so a live subscription never keeps a dropped pool
/// alive.
struct EnvWatcher {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl EnvWatcher {
    fn spawn(inner: &Arc<Inner>, mut signal: watch::Receiver<HostEnvironment>) -> Self {
        let weak = Arc::downgrade(inner);
        let handle = tokio::spawn(async move {
            let mut prev = *signal.borrow();
            while signal.changed().await.is_ok() {
                let env = *signal.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.apply_environment(env, prev);
                prev = env;
            }
        });
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    fn disabled() -> Self {
        Self {
            handle: Mutex::new(None),
        }
    }

    fn shutdown(&self) {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }
    }
}

impl Drop for EnvWatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// A bounded pool of concurrent async operations with a priority queue.
///
/// Cheap to clone; clones share the same slots and queue.
pub struct ConnectionPool {
    inner: Arc<Inner>,
    watcher: Arc<EnvWatcher>,
}

impl ConnectionPool {
    pub(crate) fn new(config: PoolConfig) -> Self {
        let environment = config.environment.clone();
        let inner = Arc::new(Inner {
            config,
            state: Mutex::new(PoolState::new()),
            idle: Notify::new(),
        });
        let watcher = match environment {
            Some(signal) => EnvWatcher::spawn(&inner, signal),
            None => EnvWatcher::disabled(),
        };
        Self {
            inner,
            watcher: Arc::new(watcher),
        }
    }

    /// Runs `op` with default options: normal priority, the pool's
    /// default timeout, no cancellation, breaker routing on.
    pub async fn execute<F, Fut, T, E>(&self, op: F) -> Result<T, PoolError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: ClassifyError + Send + 'static,
    {
        self.execute_with(ExecuteOptions::new(), op).await
    }

    /// Runs `op` under the pool's concurrency cap.
    ///
    /// At capacity the request queues by priority; high goes to the
    /// front, low to the back, normal to the queue midpoint. The
    /// operation races a per-call timeout; if the timeout fires first,
    /// the call fails with [`PoolError::Timeout`] and the slot frees,
    /// but the operation is left running detached rather than cancelled.
    /// Non-bypassed calls route through the pool's circuit breaker when
    /// one is configured. Dropping the returned future after admission
    /// releases the slot as well.
    pub async fn execute_with<F, Fut, T, E>(
        &self,
        options: ExecuteOptions,
        op: F,
    ) -> Result<T, PoolError<E>>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: ClassifyError + Send + 'static,
    {
        let id = self.admit(&options).await?;
        let slot = SlotGuard::new(Arc::clone(&self.inner), id);

        let timeout = options.timeout.unwrap_or(self.inner.config.default_timeout);
        let breaker = if options.bypass_breaker {
            None
        } else {
            self.inner.config.breaker.clone()
        };
        let handle = tokio::spawn(async move {
            match breaker {
                Some(breaker) => match breaker.execute(op).await {
                    Ok(value) => Ok(value),
                    Err(BreakerError::Open { retry_after }) => {
                        Err(PoolError::CircuitOpen { retry_after })
                    }
                    Err(BreakerError::Inner(e)) => Err(PoolError::Inner(e)),
                },
                None => op().await.map_err(PoolError::Inner),
            }
        });

        let result = match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                if join_err.is_panic() {
                    slot.finish(Outcome::Failed);
                    std::panic::resume_unwind(join_err.into_panic());
                }
                Err(PoolError::Aborted)
            }
            // Dropping the join handle detaches the task; the operation
            // keeps running but this caller is done waiting.
            Err(_) => Err(PoolError::Timeout { timeout }),
        };

        let outcome = match &result {
            Ok(_) => Outcome::Completed,
            Err(PoolError::Timeout { timeout }) => Outcome::TimedOut(*timeout),
            Err(_) => Outcome::Failed,
        };
        slot.finish(outcome);
        result
    }

    /// Claims a slot, queueing and waiting if the pool is saturated.
    /// On success the returned id is registered in flight.
    async fn admit<E>(&self, options: &ExecuteOptions) -> Result<u64, PoolError<E>> {
        let (id, permit_rx) = {
            let mut state = self.inner.state.lock().unwrap();
            let id = state.next_id;
            state.next_id += 1;

            if state.in_flight.len() < self.inner.config.max_concurrent
                && state.queue.is_empty()
            {
                state.in_flight.insert(id);
                state.push_wait_sample(Duration::ZERO);
                (id, None)
            } else {
                let (permit_tx, permit_rx) = oneshot::channel();
                state.queue.insert(Waiter {
                    id,
                    priority: options.priority,
                    enqueued_at: Instant::now(),
                    permit_tx,
                });
                (id, Some((permit_rx, state.queue.len())))
            }
        };

        let Some((mut permit_rx, depth)) = permit_rx else {
            self.inner.emit_dispatched(&[Duration::ZERO]);
            return Ok(id);
        };

        self.inner.config.event_listeners.emit(&PoolEvent::Queued {
            pool_name: self.inner.config.name.clone(),
            timestamp: std::time::Instant::now(),
            priority: options.priority,
            depth,
        });
        #[cfg(feature = "tracing")]
        tracing::debug!(
            pool = %self.inner.config.name,
            priority = options.priority.as_str(),
            depth,
            "request queued"
        );

        let admitted = match &options.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    admitted = &mut permit_rx => admitted,
                    _ = token.cancelled() => {
                        let removed = {
                            let mut state = self.inner.state.lock().unwrap();
                            let removed = state.queue.remove(id);
                            if removed {
                                state.cancelled += 1;
                            }
                            removed
                        };
                        if removed {
                            self.inner.config.event_listeners.emit(&PoolEvent::Cancelled {
                                pool_name: self.inner.config.name.clone(),
                                timestamp: std::time::Instant::now(),
                            });
                            return Err(PoolError::Aborted);
                        }
                        // Already dispatched; the cancellation came too
                        // late to matter.
                        permit_rx.await
                    }
                }
            }
            None => permit_rx.await,
        };

        match admitted {
            Ok(()) => Ok(id),
            // The sender was dropped without dispatching: queue cleared.
            Err(_) => Err(PoolError::QueueCleared),
        }
    }

    /// Rejects every queued-but-undispatched request with
    /// [`PoolError::QueueCleared`] and returns how many were dropped.
    /// In-flight work is untouched.
    pub fn clear_queue(&self) -> usize {
        let cleared = self.inner.state.lock().unwrap().queue.clear();
        if cleared > 0 {
            self.inner
                .config
                .event_listeners
                .emit(&PoolEvent::QueueCleared {
                    pool_name: self.inner.config.name.clone(),
                    timestamp: std::time::Instant::now(),
                    cleared,
                });

            #[cfg(feature = "tracing")]
            tracing::info!(pool = %self.inner.config.name, cleared, "queue cleared");
        }
        cleared
    }

    /// Resolves once every in-flight operation has settled, regardless
    /// of outcome. Returns immediately if nothing is in flight.
    pub async fn wait_for_all(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.state.lock().unwrap().in_flight.is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Whether every slot is currently taken.
    pub fn is_at_capacity(&self) -> bool {
        self.available_slots() == 0
    }

    /// Slots free right now.
    pub fn available_slots(&self) -> usize {
        let state = self.inner.state.lock().unwrap();
        self.inner.config.max_concurrent - state.in_flight.len()
    }

    /// Point-in-time snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock().unwrap();
        PoolStats {
            in_flight: state.in_flight.len(),
            queued: state.queue.len(),
            available_slots: self.inner.config.max_concurrent - state.in_flight.len(),
            processed: state.processed,
            errored: state.errored,
            timed_out: state.timed_out,
            cancelled: state.cancelled,
            average_wait: state.average_wait(),
        }
    }

    /// Stops the environment subscription. The pool stays usable; it
    /// just no longer reacts to visibility or connectivity changes.
    pub fn shutdown(&self) {
        self.watcher.shutdown();
    }
}

impl Clone for ConnectionPool {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            watcher: Arc::clone(&self.watcher),
        }
    }
}
