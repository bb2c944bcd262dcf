//! Event system shared by all guards.
//!
//! Each guard crate defines its own event enum and emits through
//! [`EventListeners`]. Listeners are the seam for UI updates, logging and
//! metric emission; the guards themselves have no opinion on what a
//! listener does.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// An event emitted by a guard instance.
pub trait GuardEvent: Send + Sync + fmt::Debug {
    /// Stable event kind, e.g. `"state_transition"` or `"call_rejected"`.
    fn kind(&self) -> &'static str;

    /// When the event occurred.
    fn at(&self) -> Instant;

    /// Name of the guard instance that emitted the event.
    fn source(&self) -> &str;
}

/// A listener for guard events.
///
/// Implement this for stateful subscribers; for a plain callback use
/// [`EventListeners::add_fn`].
pub trait EventListener<E: GuardEvent>: Send + Sync {
    fn on_event(&self, event: &E);
}

struct ClosureListener<F>(F);

impl<E, F> EventListener<E> for ClosureListener<F>
where
    E: GuardEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        (self.0)(event)
    }
}

/// The set of listeners registered on one guard instance.
#[derive(Clone)]
pub struct EventListeners<E: GuardEvent> {
    listeners: Vec<Arc<dyn EventListener<E>>>,
}

impl<E: GuardEvent> EventListeners<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
        }
    }

    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.listeners.push(Arc::new(listener));
    }

    /// Registers a plain closure as a listener. The builders' `on_*`
    /// hooks go through here.
    pub fn add_fn<F>(&mut self, f: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.listeners.push(Arc::new(ClosureListener(f)));
    }

    /// Emits an event to every registered listener.
    ///
    /// A panicking listener is isolated: the panic is caught so the
    /// remaining listeners still run.
    pub fn emit(&self, event: &E) {
        for listener in &self.listeners {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener.on_event(event);
            }));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }
}

impl<E: GuardEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct PingEvent {
        at: Instant,
    }

    impl GuardEvent for PingEvent {
        fn kind(&self) -> &'static str {
            "ping"
        }

        fn at(&self) -> Instant {
            self.at
        }

        fn source(&self) -> &str {
            "ping"
        }
    }

    #[test]
    fn every_listener_receives_each_event() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&first);
        let s = Arc::clone(&second);

        let mut listeners = EventListeners::new();
        listeners.add_fn(move |_: &PingEvent| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        listeners.add_fn(move |_: &PingEvent| {
            s.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(listeners.len(), 2);

        let event = PingEvent { at: Instant::now() };
        listeners.emit(&event);
        listeners.emit(&event);

        assert_eq!(first.load(Ordering::SeqCst), 2);
        assert_eq!(second.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_starve_others() {
        let reached = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&reached);

        let mut listeners = EventListeners::new();
        listeners.add_fn(|_: &PingEvent| {
            panic!("listener bug");
        });
        listeners.add_fn(move |_: &PingEvent| {
            r.fetch_add(1, Ordering::SeqCst);
        });

        listeners.emit(&PingEvent { at: Instant::now() });
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn trait_impls_and_closures_mix() {
        struct Counter(Arc<AtomicUsize>);

        impl EventListener<PingEvent> for Counter {
            fn on_event(&self, _: &PingEvent) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let hits = Arc::new(AtomicUsize::new(0));
        let mut listeners = EventListeners::new();
        listeners.add(Counter(Arc::clone(&hits)));
        listeners.emit(&PingEvent { at: Instant::now() });
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
