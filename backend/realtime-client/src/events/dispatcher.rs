/// Frame decoding and fan-out to registered listeners
use super::registry::{Subscription, SubscriptionRegistry, Topic};
use event_schema::{FrameError, OrderEvent};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub frames_received: u64,
    /// Malformed or unknown-type frames
    pub frames_dropped: u64,
    pub events_dispatched: u64,
    /// Individual listener invocations
    pub deliveries: u64,
    /// Listener invocations that panicked
    pub listener_failures: u64,
}

#[derive(Default)]
struct Counters {
    frames_received: AtomicU64,
    frames_dropped: AtomicU64,
    events_dispatched: AtomicU64,
    deliveries: AtomicU64,
    listener_failures: AtomicU64,
}

#[derive(Clone)]
pub struct EventDispatcher {
    registry: Arc<SubscriptionRegistry>,
    counters: Arc<Counters>,
}

impl EventDispatcher {
    pub fn new(registry: Arc<SubscriptionRegistry>) -> Self {
        Self {
            registry,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&OrderEvent) + Send + Sync + 'static,
    {
        self.registry.subscribe(topic, listener)
    }

    /// Decode one text frame and deliver it. Returns the number of listeners
    /// that ran; undecodable frames are logged and dropped.
    pub fn dispatch_frame(&self, text: &str) -> usize {
        self.counters.frames_received.fetch_add(1, Ordering::Relaxed);

        match OrderEvent::decode(text) {
            Ok(event) => self.handle_message(&event),
            Err(FrameError::UnknownType(kind)) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                debug!(event_type = %kind, "Ignoring frame with unknown event type");
                0
            }
            Err(e) => {
                self.counters.frames_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "Failed to parse WebSocket message");
                0
            }
        }
    }

    /// Deliver an already decoded event: exact-type listeners first, then
    /// wildcard listeners. A panicking listener is logged and skipped.
    pub fn handle_message(&self, event: &OrderEvent) -> usize {
        self.counters.events_dispatched.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        for listener in self.registry.listeners_for(event.event_type) {
            match catch_unwind(AssertUnwindSafe(|| listener.call(event))) {
                Ok(true) => delivered += 1,
                Ok(false) => {}
                Err(panic) => {
                    self.counters.listener_failures.fetch_add(1, Ordering::Relaxed);
                    error!(
                        event_type = %event.event_type,
                        order_id = ?event.order_id,
                        panic = panic_message(panic.as_ref()),
                        "Event listener panicked"
                    );
                }
            }
        }

        self.counters
            .deliveries
            .fetch_add(delivered as u64, Ordering::Relaxed);
        delivered
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            frames_received: self.counters.frames_received.load(Ordering::Relaxed),
            frames_dropped: self.counters.frames_dropped.load(Ordering::Relaxed),
            events_dispatched: self.counters.events_dispatched.load(Ordering::Relaxed),
            deliveries: self.counters.deliveries.load(Ordering::Relaxed),
            listener_failures: self.counters.listener_failures.load(Ordering::Relaxed),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
