/// Listener registry keyed by event type
///
/// Listeners register for one `EventType` or for every event. The returned
/// `Subscription` removes the listener when unsubscribed or dropped.
use event_schema::{EventType, OrderEvent};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

pub type Listener = Arc<dyn Fn(&OrderEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Every event, regardless of type
    All,
    Event(EventType),
}

impl From<EventType> for Topic {
    fn from(event_type: EventType) -> Self {
        Topic::Event(event_type)
    }
}

struct Entry {
    id: u64,
    active: Arc<AtomicBool>,
    listener: Listener,
}

/// A listener snapshot taken for one dispatch.
pub(crate) struct ActiveListener {
    active: Arc<AtomicBool>,
    listener: Listener,
}

impl ActiveListener {
    /// Invoke unless unsubscribed since the snapshot was taken
    pub(crate) fn call(&self, event: &OrderEvent) -> bool {
        if !self.active.load(Ordering::Acquire) {
            return false;
        }
        (self.listener)(event);
        true
    }
}

#[derive(Default)]
pub struct SubscriptionRegistry {
    listeners: RwLock<HashMap<Topic, Vec<Entry>>>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register `listener` for `topic`.
    ///
    /// The same closure registered twice is two listeners and fires twice.
    pub fn subscribe<F>(self: &Arc<Self>, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&OrderEvent) + Send + Sync + 'static,
    {
        let topic = topic.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));

        self.listeners.write().entry(topic).or_default().push(Entry {
            id,
            active: Arc::clone(&active),
            listener: Arc::new(listener),
        });
        debug!(?topic, id, "Listener registered");

        Subscription {
            registry: Arc::downgrade(self),
            topic,
            id,
            active,
        }
    }

    fn remove(&self, topic: Topic, id: u64) {
        let mut listeners = self.listeners.write();
        if let Some(entries) = listeners.get_mut(&topic) {
            entries.retain(|entry| entry.id != id);
            if entries.is_empty() {
                listeners.remove(&topic);
            }
        }
    }

    /// Listeners for `event_type` in registration order, then wildcard listeners
    pub(crate) fn listeners_for(&self, event_type: EventType) -> Vec<ActiveListener> {
        let listeners = self.listeners.read();
        [Topic::Event(event_type), Topic::All]
            .iter()
            .filter_map(|topic| listeners.get(topic))
            .flatten()
            .map(|entry| ActiveListener {
                active: Arc::clone(&entry.active),
                listener: Arc::clone(&entry.listener),
            })
            .collect()
    }

    pub fn listener_count(&self, topic: impl Into<Topic>) -> usize {
        self.listeners
            .read()
            .get(&topic.into())
            .map_or(0, Vec::len)
    }

    pub fn total_listeners(&self) -> usize {
        self.listeners.read().values().map(Vec::len).sum()
    }
}

/// Registration handle; unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    registry: Weak<SubscriptionRegistry>,
    topic: Topic,
    id: u64,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Remove the listener. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.topic, self.id);
            debug!(topic = ?self.topic, id = self.id, "Listener removed");
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}
