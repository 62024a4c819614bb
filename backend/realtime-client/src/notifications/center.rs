use super::desktop::{DesktopNotifier, Permission};
use super::templates::{derive, Notification};
use crate::events::{Subscription, SubscriptionRegistry, Topic};
use event_schema::OrderEvent;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Default)]
struct Log {
    /// Newest first
    entries: VecDeque<Notification>,
    unread: usize,
}

impl Log {
    fn position(&self, id: &str) -> Option<usize> {
        self.entries.iter().position(|n| n.id == id)
    }
}

/// Bounded in-memory notification log fed by push events.
///
/// Clones share the same log.
#[derive(Clone)]
pub struct NotificationCenter {
    log: Arc<Mutex<Log>>,
    capacity: usize,
    notifier: Arc<dyn DesktopNotifier>,
}

impl NotificationCenter {
    pub fn new(capacity: usize, notifier: Arc<dyn DesktopNotifier>) -> Self {
        Self {
            log: Arc::new(Mutex::new(Log::default())),
            capacity: capacity.max(1),
            notifier,
        }
    }

    /// Start deriving notifications from every event on `registry`
    pub fn attach(&self, registry: &Arc<SubscriptionRegistry>) -> Subscription {
        let center = self.clone();
        registry.subscribe(Topic::All, move |event| {
            center.ingest(event);
        })
    }

    /// Derive, store and announce the notification for `event`, if it maps to one
    pub fn ingest(&self, event: &OrderEvent) -> Option<Notification> {
        let notification = derive(event)?;
        self.push(notification.clone());

        if self.notifier.permission() == Permission::Granted {
            if let Err(e) = self.notifier.show(&notification) {
                warn!(error = %e, id = %notification.id, "Desktop notification failed");
            }
        }
        Some(notification)
    }

    pub fn push(&self, notification: Notification) {
        let mut log = self.log.lock();
        if !notification.read {
            log.unread += 1;
        }
        debug!(id = %notification.id, kind = %notification.kind, "Notification added");
        log.entries.push_front(notification);

        while log.entries.len() > self.capacity {
            if let Some(evicted) = log.entries.pop_back() {
                if !evicted.read {
                    log.unread -= 1;
                }
            }
        }
    }

    /// Returns true if the notification went from unread to read
    pub fn mark_read(&self, id: &str) -> bool {
        let mut log = self.log.lock();
        let Some(index) = log.position(id) else {
            return false;
        };
        if log.entries[index].read {
            return false;
        }
        log.entries[index].read = true;
        log.unread -= 1;
        true
    }

    /// Mark read and hand back the action link
    pub fn follow_action(&self, id: &str) -> Option<String> {
        self.mark_read(id);
        let log = self.log.lock();
        log.position(id)
            .and_then(|index| log.entries[index].action_url.clone())
    }

    /// Returns how many were unread
    pub fn mark_all_read(&self) -> usize {
        let mut log = self.log.lock();
        for notification in log.entries.iter_mut() {
            notification.read = true;
        }
        std::mem::take(&mut log.unread)
    }

    pub fn delete(&self, id: &str) -> bool {
        let mut log = self.log.lock();
        let Some(index) = log.position(id) else {
            return false;
        };
        if let Some(removed) = log.entries.remove(index) {
            if !removed.read {
                log.unread -= 1;
            }
        }
        true
    }

    pub fn clear_all(&self) {
        let mut log = self.log.lock();
        log.entries.clear();
        log.unread = 0;
    }

    /// Snapshot, newest first
    pub fn notifications(&self) -> Vec<Notification> {
        self.log.lock().entries.iter().cloned().collect()
    }

    pub fn unread_count(&self) -> usize {
        self.log.lock().unread
    }

    /// Up to `limit` unread notifications, newest first
    pub fn recent_unread(&self, limit: usize) -> Vec<Notification> {
        self.log
            .lock()
            .entries
            .iter()
            .filter(|n| !n.read)
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn permission(&self) -> Permission {
        self.notifier.permission()
    }

    /// Returns true when desktop notices are allowed afterwards
    pub async fn request_permission(&self) -> bool {
        self.notifier.request_permission().await == Permission::Granted
    }
}
