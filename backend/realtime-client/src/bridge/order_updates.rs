/// Push events to query-cache effects
///
/// | Event                  | Effect                                                   |
/// |------------------------|----------------------------------------------------------|
/// | `order.created`        | invalidate order lists                                   |
/// | `order.updated`        | invalidate the order's detail (if `orderId`) and lists    |
/// | `order.status_changed` | patch cached detail `status`, invalidate detail and lists |
/// | any, matching watched  | invalidate the watched order's detail                     |
use super::keys::OrderKeys;
use crate::events::{Subscription, SubscriptionRegistry, Topic};
use cache_invalidation::{PatchOutcome, QueryCache};
use event_schema::{EventType, OrderEvent, OrderPayload};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Keeps a query cache coherent with the push feed while alive.
///
/// Dropping it unsubscribes every listener it registered.
pub struct OrderUpdates {
    latest: Arc<Mutex<Option<OrderEvent>>>,
    watched_order: Option<String>,
    subscriptions: Vec<Subscription>,
}

impl OrderUpdates {
    pub fn attach(
        registry: &Arc<SubscriptionRegistry>,
        cache: Arc<dyn QueryCache>,
        watched_order: Option<String>,
    ) -> Self {
        let latest = Arc::new(Mutex::new(None));
        let mut subscriptions = Vec::with_capacity(4);

        let (c, l) = (Arc::clone(&cache), Arc::clone(&latest));
        subscriptions.push(registry.subscribe(EventType::OrderCreated, move |event| {
            record(&l, event);
            c.invalidate(&OrderKeys::lists());
        }));

        let (c, l) = (Arc::clone(&cache), Arc::clone(&latest));
        subscriptions.push(registry.subscribe(EventType::OrderUpdated, move |event| {
            record(&l, event);
            if let Some(order_id) = event.order_id.as_deref() {
                c.invalidate(&OrderKeys::detail(order_id));
            }
            c.invalidate(&OrderKeys::lists());
        }));

        let (c, l) = (Arc::clone(&cache), Arc::clone(&latest));
        subscriptions.push(
            registry.subscribe(EventType::OrderStatusChanged, move |event| {
                record(&l, event);
                apply_status_change(c.as_ref(), event);
            }),
        );

        if let Some(order_id) = watched_order.clone() {
            let (c, l) = (Arc::clone(&cache), Arc::clone(&latest));
            subscriptions.push(registry.subscribe(Topic::All, move |event| {
                if event.order_id.as_deref() == Some(order_id.as_str()) {
                    record(&l, event);
                    c.invalidate(&OrderKeys::detail(&order_id));
                }
            }));
        }

        debug!(
            watched_order = ?watched_order,
            listeners = subscriptions.len(),
            "Order cache bridge attached"
        );

        Self {
            latest,
            watched_order,
            subscriptions,
        }
    }

    /// Most recent event this bridge acted on
    pub fn latest_update(&self) -> Option<OrderEvent> {
        self.latest.lock().clone()
    }

    pub fn watched_order(&self) -> Option<&str> {
        self.watched_order.as_deref()
    }

    pub fn detach(self) {
        for subscription in &self.subscriptions {
            subscription.unsubscribe();
        }
    }
}

fn record(latest: &Mutex<Option<OrderEvent>>, event: &OrderEvent) {
    *latest.lock() = Some(event.clone());
}

fn apply_status_change(cache: &dyn QueryCache, event: &OrderEvent) {
    let Some(order_id) = event.order_id.as_deref() else {
        cache.invalidate(&OrderKeys::lists());
        return;
    };
    let detail = OrderKeys::detail(order_id);

    let status = event
        .payload::<OrderPayload>()
        .and_then(|payload| payload.normalized_status());
    if let Some(status) = status {
        let outcome = cache.patch(&detail, event.effective_time(), &mut |order| {
            if let Some(fields) = order.as_object_mut() {
                fields.insert("status".into(), serde_json::Value::String(status.clone()));
            }
        });
        match outcome {
            PatchOutcome::Applied => debug!(order_id, status = %status, "Optimistic status patch applied"),
            PatchOutcome::Missing => debug!(order_id, "Order detail not cached, skipping patch"),
            PatchOutcome::Superseded => {
                debug!(order_id, "Cached order is newer than the event, patch skipped")
            }
        }
    }

    cache.invalidate(&detail);
    cache.invalidate(&OrderKeys::lists());
}
