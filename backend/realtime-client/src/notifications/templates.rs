/// Event to notification derivation
use event_schema::{EventType, NotificationPayload, OrderEvent, OrderPayload};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationKind {
    /// Unknown or missing values fall back to `Info`
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("success") => NotificationKind::Success,
            Some("error") => NotificationKind::Error,
            Some("warning") => NotificationKind::Warning,
            _ => NotificationKind::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    /// Server timestamp of the originating event
    pub timestamp: String,
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
}

struct Template {
    id_prefix: &'static str,
    kind: NotificationKind,
    title: &'static str,
}

fn template_for(event_type: EventType) -> Option<Template> {
    let (id_prefix, kind, title) = match event_type {
        EventType::OrderCreated => ("order-created", NotificationKind::Success, "Order Created"),
        EventType::OrderStatusChanged => {
            ("order-status", NotificationKind::Info, "Order Status Updated")
        }
        EventType::PaymentProcessed => (
            "payment-processed",
            NotificationKind::Success,
            "Payment Processed",
        ),
        EventType::PaymentFailed => ("payment-failed", NotificationKind::Error, "Payment Failed"),
        EventType::ShipmentDelivered => (
            "shipment-delivered",
            NotificationKind::Success,
            "Order Delivered",
        ),
        _ => return None,
    };
    Some(Template {
        id_prefix,
        kind,
        title,
    })
}

/// Build the notification an event produces, if any.
///
/// Order templates read `orderNumber` and `status` from the payload; a missing
/// order number falls back to the order id.
pub fn derive(event: &OrderEvent) -> Option<Notification> {
    if event.event_type == EventType::Notification {
        return Some(from_server_payload(event));
    }

    let template = template_for(event.event_type)?;
    let payload = event.payload::<OrderPayload>().unwrap_or_default();
    let order_number = payload
        .order_number
        .as_deref()
        .or(event.order_id.as_deref())
        .unwrap_or("unknown");

    let message = match event.event_type {
        EventType::OrderCreated => format!("New order {} has been created", order_number),
        EventType::OrderStatusChanged => format!(
            "Order {} status changed to {}",
            order_number,
            payload.status.as_deref().unwrap_or("unknown")
        ),
        EventType::PaymentProcessed => format!(
            "Payment for order {} has been processed successfully",
            order_number
        ),
        EventType::PaymentFailed => format!("Payment for order {} has failed", order_number),
        EventType::ShipmentDelivered => format!("Order {} has been delivered", order_number),
        _ => return None,
    };

    let order_ref = event.order_id.as_deref().unwrap_or("unknown");
    Some(Notification {
        id: format!("{}-{}-{}", template.id_prefix, order_ref, Uuid::new_v4()),
        kind: template.kind,
        title: template.title.to_string(),
        message,
        timestamp: event.timestamp.clone(),
        read: false,
        action_url: event.order_id.as_ref().map(|id| format!("/orders/{}", id)),
        order_id: event.order_id.clone(),
    })
}

fn from_server_payload(event: &OrderEvent) -> Notification {
    let payload = event.payload::<NotificationPayload>().unwrap_or_default();
    Notification {
        id: payload
            .id
            .unwrap_or_else(|| format!("notif-{}", Uuid::new_v4())),
        kind: NotificationKind::parse_lenient(payload.kind.as_deref()),
        title: payload.title.unwrap_or_default(),
        message: payload.message.unwrap_or_default(),
        timestamp: event.timestamp.clone(),
        read: false,
        action_url: payload.action_url,
        order_id: event.order_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_order_created_template() {
        let event = OrderEvent::new(EventType::OrderCreated, json!({"orderNumber": "ORD-100"}))
            .with_order_id("100");
        let n = derive(&event).unwrap();

        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.title, "Order Created");
        assert_eq!(n.message, "New order ORD-100 has been created");
        assert_eq!(n.action_url.as_deref(), Some("/orders/100"));
        assert!(n.id.starts_with("order-created-100-"));
        assert!(!n.read);
    }

    #[test]
    fn test_status_changed_template() {
        let event = OrderEvent::new(
            EventType::OrderStatusChanged,
            json!({"orderNumber": "ORD-7", "status": "shipped"}),
        )
        .with_order_id("7");
        let n = derive(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::Info);
        assert_eq!(n.message, "Order ORD-7 status changed to shipped");
    }

    #[test]
    fn test_payment_failed_is_error() {
        let event = OrderEvent::new(EventType::PaymentFailed, json!({"orderNumber": "ORD-9"}))
            .with_order_id("9");
        let n = derive(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.message, "Payment for order ORD-9 has failed");
    }

    #[test]
    fn test_unmapped_events_produce_nothing() {
        for event_type in [
            EventType::OrderUpdated,
            EventType::ShipmentCreated,
            EventType::ShipmentUpdated,
        ] {
            assert!(derive(&OrderEvent::new(event_type, json!({}))).is_none());
        }
    }

    #[test]
    fn test_server_notification_defaults() {
        let event = OrderEvent::new(
            EventType::Notification,
            json!({"type": "bogus", "title": "Heads up", "message": "Stock low"}),
        );
        let n = derive(&event).unwrap();
        assert_eq!(n.kind, NotificationKind::Info);
        assert_eq!(n.title, "Heads up");
        assert!(n.id.starts_with("notif-"));

        let event = OrderEvent::new(
            EventType::Notification,
            json!({"id": "n-1", "type": "warning", "actionUrl": "/orders/3"}),
        );
        let n = derive(&event).unwrap();
        assert_eq!(n.id, "n-1");
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(n.action_url.as_deref(), Some("/orders/3"));
    }

    #[test]
    fn test_notification_wire_shape() {
        let event = OrderEvent::new(EventType::ShipmentDelivered, json!({"orderNumber": "ORD-2"}))
            .with_order_id("2");
        let value = serde_json::to_value(derive(&event).unwrap()).unwrap();
        assert_eq!(value["type"], "success");
        assert_eq!(value["actionUrl"], "/orders/2");
        assert_eq!(value["orderId"], "2");
    }
}
