/// Event schema for the order push feed
///
/// Inbound frames arrive as JSON text:
/// `{ "type": "order.created", "data": {...}, "timestamp": "...", "userId": "...", "orderId": "..." }`
///
/// Outbound frames use `{ "event": "...", "data": {...} }`.
///
/// Every inbound event carries exactly one type from the fixed [`EventType`] set.
/// Frames with any other type are rejected at decode time and never reach listeners.
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod payloads;

pub use payloads::{NotificationPayload, OrderPayload, OrderStatus};

/// Outbound event name used for keepalive frames
pub const PING_EVENT: &str = "ping";

// ============================================================================
// EVENT TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "order.created")]
    OrderCreated,
    #[serde(rename = "order.updated")]
    OrderUpdated,
    #[serde(rename = "order.status_changed")]
    OrderStatusChanged,
    #[serde(rename = "payment.processed")]
    PaymentProcessed,
    #[serde(rename = "payment.failed")]
    PaymentFailed,
    #[serde(rename = "shipment.created")]
    ShipmentCreated,
    #[serde(rename = "shipment.updated")]
    ShipmentUpdated,
    #[serde(rename = "shipment.delivered")]
    ShipmentDelivered,
    #[serde(rename = "notification")]
    Notification,
}

impl EventType {
    pub const ALL: [EventType; 9] = [
        EventType::OrderCreated,
        EventType::OrderUpdated,
        EventType::OrderStatusChanged,
        EventType::PaymentProcessed,
        EventType::PaymentFailed,
        EventType::ShipmentCreated,
        EventType::ShipmentUpdated,
        EventType::ShipmentDelivered,
        EventType::Notification,
    ];

    /// Wire name of the event type
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::OrderCreated => "order.created",
            EventType::OrderUpdated => "order.updated",
            EventType::OrderStatusChanged => "order.status_changed",
            EventType::PaymentProcessed => "payment.processed",
            EventType::PaymentFailed => "payment.failed",
            EventType::ShipmentCreated => "shipment.created",
            EventType::ShipmentUpdated => "shipment.updated",
            EventType::ShipmentDelivered => "shipment.delivered",
            EventType::Notification => "notification",
        }
    }

    /// Whether the event concerns the order entity itself (drives cache invalidation)
    pub fn is_order_event(&self) -> bool {
        matches!(
            self,
            EventType::OrderCreated | EventType::OrderUpdated | EventType::OrderStatusChanged
        )
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| FrameError::UnknownType(s.to_string()))
    }
}

// ============================================================================
// FRAME DECODING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unknown event type: {0}")]
    UnknownType(String),
}

/// Loosely typed view of an inbound frame, used before the type is classified
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: serde_json::Value,
    #[serde(default)]
    timestamp: String,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    order_id: Option<String>,
}

/// A classified push event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    #[serde(default)]
    pub data: serde_json::Value,
    /// Server timestamp exactly as sent
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    /// Local receive time, never on the wire
    #[serde(skip, default = "Utc::now")]
    pub received_at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn new(event_type: EventType, data: serde_json::Value) -> Self {
        let now = Utc::now();
        Self {
            event_type,
            data,
            timestamp: now.to_rfc3339(),
            user_id: None,
            order_id: None,
            received_at: now,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Decode one inbound text frame
    pub fn decode(text: &str) -> Result<Self, FrameError> {
        let raw: RawFrame = serde_json::from_str(text)?;
        let event_type = raw.kind.parse::<EventType>()?;

        Ok(Self {
            event_type,
            data: raw.data,
            timestamp: raw.timestamp,
            user_id: raw.user_id,
            order_id: raw.order_id,
            received_at: Utc::now(),
        })
    }

    /// Server timestamp, when it parses as RFC 3339
    pub fn server_time(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Time used for ordering decisions: server time, else local receive time
    pub fn effective_time(&self) -> DateTime<Utc> {
        self.server_time().unwrap_or(self.received_at)
    }

    /// Decode the payload into a typed view; `None` if it does not fit
    pub fn payload<T: DeserializeOwned>(&self) -> Option<T> {
        serde_json::from_value(self.data.clone()).ok()
    }
}

// ============================================================================
// OUTBOUND
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundFrame {
    pub event: String,
    pub data: serde_json::Value,
}

impl OutboundFrame {
    pub fn new(event: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// Keepalive frame carrying epoch milliseconds
    pub fn ping(timestamp_ms: i64) -> Self {
        Self::new(PING_EVENT, serde_json::json!({ "timestamp": timestamp_ms }))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
