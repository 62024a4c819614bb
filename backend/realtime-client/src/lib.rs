/// Order Realtime Client
///
/// Client side of the order push feed:
/// - `websocket`: connection lifecycle, reconnect backoff, heartbeat
/// - `events`: frame decoding and typed listener fan-out
/// - `bridge`: query-cache invalidation and optimistic status patches
/// - `notifications`: derived user notifications with read state
pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod notifications;
pub mod websocket;

pub use client::RealtimeClient;
pub use config::Config;
pub use error::{RealtimeError, Result};
pub use events::{EventDispatcher, Subscription, SubscriptionRegistry, Topic};
pub use websocket::{ConnectionLease, ConnectionManager, ConnectionState};
