/// Composition root wiring connection, routing, cache bridge and notifications
use crate::bridge::OrderUpdates;
use crate::config::Config;
use crate::events::{EventDispatcher, Subscription, SubscriptionRegistry, Topic};
use crate::notifications::{DesktopNotifier, NotificationCenter, TracingNotifier};
use crate::websocket::{
    ConnectionLease, ConnectionManager, ConnectionState, Transport, TungsteniteTransport,
};
use cache_invalidation::QueryCache;
use event_schema::OrderEvent;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

pub struct RealtimeClient {
    config: Config,
    dispatcher: EventDispatcher,
    connection: Option<ConnectionManager>,
    notifications: NotificationCenter,
    _notification_feed: Subscription,
}

impl RealtimeClient {
    pub fn new(
        config: Config,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn DesktopNotifier>,
    ) -> Self {
        let dispatcher = EventDispatcher::new(SubscriptionRegistry::new());

        let connection = if config.websocket_disabled {
            info!("WebSocket disabled by configuration");
            None
        } else {
            Some(ConnectionManager::new(
                config.ws_url.clone(),
                config.connection.clone(),
                transport,
                dispatcher.clone(),
            ))
        };

        let notifications = NotificationCenter::new(config.notification_capacity, notifier);
        let notification_feed = notifications.attach(dispatcher.registry());

        Self {
            config,
            dispatcher,
            connection,
            notifications,
            _notification_feed: notification_feed,
        }
    }

    /// Production wiring: tungstenite transport, tracing notifier
    pub fn from_config(config: Config) -> Self {
        Self::new(
            config,
            Arc::new(TungsteniteTransport::new()),
            Arc::new(TracingNotifier::new()),
        )
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `None` when the socket is disabled
    pub fn connection(&self) -> Option<&ConnectionManager> {
        self.connection.as_ref()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        self.dispatcher.registry()
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn subscribe<F>(&self, topic: impl Into<Topic>, listener: F) -> Subscription
    where
        F: Fn(&OrderEvent) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(topic, listener)
    }

    /// Attach a cache bridge; `watched_order` defaults to the configured one
    pub fn order_updates(
        &self,
        cache: Arc<dyn QueryCache>,
        watched_order: Option<String>,
    ) -> OrderUpdates {
        let watched = watched_order.or_else(|| self.config.watch_order_id.clone());
        OrderUpdates::attach(self.registry(), cache, watched)
    }

    /// Connect with the configured credential. `None` when the socket is disabled.
    pub async fn start(&self) -> Option<ConnectionLease> {
        let connection = self.connection.as_ref()?;
        Some(connection.acquire(self.config.auth_token.clone()).await)
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(ConnectionManager::is_connected)
    }

    pub fn state_changes(&self) -> Option<watch::Receiver<ConnectionState>> {
        self.connection.as_ref().map(ConnectionManager::state_changes)
    }

    /// Force the socket closed regardless of outstanding leases
    pub fn stop(&self) {
        if let Some(connection) = &self.connection {
            connection.disconnect();
        }
    }
}
