use anyhow::Context;
use cache_invalidation::{InMemoryQueryCache, QueryCache};
use realtime_client::{Config, ConnectionState, RealtimeClient, Topic};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(
        ws_url = %config.ws_url,
        api_url = %config.api_base_url,
        "Starting order realtime client"
    );

    if config.websocket_disabled {
        tracing::info!("WEBSOCKET_DISABLED is set, nothing to do");
        return Ok(());
    }

    let client = RealtimeClient::from_config(config);
    if !client.notifications().request_permission().await {
        tracing::warn!("Desktop notifications not permitted");
    }

    let cache = Arc::new(InMemoryQueryCache::new());
    let _bridge = client.order_updates(Arc::clone(&cache) as Arc<dyn QueryCache>, None);
    let _event_log = client.subscribe(Topic::All, |event| {
        tracing::debug!(
            event_type = %event.event_type,
            order_id = ?event.order_id,
            timestamp = %event.timestamp,
            "Order event received"
        );
    });

    let lease = client.start().await;
    let mut states = client
        .state_changes()
        .context("Connection manager not available")?;

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result.context("Failed to listen for shutdown signal")?;
                tracing::info!("Shutdown signal received");
                break;
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                match state {
                    ConnectionState::GaveUp => tracing::warn!(
                        "Push feed unreachable, running offline until restarted"
                    ),
                    other => tracing::info!(state = %other, "Connection state changed"),
                }
            }
        }
    }

    drop(lease);
    client.stop();

    let dispatch = client.dispatcher().stats();
    let invalidation = cache.stats();
    tracing::info!(
        frames = dispatch.frames_received,
        dropped = dispatch.frames_dropped,
        deliveries = dispatch.deliveries,
        listener_failures = dispatch.listener_failures,
        invalidations = invalidation.invalidations,
        patches = invalidation.patches_applied,
        notifications = client.notifications().notifications().len(),
        unread = client.notifications().unread_count(),
        "Order realtime client stopped"
    );

    Ok(())
}
