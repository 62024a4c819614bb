/// Preset configurations for push connections
use crate::backoff::BackoffConfig;
use crate::timeout::ConnectTimeout;
use std::time::Duration;

/// Configuration bundle for a long-lived push connection
#[derive(Debug, Clone)]
pub struct ConnectionPreset {
    pub connect_timeout: ConnectTimeout,
    pub backoff: BackoffConfig,
    pub heartbeat_interval: Duration,
}

impl Default for ConnectionPreset {
    fn default() -> Self {
        push_feed_config()
    }
}

/// Order push feed (dashboard WebSocket)
///
/// - Connect timeout: 10s
/// - Reconnect: 5 attempts, 1s doubling (1, 2, 4, 8, 16s), no jitter
/// - Heartbeat: every 30s
pub fn push_feed_config() -> ConnectionPreset {
    ConnectionPreset {
        connect_timeout: ConnectTimeout::from_secs(10),
        backoff: BackoffConfig {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            backoff_multiplier: 2.0,
            jitter: false,
        },
        heartbeat_interval: Duration::from_secs(30),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_feed_config() {
        let config = push_feed_config();
        assert_eq!(config.connect_timeout.duration, Duration::from_secs(10));
        assert_eq!(config.backoff.max_attempts, 5);
        assert_eq!(config.heartbeat_interval, Duration::from_secs(30));
        assert!(!config.backoff.jitter);
    }
}
