use crate::error::{RealtimeError, Result};
use dotenvy::dotenv;
use resilience::{push_feed_config, ConnectionPreset};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_WS_URL: &str = "ws://localhost:8000";
const DEFAULT_API_URL: &str = "http://localhost:8000/api/v1";
const DEFAULT_NOTIFICATION_CAPACITY: usize = 100;

#[derive(Debug, Clone)]
pub struct Config {
    /// Push feed endpoint (`ws://` or `wss://`)
    pub ws_url: String,
    /// REST base URL, handed to consumers that refetch invalidated queries
    pub api_base_url: String,
    /// Skip the socket entirely (environments without a push backend)
    pub websocket_disabled: bool,
    /// Bearer credential appended to the socket URL as `?token=`
    pub auth_token: Option<String>,
    /// Order whose detail query is kept fresh on any matching event
    pub watch_order_id: Option<String>,
    pub connection: ConnectionPreset,
    /// Maximum notifications kept in memory
    pub notification_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_URL.to_string(),
            websocket_disabled: false,
            auth_token: None,
            watch_order_id: None,
            connection: push_feed_config(),
            notification_capacity: DEFAULT_NOTIFICATION_CAPACITY,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let ws_url = non_empty("WS_URL").unwrap_or(defaults.ws_url);
        if !(ws_url.starts_with("ws://") || ws_url.starts_with("wss://")) {
            return Err(RealtimeError::Config(format!(
                "WS_URL must start with ws:// or wss://, got {}",
                ws_url
            )));
        }

        let mut connection = defaults.connection;
        connection.backoff.initial_backoff = Duration::from_millis(parse_var(
            &lookup,
            "WS_RECONNECT_BASE_MS",
            connection.backoff.initial_backoff.as_millis() as u64,
        )?);
        connection.backoff.max_attempts = parse_var(
            &lookup,
            "WS_MAX_RECONNECT_ATTEMPTS",
            connection.backoff.max_attempts,
        )?;
        connection.heartbeat_interval = Duration::from_secs(parse_var(
            &lookup,
            "WS_HEARTBEAT_SECS",
            connection.heartbeat_interval.as_secs(),
        )?);
        connection.connect_timeout.duration = Duration::from_secs(parse_var(
            &lookup,
            "WS_CONNECT_TIMEOUT_SECS",
            connection.connect_timeout.duration.as_secs(),
        )?);

        if connection.backoff.initial_backoff.is_zero() {
            return Err(RealtimeError::Config(
                "WS_RECONNECT_BASE_MS must be positive".into(),
            ));
        }
        if connection.heartbeat_interval.is_zero() {
            return Err(RealtimeError::Config("WS_HEARTBEAT_SECS must be positive".into()));
        }
        if connection.connect_timeout.duration.is_zero() {
            return Err(RealtimeError::Config(
                "WS_CONNECT_TIMEOUT_SECS must be positive".into(),
            ));
        }

        let notification_capacity =
            parse_var(&lookup, "NOTIFICATION_CAPACITY", defaults.notification_capacity)?;
        if notification_capacity == 0 {
            return Err(RealtimeError::Config(
                "NOTIFICATION_CAPACITY must be positive".into(),
            ));
        }

        Ok(Self {
            ws_url,
            api_base_url: non_empty("API_URL").unwrap_or(defaults.api_base_url),
            websocket_disabled: lookup("WEBSOCKET_DISABLED")
                .map(|v| v.trim().eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            auth_token: non_empty("AUTH_TOKEN"),
            watch_order_id: non_empty("WATCH_ORDER_ID"),
            connection,
            notification_capacity,
        })
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|_| RealtimeError::Config(format!("{} has invalid value {:?}", key, raw))),
        _ => Ok(default),
    }
}
