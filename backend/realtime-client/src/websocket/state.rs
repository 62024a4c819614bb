/// Connection lifecycle states
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Never connected
    Disconnected,
    /// Opening attempt in flight
    Connecting,
    Connected,
    /// Waiting out a backoff delay before the next attempt
    Reconnecting,
    /// Closed by the caller; no automatic reconnection
    Closed,
    /// Reconnect budget exhausted
    GaveUp,
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        matches!(self, ConnectionState::Connected)
    }

    /// States from which nothing happens until `connect` is called again
    pub fn is_idle(self) -> bool {
        matches!(
            self,
            ConnectionState::Disconnected | ConnectionState::Closed | ConnectionState::GaveUp
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
            ConnectionState::GaveUp => "gave_up",
        }
    }
}

impl Default for ConnectionState {
    fn default() -> Self {
        ConnectionState::Disconnected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
