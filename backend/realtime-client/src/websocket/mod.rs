/// WebSocket push-feed client
///
/// Architecture:
/// 1. Transport: opens a socket and exposes it as text channels
/// 2. ConnectionManager: lifecycle, reconnect schedule, heartbeat, leases
/// 3. ConnectionState: observable lifecycle published on a watch channel

pub mod manager;
pub mod state;
pub mod transport;

pub use manager::{socket_url, ConnectionLease, ConnectionManager};
pub use state::ConnectionState;
pub use transport::{SocketLink, Transport, TungsteniteTransport};
