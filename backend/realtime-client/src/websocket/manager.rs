/// WebSocket Connection Manager
///
/// Owns the single push-feed socket for a client session:
/// - Connect with a timeout, optionally authenticated by a token query parameter
/// - Reconnect with exponential backoff after unexpected closes
/// - Heartbeat pings while connected
/// - Reference-counted leases so independent consumers share one socket
///
/// Inbound text frames are handed to the `EventDispatcher`; the manager never
/// interprets them.
use super::state::ConnectionState;
use super::transport::{SocketLink, Transport};
use crate::events::EventDispatcher;
use chrono::Utc;
use event_schema::OutboundFrame;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use resilience::{Backoff, ConnectionPreset};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Handle to the push-feed connection. Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

struct Inner {
    base_url: String,
    preset: ConnectionPreset,
    transport: Arc<dyn Transport>,
    dispatcher: EventDispatcher,
    shared: Mutex<Shared>,
    state_tx: watch::Sender<ConnectionState>,
    leases: AtomicUsize,
}

struct Shared {
    backoff: Backoff,
    intentionally_closed: bool,
    credential: Option<String>,
    /// Bumped for every attempt and on disconnect; callbacks from older
    /// attempts compare against it and bail out.
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<String>>,
    reader: Option<JoinHandle<()>>,
    heartbeat: Option<JoinHandle<()>>,
    retry: Option<JoinHandle<()>>,
}

impl Shared {
    fn stop_tasks(&mut self) {
        for handle in [self.reader.take(), self.heartbeat.take(), self.retry.take()]
            .into_iter()
            .flatten()
        {
            handle.abort();
        }
        self.outbound = None;
    }
}

impl ConnectionManager {
    pub fn new(
        base_url: impl Into<String>,
        preset: ConnectionPreset,
        transport: Arc<dyn Transport>,
        dispatcher: EventDispatcher,
    ) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        let backoff = Backoff::new(preset.backoff.clone());

        Self {
            inner: Arc::new(Inner {
                base_url: base_url.into(),
                preset,
                transport,
                dispatcher,
                shared: Mutex::new(Shared {
                    backoff,
                    intentionally_closed: false,
                    credential: None,
                    generation: 0,
                    outbound: None,
                    reader: None,
                    heartbeat: None,
                    retry: None,
                }),
                state_tx,
                leases: AtomicUsize::new(0),
            }),
        }
    }

    /// Open the socket if it is not already open or being opened.
    ///
    /// Resolves once the attempt started here (or the one already in flight)
    /// has settled, whether or not it succeeded. Failures are reported through
    /// the state channel, never as an error. While a reconnect is pending this
    /// returns immediately and leaves the schedule alone.
    pub async fn connect(&self, credential: Option<String>) {
        let generation = {
            let mut shared = self.inner.shared.lock();
            // Kept for the next open in every state, including pending reconnects
            if credential.is_some() {
                shared.credential = credential;
            }
            match self.state() {
                ConnectionState::Connected | ConnectionState::Reconnecting => return,
                ConnectionState::Connecting => None,
                ConnectionState::Disconnected
                | ConnectionState::Closed
                | ConnectionState::GaveUp => {
                    shared.intentionally_closed = false;
                    shared.backoff.reset();
                    Some(self.inner.begin_attempt(&mut shared))
                }
            }
        };

        match generation {
            Some(generation) => Arc::clone(&self.inner).establish(generation).await,
            None => {
                let mut changes = self.inner.state_tx.subscribe();
                let _ = changes
                    .wait_for(|state| *state != ConnectionState::Connecting)
                    .await;
            }
        }
    }

    /// Close the socket and cancel any pending reconnect.
    pub fn disconnect(&self) {
        let mut shared = self.inner.shared.lock();
        shared.intentionally_closed = true;
        shared.generation += 1;
        shared.stop_tasks();

        let previous = self.inner.state_tx.send_replace(ConnectionState::Closed);
        if previous != ConnectionState::Closed {
            info!(url = %self.inner.base_url, "WebSocket disconnected by client");
        }
    }

    /// Send one `{event, data}` frame. Returns false when not connected.
    pub fn send(&self, event: &str, data: serde_json::Value) -> bool {
        let frame = OutboundFrame::new(event, data);
        if self.inner.send_frame(&frame) {
            true
        } else {
            warn!(event, "WebSocket is not connected, frame dropped");
            false
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.state_tx.borrow()
    }

    /// Receiver observing every state transition
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state_tx.subscribe()
    }

    /// Reconnect attempts made since the last successful open
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.shared.lock().backoff.attempts()
    }

    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.inner.dispatcher
    }

    /// Take a share of the connection, connecting if needed.
    ///
    /// The socket is closed when the last outstanding lease is dropped.
    pub async fn acquire(&self, credential: Option<String>) -> ConnectionLease {
        self.inner.leases.fetch_add(1, Ordering::SeqCst);
        let lease = ConnectionLease {
            manager: self.clone(),
        };
        self.connect(credential).await;
        lease
    }

    pub fn lease_count(&self) -> usize {
        self.inner.leases.load(Ordering::SeqCst)
    }
}

impl Inner {
    /// Start a new attempt. Caller holds the lock.
    fn begin_attempt(&self, shared: &mut Shared) -> u64 {
        shared.generation += 1;
        self.state_tx.send_replace(ConnectionState::Connecting);
        shared.generation
    }

    fn socket_url(&self, credential: Option<&str>) -> String {
        socket_url(&self.base_url, credential)
    }

    fn establish(self: Arc<Self>, generation: u64) -> BoxFuture<'static, ()> {
        async move {
            let url = {
                let shared = self.shared.lock();
                self.socket_url(shared.credential.as_deref())
            };
            info!(url = %self.base_url, generation, "Connecting to WebSocket");

            match self.preset.connect_timeout.run(self.transport.open(&url)).await {
                Ok(Ok(link)) => self.on_open(generation, link),
                Ok(Err(e)) => {
                    warn!(error = %e, url = %self.base_url, "WebSocket connection failed");
                    self.on_close(generation);
                }
                Err(e) => {
                    warn!(error = %e, url = %self.base_url, "WebSocket connection timed out");
                    self.on_close(generation);
                }
            }
        }
        .boxed()
    }

    fn on_open(self: &Arc<Self>, generation: u64, link: SocketLink) {
        let mut shared = self.shared.lock();
        if shared.generation != generation || shared.intentionally_closed {
            debug!(generation, "Discarding socket from superseded attempt");
            return;
        }

        let SocketLink { outbound, inbound } = link;
        shared.backoff.reset();
        shared.outbound = Some(outbound);
        shared.reader = Some(tokio::spawn(read_loop(
            Arc::downgrade(self),
            generation,
            inbound,
        )));
        shared.heartbeat = Some(tokio::spawn(heartbeat_loop(
            Arc::downgrade(self),
            self.preset.heartbeat_interval,
        )));

        self.state_tx.send_replace(ConnectionState::Connected);
        info!(url = %self.base_url, "WebSocket connected");
    }

    fn on_close(self: &Arc<Self>, generation: u64) {
        let mut shared = self.shared.lock();
        if shared.generation != generation {
            return;
        }

        shared.outbound = None;
        if let Some(heartbeat) = shared.heartbeat.take() {
            heartbeat.abort();
        }
        // may be the current task; detach rather than abort
        let _ = shared.reader.take();

        if shared.intentionally_closed {
            self.state_tx.send_replace(ConnectionState::Closed);
            return;
        }

        match shared.backoff.next_delay() {
            Some(delay) => {
                info!(
                    attempt = shared.backoff.attempts(),
                    max_attempts = shared.backoff.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    "Scheduling WebSocket reconnect"
                );
                self.state_tx.send_replace(ConnectionState::Reconnecting);
                shared.retry = Some(tokio::spawn(retry_after(
                    Arc::downgrade(self),
                    generation,
                    delay,
                )));
            }
            None => {
                self.state_tx.send_replace(ConnectionState::GaveUp);
                warn!(
                    url = %self.base_url,
                    attempts = shared.backoff.attempts(),
                    "Max reconnection attempts reached, giving up"
                );
            }
        }
    }

    fn send_frame(&self, frame: &OutboundFrame) -> bool {
        let shared = self.shared.lock();
        if !self.state_tx.borrow().is_connected() {
            return false;
        }
        let Some(outbound) = shared.outbound.as_ref() else {
            return false;
        };

        match frame.to_json() {
            Ok(text) => outbound.send(text).is_ok(),
            Err(e) => {
                error!(error = %e, event = %frame.event, "Failed to serialize outbound frame");
                false
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shared.get_mut().stop_tasks();
    }
}

async fn read_loop(
    manager: Weak<Inner>,
    generation: u64,
    mut inbound: mpsc::UnboundedReceiver<String>,
) {
    while let Some(text) = inbound.recv().await {
        let Some(inner) = manager.upgrade() else {
            return;
        };
        inner.dispatcher.dispatch_frame(&text);
    }

    if let Some(inner) = manager.upgrade() {
        info!(url = %inner.base_url, "WebSocket closed");
        inner.on_close(generation);
    }
}

async fn heartbeat_loop(manager: Weak<Inner>, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(inner) = manager.upgrade() else {
            return;
        };
        if inner.send_frame(&OutboundFrame::ping(Utc::now().timestamp_millis())) {
            debug!("Heartbeat ping sent");
        }
    }
}

async fn retry_after(manager: Weak<Inner>, scheduled_at: u64, delay: Duration) {
    sleep(delay).await;

    let Some(inner) = manager.upgrade() else {
        return;
    };
    let generation = {
        let mut shared = inner.shared.lock();
        if shared.generation != scheduled_at
            || shared.intentionally_closed
            || *inner.state_tx.borrow() != ConnectionState::Reconnecting
        {
            return;
        }
        let _ = shared.retry.take();
        inner.begin_attempt(&mut shared)
    };
    inner.establish(generation).await;
}

/// Append the credential as a `token` query parameter
pub fn socket_url(base: &str, credential: Option<&str>) -> String {
    match credential {
        Some(token) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{}{}token={}", base, separator, urlencoding::encode(token))
        }
        None => base.to_string(),
    }
}

/// Share of a `ConnectionManager`; see [`ConnectionManager::acquire`].
#[must_use = "dropping the lease releases the connection"]
pub struct ConnectionLease {
    manager: ConnectionManager,
}

impl ConnectionLease {
    pub fn manager(&self) -> &ConnectionManager {
        &self.manager
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        if self.manager.inner.leases.fetch_sub(1, Ordering::SeqCst) == 1 {
            debug!("Last connection lease released");
            self.manager.disconnect();
        }
    }
}
