//! Shared fixtures: a scripted in-process transport and wait helpers

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use realtime_client::events::{EventDispatcher, SubscriptionRegistry};
use realtime_client::websocket::{ConnectionManager, ConnectionState, SocketLink, Transport};
use realtime_client::{RealtimeError, Result};
use resilience::push_feed_config;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

/// What the fake does for one `open` call
#[derive(Debug, Clone)]
pub enum Script {
    Accept,
    AcceptAfter(Duration),
    Refuse,
    /// Never completes; exercises the connect timeout
    Hang,
}

/// Server side of one accepted socket
struct ServerEnd {
    to_client: Option<mpsc::UnboundedSender<String>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

struct FakeState {
    script: VecDeque<Script>,
    fallback: Script,
    opens: Vec<(String, Instant)>,
    servers: Vec<ServerEnd>,
}

pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    pub fn scripted(script: Vec<Script>, fallback: Script) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(FakeState {
                script: script.into(),
                fallback,
                opens: Vec::new(),
                servers: Vec::new(),
            }),
        })
    }

    pub fn accepting() -> Arc<Self> {
        Self::scripted(vec![], Script::Accept)
    }

    pub fn refusing() -> Arc<Self> {
        Self::scripted(vec![], Script::Refuse)
    }

    pub fn hanging() -> Arc<Self> {
        Self::scripted(vec![], Script::Hang)
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().opens.len()
    }

    pub fn open_times(&self) -> Vec<Instant> {
        self.state.lock().opens.iter().map(|(_, at)| *at).collect()
    }

    pub fn urls(&self) -> Vec<String> {
        self.state.lock().opens.iter().map(|(url, _)| url.clone()).collect()
    }

    /// Gaps between consecutive open attempts
    pub fn open_gaps(&self) -> Vec<Duration> {
        self.open_times()
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .collect()
    }

    /// Deliver a text frame on the most recent socket
    pub fn push_frame(&self, text: impl Into<String>) {
        let state = self.state.lock();
        let server = state.servers.last().expect("no socket accepted yet");
        server
            .to_client
            .as_ref()
            .expect("socket already closed by server")
            .send(text.into())
            .expect("client side gone");
    }

    /// Close the most recent socket from the server side
    pub fn close_server(&self) {
        let mut state = self.state.lock();
        if let Some(server) = state.servers.last_mut() {
            server.to_client.take();
        }
    }

    /// Frames the client wrote on the most recent socket so far
    pub fn take_sent(&self) -> Vec<String> {
        let mut state = self.state.lock();
        let mut sent = Vec::new();
        if let Some(server) = state.servers.last_mut() {
            while let Ok(text) = server.from_client.try_recv() {
                sent.push(text);
            }
        }
        sent
    }

    fn accept(&self) -> SocketLink {
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        self.state.lock().servers.push(ServerEnd {
            to_client: Some(in_tx),
            from_client: out_rx,
        });
        SocketLink {
            outbound: out_tx,
            inbound: in_rx,
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn open(&self, url: &str) -> Result<SocketLink> {
        let step = {
            let mut state = self.state.lock();
            state.opens.push((url.to_string(), Instant::now()));
            let fallback = state.fallback.clone();
            state.script.pop_front().unwrap_or(fallback)
        };

        match step {
            Script::Accept => Ok(self.accept()),
            Script::AcceptAfter(delay) => {
                sleep(delay).await;
                Ok(self.accept())
            }
            Script::Refuse => Err(RealtimeError::Transport("connection refused".into())),
            Script::Hang => std::future::pending().await,
        }
    }
}

pub const TEST_URL: &str = "ws://push.test:8000";

pub fn manager(transport: &Arc<FakeTransport>) -> (ConnectionManager, EventDispatcher) {
    let dispatcher = EventDispatcher::new(SubscriptionRegistry::new());
    let manager = ConnectionManager::new(
        TEST_URL,
        push_feed_config(),
        Arc::clone(transport) as Arc<dyn Transport>,
        dispatcher.clone(),
    );
    (manager, dispatcher)
}

/// Wait (in virtual time) until the manager reaches `target`
pub async fn wait_for_state(manager: &ConnectionManager, target: ConnectionState) {
    let mut states = manager.state_changes();
    timeout(Duration::from_secs(600), states.wait_for(|state| *state == target))
        .await
        .unwrap_or_else(|_| panic!("never reached {target}, stuck in {}", manager.state()))
        .expect("state channel closed");
}

/// Let spawned reader and heartbeat tasks run
pub async fn settle() {
    sleep(Duration::from_millis(10)).await;
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn assert_close_to(actual: Duration, expected: Duration) {
    let diff = if actual > expected {
        actual - expected
    } else {
        expected - actual
    };
    assert!(
        diff <= Duration::from_millis(50),
        "expected ~{:?}, got {:?}",
        expected,
        actual
    );
}
