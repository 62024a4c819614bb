/// Socket transport seam
///
/// The manager only sees a pair of text channels. `TungsteniteTransport`
/// bridges them to a real socket; tests substitute a scripted transport.
use crate::error::Result;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};

/// An open socket as seen by the connection manager.
///
/// Dropping `outbound` closes the socket. `inbound` yields `None` once the
/// socket is gone, whichever side closed it.
#[derive(Debug)]
pub struct SocketLink {
    pub outbound: mpsc::UnboundedSender<String>,
    pub inbound: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Open a socket to `url` (credential already appended)
    async fn open(&self, url: &str) -> Result<SocketLink>;
}

#[derive(Debug, Clone, Default)]
pub struct TungsteniteTransport;

impl TungsteniteTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn open(&self, url: &str) -> Result<SocketLink> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (mut sink, mut stream) = ws_stream.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    outgoing = out_rx.recv() => match outgoing {
                        Some(text) => {
                            if let Err(e) = sink.send(Message::Text(text.into())).await {
                                warn!(error = %e, "Failed to send frame");
                                break;
                            }
                        }
                        None => {
                            debug!("Outbound channel dropped, closing socket");
                            let _ = sink.close().await;
                            break;
                        }
                    },
                    incoming = stream.next() => match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if in_tx.send(text.as_str().to_owned()).is_err() {
                                let _ = sink.close().await;
                                break;
                            }
                        }
                        Some(Ok(Message::Ping(payload))) => {
                            let _ = sink.send(Message::Pong(payload)).await;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "Server sent close frame");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket read error");
                            break;
                        }
                        None => break,
                    },
                }
            }
            // in_tx drops here, which ends the reader on the manager side
        });

        Ok(SocketLink {
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}
