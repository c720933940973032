//! Streaming connection to the event source.
//!
//! Owns at most one WebSocket at a time. On close or error the supervisor
//! schedules exactly one reconnection attempt after a fixed delay — no
//! backoff, retried indefinitely; the right shape for a local single-peer
//! deployment. Status is observable through a watch channel, and the
//! reconnect sleep races shutdown so teardown cancels every pending timer.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::{Notify, mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::model::WireMessage;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection lifecycle, as surfaced to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket endpoint, e.g. `ws://localhost:4000/stream`.
    pub url: String,
    /// Fixed delay between reconnection attempts.
    pub reconnect_delay: Duration,
}

impl StreamConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_millis(3_000),
        }
    }
}

/// Handle to the stream supervisor task.
///
/// Messages arrive through `recv`; parsed frames only — malformed frames
/// are logged and dropped inside the reader, never surfaced as failures.
pub struct StreamClient {
    status: watch::Receiver<ConnectionStatus>,
    messages: mpsc::UnboundedReceiver<WireMessage>,
    shutdown: Arc<Notify>,
}

impl StreamClient {
    /// Spawn the supervisor and connect immediately.
    pub fn spawn(config: StreamConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        tokio::spawn(supervise(config, status_tx, msg_tx, Arc::clone(&shutdown)));

        Self {
            status: status_rx,
            messages: msg_rx,
            shutdown,
        }
    }

    /// A fresh observer of the connection status.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Next parsed message. None once the supervisor has exited.
    pub async fn recv(&mut self) -> Option<WireMessage> {
        self.messages.recv().await
    }

    /// Ask the supervisor to close the connection and exit.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

/// Why a read session ended.
enum ReadEnd {
    Shutdown,
    Closed,
    Failed,
}

async fn supervise(
    config: StreamConfig,
    status: watch::Sender<ConnectionStatus>,
    messages: mpsc::UnboundedSender<WireMessage>,
    shutdown: Arc<Notify>,
) {
    loop {
        let _ = status.send(ConnectionStatus::Connecting);
        info!(url = %config.url, "connecting to event stream");

        tokio::select! {
            _ = shutdown.notified() => {
                let _ = status.send(ConnectionStatus::Disconnected);
                return;
            }
            conn = connect_async(config.url.as_str()) => match conn {
                Ok((ws, _)) => {
                    let _ = status.send(ConnectionStatus::Connected);
                    info!("event stream connected");
                    match read_frames(ws, &messages, &shutdown).await {
                        ReadEnd::Shutdown => {
                            let _ = status.send(ConnectionStatus::Disconnected);
                            return;
                        }
                        ReadEnd::Closed => {
                            let _ = status.send(ConnectionStatus::Disconnected);
                        }
                        ReadEnd::Failed => {
                            let _ = status.send(ConnectionStatus::Error);
                        }
                    }
                }
                Err(e) => {
                    warn!("stream connect failed: {e}");
                    let _ = status.send(ConnectionStatus::Error);
                }
            }
        }

        // Fixed-interval retry. Racing shutdown here is what cancels the
        // pending reconnect timer on teardown.
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = status.send(ConnectionStatus::Disconnected);
                return;
            }
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }
}

/// Read frames until the peer closes, the socket errors, or shutdown.
async fn read_frames(
    mut ws: WsStream,
    messages: &mpsc::UnboundedSender<WireMessage>,
    shutdown: &Notify,
) -> ReadEnd {
    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                let _ = ws.close(None).await;
                return ReadEnd::Shutdown;
            }
            frame = ws.next() => match frame {
                None => {
                    info!("event stream closed by peer");
                    return ReadEnd::Closed;
                }
                Some(Err(e)) => {
                    warn!("event stream error: {e}");
                    return ReadEnd::Failed;
                }
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<WireMessage>(&text) {
                        Ok(msg) => {
                            if messages.send(msg).is_err() {
                                // Receiver dropped; nothing left to feed.
                                return ReadEnd::Shutdown;
                            }
                        }
                        Err(e) => debug!("malformed frame dropped: {e}"),
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("event stream closed by peer");
                    return ReadEnd::Closed;
                }
                // Pings are answered by the library; binary frames are not
                // part of the protocol.
                Some(Ok(_)) => {}
            }
        }
    }
}
