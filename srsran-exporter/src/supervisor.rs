//! Connection lifecycle towards the gNB remote control server.
//!
//! ```text
//! Disconnected ──> Connecting ──> Subscribed ──> Closing ──> Disconnected
//!       ^              │                                          │
//!       │              └───────────── failure ───────────────────>│
//!       └──────────────────── reconnect delay ────────────────────┘
//! ```

use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use srsran_ws::{Endpoint, Message, WebSocket, WsError, connect_tcp};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tracing::{debug, info, trace, warn};

use crate::declarations::{
    LAST_MESSAGE_UNIXTIME, WS_CONNECTED, WS_CONNECTIONS_TOTAL, WS_MESSAGES_TOTAL,
};
use crate::mapping::MessageMapper;
use crate::store::SharedStore;

/// Subscribe command sent right after the upgrade.
pub const SUBSCRIBE_COMMAND: &str = "metrics_subscribe";

/// Produces the raw byte stream a WebSocket session runs over.
pub trait Connector: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Target of the upgrade request.
    fn endpoint(&self) -> &Endpoint;

    /// Open a fresh stream.
    fn connect(&self) -> impl Future<Output = srsran_ws::Result<Self::Stream>> + Send;
}

/// Plain TCP connector.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    endpoint: Endpoint,
    timeout: Duration,
}

impl TcpConnector {
    /// Create a connector for a `ws://` URL.
    pub fn new(url: &str, timeout: Duration) -> srsran_ws::Result<Self> {
        Ok(Self {
            endpoint: Endpoint::parse(url)?,
            timeout,
        })
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn connect(&self) -> impl Future<Output = srsran_ws::Result<TcpStream>> + Send {
        connect_tcp(&self.endpoint, self.timeout)
    }
}

/// Supervisor connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Subscribed,
    Closing,
}

/// How a session ended.
#[derive(Debug)]
pub enum SessionEnd {
    /// The server sent a close frame.
    ServerClosed(Option<u16>),
    /// Connect, handshake, subscribe or a read failed.
    Failed(WsError),
    /// Shutdown was requested.
    Shutdown,
}

/// Runs the connect / subscribe / receive loop forever.
pub struct IngestSupervisor<C: Connector> {
    connector: C,
    store: SharedStore,
    mapper: MessageMapper,
    reconnect_delay: Duration,
    max_message_bytes: usize,
    state: ConnectionState,
}

impl<C: Connector> IngestSupervisor<C> {
    /// Create a supervisor writing to `store`.
    pub fn new(connector: C, store: SharedStore, reconnect_delay: Duration) -> Self {
        Self {
            connector,
            mapper: MessageMapper::new(store.clone()),
            store,
            reconnect_delay,
            max_message_bytes: srsran_ws::DEFAULT_MAX_PAYLOAD,
            state: ConnectionState::Disconnected,
        }
    }

    /// Limit the size of a single upstream message.
    pub fn with_max_message_bytes(mut self, max_message_bytes: usize) -> Self {
        self.max_message_bytes = max_message_bytes;
        self
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Run until shutdown is requested, reconnecting after every session.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            host = %self.connector.endpoint().host,
            port = self.connector.endpoint().port,
            "Starting srsRAN metrics ingestion"
        );

        loop {
            match self.run_session(&mut shutdown).await {
                SessionEnd::Shutdown => break,
                SessionEnd::ServerClosed(code) => {
                    info!(?code, "Server closed the connection");
                }
                SessionEnd::Failed(e) => {
                    warn!(error = %e, "WebSocket session failed");
                }
            }

            info!(
                delay_secs = self.reconnect_delay.as_secs_f64(),
                "Reconnecting after delay"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = shutdown_requested(&mut shutdown) => break,
            }
        }

        info!("Ingestion stopped");
    }

    /// Run one connect / subscribe / receive cycle.
    ///
    /// Always leaves the supervisor in [`ConnectionState::Disconnected`]
    /// with the connectivity gauge at 0.
    pub async fn run_session(&mut self, shutdown: &mut watch::Receiver<bool>) -> SessionEnd {
        self.transition(ConnectionState::Connecting);
        self.store.inc(WS_CONNECTIONS_TOTAL);

        let end = match self.open().await {
            Ok(mut ws) => {
                self.store.set(WS_CONNECTED, 1.0, &[]);
                self.transition(ConnectionState::Subscribed);
                info!("Subscribed to gNB metrics");

                let end = tokio::select! {
                    end = self.receive(&mut ws) => end,
                    _ = shutdown_requested(shutdown) => SessionEnd::Shutdown,
                };

                self.transition(ConnectionState::Closing);
                if matches!(end, SessionEnd::ServerClosed(_) | SessionEnd::Shutdown) {
                    // Best effort; the stream is dropped right after.
                    if let Err(e) = ws.send_close(Some(1000)).await {
                        trace!(error = %e, "Failed to send close frame");
                    }
                }
                end
            }
            Err(e) => SessionEnd::Failed(e),
        };

        self.store.set(WS_CONNECTED, 0.0, &[]);
        self.transition(ConnectionState::Disconnected);
        end
    }

    /// Connect, upgrade and subscribe.
    async fn open(&self) -> srsran_ws::Result<WebSocket<C::Stream>> {
        let endpoint = self.connector.endpoint();
        info!(host = %endpoint.host, port = endpoint.port, "Connecting to gNB");

        let stream = self.connector.connect().await?;
        let mut ws = WebSocket::handshake(stream, endpoint)
            .await?
            .with_max_payload(self.max_message_bytes);

        let subscribe = serde_json::json!({ "cmd": SUBSCRIBE_COMMAND }).to_string();
        ws.send_text(&subscribe).await?;
        Ok(ws)
    }

    /// Receive until the server closes or the transport fails.
    ///
    /// Each message is fully applied before the next read.
    async fn receive(&self, ws: &mut WebSocket<C::Stream>) -> SessionEnd {
        loop {
            let message = match ws.recv_message().await {
                Ok(message) => message,
                Err(e) => return SessionEnd::Failed(e),
            };

            match message {
                Message::Text(text) => {
                    self.record_received();
                    self.mapper.handle_text(&text);
                }
                Message::Binary(data) => {
                    self.record_received();
                    self.mapper.reject(&format_args!(
                        "unexpected binary message of {} bytes",
                        data.len()
                    ));
                }
                Message::Ping(payload) => {
                    trace!(len = payload.len(), "Answering ping");
                    if let Err(e) = ws.send_pong(&payload).await {
                        return SessionEnd::Failed(e);
                    }
                }
                Message::Pong(_) => {}
                Message::Close(code) => return SessionEnd::ServerClosed(code),
            }
        }
    }

    fn record_received(&self) {
        self.store.inc(WS_MESSAGES_TOTAL);
        self.store.set(LAST_MESSAGE_UNIXTIME, unix_now(), &[]);
    }

    fn transition(&mut self, next: ConnectionState) {
        debug!(from = ?self.state, to = ?next, "Connection state change");
        self.state = next;
    }
}

/// Resolve once shutdown is signalled. Never resolves if the sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
