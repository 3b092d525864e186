use anyhow::{Context, Result};
use chrono::Utc;
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::events::{ClientMessage, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

/// Transport-level settings. The keepalive knobs are configurable so tests
/// can run the liveness cycle in milliseconds.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Base endpoint, `http(s)://` or `ws(s)://`.
    pub base_url: String,
    /// How often to send a `client.ping`.
    pub ping_interval: Duration,
    /// How long to wait for `server.pong` before declaring the link dead.
    pub pong_timeout: Duration,
}

impl WsConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ping_interval: Duration::from_secs(15),
            pong_timeout: Duration::from_secs(30),
        }
    }
}

/// Connection notifications delivered to the client's owner, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum WsEvent {
    /// The socket opened and the session-start message was queued.
    Connected,
    /// The socket is gone, for any reason.
    Disconnected,
    /// A keepalive pong did not arrive in time; the socket was force-closed.
    /// Always followed by `Disconnected`.
    LivenessFailure,
    /// A well-formed server event (pongs are intercepted and never appear).
    Event(ServerEvent),
}

enum Command {
    Audio(Vec<u8>),
    Control(ClientMessage),
    Close,
}

/// WebSocket client for one meeting session at a time.
///
/// Owns only socket and timer state; parsed events are handed to the owner
/// through the event channel and never touch domain state directly.
pub struct WsClient {
    config: WsConfig,
    event_tx: mpsc::UnboundedSender<WsEvent>,
    cmd_tx: Option<mpsc::UnboundedSender<Command>>,
    task: Option<JoinHandle<()>>,
}

impl WsClient {
    /// Create a client that reports connection events on `event_tx`.
    pub fn new(config: WsConfig, event_tx: mpsc::UnboundedSender<WsEvent>) -> Self {
        Self {
            config,
            event_tx,
            cmd_tx: None,
            task: None,
        }
    }

    /// Open a socket for `session_id` and send `start` as the first frame.
    pub async fn connect(&mut self, session_id: &str, start: ClientMessage) -> Result<()> {
        self.disconnect().await;

        let url = session_url(&self.config.base_url, session_id);
        info!("Connecting to meeting session at {}", url);

        let (ws, _) = connect_async(&url)
            .await
            .with_context(|| format!("Failed to connect to {url}"))?;

        let _ = self.event_tx.send(WsEvent::Connected);

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(run_socket(
            ws,
            cmd_rx,
            self.event_tx.clone(),
            self.config.clone(),
            start,
        ));

        self.cmd_tx = Some(cmd_tx);
        self.task = Some(task);
        Ok(())
    }

    /// Disconnect-then-connect with a fresh session id. The server has no
    /// notion of resuming a dead session; continuity is client-side.
    pub async fn reconnect(&mut self, session_id: &str, start: ClientMessage) -> Result<()> {
        self.disconnect().await;
        self.connect(session_id, start).await
    }

    /// Close the socket. Safe to call repeatedly or while disconnected.
    pub async fn disconnect(&mut self) {
        if let Some(cmd_tx) = self.cmd_tx.take() {
            let _ = cmd_tx.send(Command::Close);
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Socket task panicked: {}", e);
            }
        }
    }

    /// Send a PCM chunk as a binary frame. Silently dropped while the
    /// socket is not open; there is no queuing.
    pub fn send_audio(&self, chunk: Vec<u8>) {
        if let Some(cmd_tx) = &self.cmd_tx {
            let _ = cmd_tx.send(Command::Audio(chunk));
        }
    }

    /// Send a JSON control message. Silently dropped while not open.
    pub fn send_control(&self, message: ClientMessage) {
        if let Some(cmd_tx) = &self.cmd_tx {
            let _ = cmd_tx.send(Command::Control(message));
        }
    }

    /// Whether the socket task is still running.
    pub fn is_connected(&self) -> bool {
        self.cmd_tx
            .as_ref()
            .map_or(false, |cmd_tx| !cmd_tx.is_closed())
    }
}

/// Build the session URL from the base endpoint, mapping `http(s)` to
/// `ws(s)` and trimming a trailing slash.
pub fn session_url(base_url: &str, session_id: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws_base = if trimmed.starts_with("ws://") || trimmed.starts_with("wss://") {
        trimmed.to_string()
    } else if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    };
    format!("{ws_base}/ws/v1/meetings/{session_id}")
}

/// Socket task: owns the stream, the keepalive cycle and the pong timeout.
async fn run_socket(
    ws: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<WsEvent>,
    config: WsConfig,
    start: ClientMessage,
) {
    let (mut sink, mut stream) = ws.split();

    if send_control_frame(&mut sink, &start).await.is_err() {
        let _ = event_tx.send(WsEvent::Disconnected);
        return;
    }

    // First ping after one full interval, not immediately.
    let mut ping = tokio::time::interval_at(
        Instant::now() + config.ping_interval,
        config.ping_interval,
    );
    let mut pong_deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            _ = ping.tick() => {
                let message = ClientMessage::ClientPing {
                    ts: Utc::now().timestamp_millis(),
                };
                if send_control_frame(&mut sink, &message).await.is_err() {
                    let _ = event_tx.send(WsEvent::Disconnected);
                    return;
                }
                // Arm the timeout only when no ping is outstanding; an
                // unanswered ping's deadline must survive later pings or a
                // half-open connection is never detected.
                if pong_deadline.is_none() {
                    pong_deadline = Some(Instant::now() + config.pong_timeout);
                }
            }

            _ = sleep_until_opt(pong_deadline), if pong_deadline.is_some() => {
                warn!("Keepalive pong timed out, forcing disconnect");
                let _ = sink.close().await;
                let _ = event_tx.send(WsEvent::LivenessFailure);
                let _ = event_tx.send(WsEvent::Disconnected);
                return;
            }

            command = cmd_rx.recv() => match command {
                Some(Command::Audio(chunk)) => {
                    if sink.send(Message::Binary(chunk.into())).await.is_err() {
                        let _ = event_tx.send(WsEvent::Disconnected);
                        return;
                    }
                }
                Some(Command::Control(message)) => {
                    if send_control_frame(&mut sink, &message).await.is_err() {
                        let _ = event_tx.send(WsEvent::Disconnected);
                        return;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = sink.close().await;
                    let _ = event_tx.send(WsEvent::Disconnected);
                    return;
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(ServerEvent::ServerPong { .. }) => {
                            pong_deadline = None;
                        }
                        Ok(event) => {
                            let _ = event_tx.send(WsEvent::Event(event));
                        }
                        Err(e) => {
                            warn!("Dropping malformed server frame: {}", e);
                        }
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    let _ = sink.send(Message::Pong(payload)).await;
                }
                Some(Ok(Message::Close(_))) | None => {
                    let _ = event_tx.send(WsEvent::Disconnected);
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!("WebSocket read error: {}", e);
                    let _ = event_tx.send(WsEvent::Disconnected);
                    return;
                }
            },
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn send_control_frame(sink: &mut WsSink, message: &ClientMessage) -> Result<()> {
    let json = serde_json::to_string(message).context("Failed to encode control message")?;
    sink.send(Message::Text(json.into()))
        .await
        .context("Failed to send control message")?;
    Ok(())
}
