// file: src/connection.rs
// description: persistent WebSocket connection lifecycle with bounded-retry reconnection

use crate::{
    config::Config,
    dispatcher::EventDispatcher,
    error::SecwatchError,
    events::{Envelope, EventData},
    monitoring::{CONNECTED_GAUGE, FRAMES_RECEIVED, RECONNECTS, SENDS_REJECTED},
    types::{ConnectionClosed, ConnectionEstablished},
};
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Connection lifecycle states.
///
/// `Offline` is terminal: the retry budget is spent and nothing further is
/// scheduled until `connect()` is called explicitly again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Reconnecting,
    Closed,
    Offline,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
            ConnectionState::Offline => "offline",
        };
        f.write_str(s)
    }
}

struct ConnectionInner {
    state: ConnectionState,
    reconnect_attempts: u32,
    intentional_close: bool,
    outbound: Option<mpsc::UnboundedSender<Message>>,
    // pending retry modeled as an explicit handle so disconnect() can cancel
    // it deterministically
    reconnect_timer: Option<JoinHandle<()>>,
    session_task: Option<JoinHandle<()>>,
    frames_received: u64,
    last_frame_at: Option<DateTime<Utc>>,
    connected_since: Option<DateTime<Utc>>,
}

impl ConnectionInner {
    fn new() -> Self {
        Self {
            state: ConnectionState::Idle,
            reconnect_attempts: 0,
            intentional_close: false,
            outbound: None,
            reconnect_timer: None,
            session_task: None,
            frames_received: 0,
            last_frame_at: None,
            connected_since: None,
        }
    }
}

/// Diagnostic projection of the connection's counters.
#[derive(Debug, Clone)]
pub struct ConnectionHealth {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub frames_received: u64,
    pub last_frame_at: Option<DateTime<Utc>>,
    pub connected_since: Option<DateTime<Utc>>,
}

impl ConnectionHealth {
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "state": self.state.to_string(),
            "reconnect_attempts": self.reconnect_attempts,
            "frames_received": self.frames_received,
            "last_frame_at": self.last_frame_at,
            "connected_since": self.connected_since,
            "timestamp": Utc::now(),
        })
    }
}

enum CloseAction {
    Stay,
    GiveUp,
    Retry { attempt: u32 },
}

/// Owns one logical connection to the dashboard's event endpoint.
///
/// The handle itself is never recreated; only the underlying transport is
/// replaced across reconnects, and at most one transport is live at a time.
/// All methods are non-blocking: `connect()` spawns the session task and
/// returns, resolution arrives later as `connection.*` envelopes through the
/// dispatcher.
#[derive(Clone)]
pub struct ConnectionManager {
    config: Arc<Config>,
    dispatcher: Arc<EventDispatcher>,
    inner: Arc<Mutex<ConnectionInner>>,
}

impl ConnectionManager {
    pub fn new(config: Arc<Config>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            config,
            dispatcher,
            inner: Arc::new(Mutex::new(ConnectionInner::new())),
        }
    }

    /// Begin establishing the transport. No-op while already open or a
    /// connect/reconnect is in flight; a fresh call after `Closed`/`Offline`
    /// restores the full retry budget.
    pub fn connect(&self) {
        {
            let mut inner = self.lock();
            match inner.state {
                ConnectionState::Open
                | ConnectionState::Connecting
                | ConnectionState::Reconnecting => {
                    debug!(state = %inner.state, "connect() ignored");
                    return;
                }
                _ => {}
            }
            inner.intentional_close = false;
            inner.reconnect_attempts = 0;
            inner.state = ConnectionState::Connecting;
        }
        info!(url = %self.config.connection.url, "connecting");
        self.spawn_session();
    }

    /// Tear down the transport and suppress any pending reconnection.
    pub fn disconnect(&self) {
        let emit_closed = {
            let mut inner = self.lock();
            inner.intentional_close = true;
            if let Some(timer) = inner.reconnect_timer.take() {
                timer.abort();
            }
            if let Some(task) = inner.session_task.take() {
                task.abort();
            }
            inner.outbound = None;
            inner.connected_since = None;
            let was_closed = matches!(
                inner.state,
                ConnectionState::Closed | ConnectionState::Offline | ConnectionState::Idle
            );
            inner.state = ConnectionState::Closed;
            !was_closed
        };
        CONNECTED_GAUGE.set(0.0);
        if emit_closed {
            info!("disconnected");
            self.dispatcher
                .emit(&Envelope::local(EventData::ConnectionClosed(
                    ConnectionClosed {
                        reason: Some("client disconnect".to_string()),
                    },
                )));
        }
    }

    /// Fire-and-forget send. Only queues while open; otherwise the message
    /// is dropped with a warning and `false` is returned.
    pub fn send(&self, data: EventData) -> bool {
        let inner = self.lock();
        if inner.state != ConnectionState::Open {
            SENDS_REJECTED.increment(1);
            let err = SecwatchError::SendRejected { state: inner.state };
            warn!(error = %err, event = %data.event_type(), "dropping outbound message");
            return false;
        }
        let Some(outbound) = inner.outbound.as_ref() else {
            SENDS_REJECTED.increment(1);
            let err = SecwatchError::SendRejected { state: inner.state };
            warn!(error = %err, "dropping outbound message: no transport writer");
            return false;
        };
        match Envelope::local(data).encode() {
            Ok(json) => outbound.send(Message::Text(json.into())).is_ok(),
            Err(e) => {
                warn!(error = %e, "failed to encode outbound envelope");
                false
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.lock().state == ConnectionState::Open
    }

    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.lock().reconnect_attempts
    }

    pub fn health(&self) -> ConnectionHealth {
        let inner = self.lock();
        ConnectionHealth {
            state: inner.state,
            reconnect_attempts: inner.reconnect_attempts,
            frames_received: inner.frames_received,
            last_frame_at: inner.last_frame_at,
            connected_since: inner.connected_since,
        }
    }

    fn spawn_session(&self) {
        // spawn and store under one lock so a concurrent disconnect() can
        // never observe the task without its handle
        let mut inner = self.lock();
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            manager.run_session().await;
        });
        inner.session_task = Some(handle);
    }

    async fn run_session(self) {
        let url = self.config.connection.url.clone();
        let connect_timeout = self.config.connection.connect_timeout;

        let ws_stream = match timeout(connect_timeout, connect_async(url.as_str())).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(e)) => {
                let err = SecwatchError::Transport(e);
                error!(error = %err, "failed to open transport");
                self.finish_session(Some(err));
                return;
            }
            Err(_) => {
                error!(timeout_secs = connect_timeout.as_secs(), "handshake timed out");
                self.finish_session(Some(SecwatchError::ConnectTimeout));
                return;
            }
        };

        let (mut write, mut read) = ws_stream.split();
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

        {
            let mut inner = self.lock();
            // disconnect() may have raced the handshake
            if inner.intentional_close {
                inner.state = ConnectionState::Closed;
                return;
            }
            inner.state = ConnectionState::Open;
            inner.reconnect_attempts = 0;
            inner.outbound = Some(outbound_tx);
            inner.connected_since = Some(Utc::now());
        }
        CONNECTED_GAUGE.set(1.0);
        info!(url = %url, "transport established");
        self.dispatcher
            .emit(&Envelope::local(EventData::ConnectionEstablished(
                ConnectionEstablished {
                    url: url.to_string(),
                },
            )));

        let writer = tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if write.send(message).await.is_err() {
                    break;
                }
            }
            let _ = write.close().await;
        });

        let mut close_reason: Option<SecwatchError> = None;
        while let Some(frame) = read.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    self.note_frame();
                    // each frame is dispatched to completion before the next
                    // is read, so handlers never see interleaved frames
                    self.dispatcher.dispatch_text(text.as_str());
                }
                Ok(Message::Binary(data)) => {
                    warn!(bytes = data.len(), "ignoring binary frame");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "peer closed the connection");
                    close_reason = Some(SecwatchError::ConnectionClosed);
                    break;
                }
                Ok(Message::Frame(_)) => {}
                Err(e) => {
                    warn!(error = %e, "transport stream error");
                    close_reason = Some(SecwatchError::Transport(e));
                    break;
                }
            }
        }

        writer.abort();
        self.finish_session(close_reason);
    }

    /// Common exit path for handshake failures and dropped transports;
    /// decides between staying closed, giving up, and scheduling a retry.
    fn finish_session(&self, error: Option<SecwatchError>) {
        CONNECTED_GAUGE.set(0.0);
        let reason = error.map(|e| e.to_string());
        let max_reconnects = self.config.connection.max_reconnects;

        let (action, emit_closed) = {
            let mut inner = self.lock();
            inner.outbound = None;
            inner.connected_since = None;
            let was_closed = matches!(
                inner.state,
                ConnectionState::Closed | ConnectionState::Offline
            );
            if inner.intentional_close {
                inner.state = ConnectionState::Closed;
                (CloseAction::Stay, !was_closed)
            } else {
                inner.reconnect_attempts += 1;
                if max_reconnects > 0 && inner.reconnect_attempts >= max_reconnects {
                    inner.state = ConnectionState::Offline;
                    (CloseAction::GiveUp, true)
                } else {
                    inner.state = ConnectionState::Reconnecting;
                    (
                        CloseAction::Retry {
                            attempt: inner.reconnect_attempts,
                        },
                        true,
                    )
                }
            }
        };

        if emit_closed {
            self.dispatcher
                .emit(&Envelope::local(EventData::ConnectionClosed(
                    ConnectionClosed { reason },
                )));
        }

        match action {
            CloseAction::Stay => {}
            CloseAction::GiveUp => {
                error!(
                    error = %SecwatchError::MaxReconnectsExceeded,
                    max_reconnects,
                    "giving up; connection is offline"
                );
            }
            CloseAction::Retry { attempt } => {
                RECONNECTS.increment(1);
                let delay = self.config.connection.reconnect_delay;
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "scheduling reconnect"
                );
                self.schedule_retry();
            }
        }
    }

    fn schedule_retry(&self) {
        let delay = self.config.connection.reconnect_delay;
        let mut inner = self.lock();
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            sleep(delay).await;
            let proceed = {
                let mut inner = manager.lock();
                if inner.intentional_close || inner.state != ConnectionState::Reconnecting {
                    false
                } else {
                    inner.state = ConnectionState::Connecting;
                    true
                }
            };
            if proceed {
                manager.spawn_session();
            }
        });
        inner.reconnect_timer = Some(handle);
    }

    fn note_frame(&self) {
        FRAMES_RECEIVED.increment(1);
        let mut inner = self.lock();
        inner.frames_received += 1;
        inner.last_frame_at = Some(Utc::now());
    }

    fn lock(&self) -> MutexGuard<'_, ConnectionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
