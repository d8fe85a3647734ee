//! Connection Manager: one live WebSocket per game session, using tokio-tungstenite.
//!
//! A single session task owns the socket, the heartbeat timer and the reconnect
//! timer. Inbound frames are handled one at a time on that task, so handler
//! dispatch for a frame always completes before the next frame is read.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use rulehaunt_domain::GameId;
use rulehaunt_shared::{parse_frame, FrameError, InboundFrame, InboundMessage, MessageKind, OutboundMessage};

use crate::infrastructure::messaging::{
    set_connection_state, ConnectionState, ConnectionStateObserver, EventBus, SubscriptionId,
};

use super::core::{BackoffState, ReconnectPolicy};
use super::error::ConnectionError;
use super::shared::{
    build_session_url, encode_outbound, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_HEARTBEAT_INTERVAL_MS,
    MIN_HEARTBEAT_INTERVAL_MS, OUTBOUND_QUEUE_CAPACITY, SHUTDOWN_GRACE_MS,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, Message>;
type WsReader = SplitStream<WsStream>;

type StateCallback = Box<dyn Fn(ConnectionState) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&ConnectionError) + Send + Sync>;

/// Settings for [`ConnectionManager`]
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// `ws://`, `wss://`, `http://` or `https://` base of the backend
    pub base_url: String,
    pub client_id: Option<String>,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub reconnect: ReconnectPolicy,
}

impl ConnectionConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            heartbeat_interval: Duration::from_millis(DEFAULT_HEARTBEAT_INTERVAL_MS),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Periods below [`MIN_HEARTBEAT_INTERVAL_MS`] are raised to it.
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval.max(Duration::from_millis(MIN_HEARTBEAT_INTERVAL_MS));
        self
    }

    pub fn with_reconnect_policy(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }

    /// Heartbeat period actually used; a zero period would never yield.
    pub fn heartbeat_period(&self) -> Duration {
        self.heartbeat_interval
            .max(Duration::from_millis(MIN_HEARTBEAT_INTERVAL_MS))
    }
}

/// Observable snapshot of the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub game_id: GameId,
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    pub last_sequence_seen: Option<u64>,
}

#[derive(Debug, Clone)]
struct SessionInfo {
    game_id: GameId,
    reconnect_attempts: u32,
    last_sequence_seen: Option<u64>,
    last_pong_at: Option<Instant>,
}

impl SessionInfo {
    fn new(game_id: GameId) -> Self {
        Self {
            game_id,
            reconnect_attempts: 0,
            last_sequence_seen: None,
            last_pong_at: None,
        }
    }
}

/// Session task bookkeeping held by the manager
struct ActiveSession {
    game_id: GameId,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// State shared between the manager and its session task
struct Inner {
    config: ConnectionConfig,
    state: Arc<AtomicU8>,
    bus: EventBus,
    session: Mutex<Option<SessionInfo>>,
    outbound: Mutex<Option<mpsc::Sender<OutboundMessage>>>,
    /// Cancels a handshake that is still in flight
    pending_connect: Mutex<Option<CancellationToken>>,
    on_state_change: RwLock<Option<StateCallback>>,
    on_error: RwLock<Option<ErrorCallback>>,
    on_failure: RwLock<Option<ErrorCallback>>,
}

impl Inner {
    fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, new_state: ConnectionState) {
        let previous = set_connection_state(&self.state, new_state);
        if previous == new_state {
            return;
        }
        tracing::debug!(from = %previous, to = %new_state, "Connection state changed");

        let callback = self
            .on_state_change
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ref cb) = *callback {
            cb(new_state);
        }
    }

    fn report_error(&self, error: &ConnectionError) {
        let callback = self.on_error.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(ref cb) = *callback {
            cb(error);
        }
    }

    fn report_failure(&self, error: &ConnectionError) {
        let callback = self
            .on_failure
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(ref cb) = *callback {
            cb(error);
        }
    }

    fn with_session<R>(&self, f: impl FnOnce(&mut SessionInfo) -> R) -> Option<R> {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
            .map(f)
    }

    fn set_session(&self, session: Option<SessionInfo>) {
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) = session;
    }

    fn set_outbound(&self, sender: Option<mpsc::Sender<OutboundMessage>>) {
        *self.outbound.lock().unwrap_or_else(PoisonError::into_inner) = sender;
    }

    fn last_sequence(&self) -> Option<u64> {
        self.with_session(|s| s.last_sequence_seen).flatten()
    }

    /// Handle one text frame. Returns a reply to send, if any.
    fn handle_text(&self, text: &str) -> Option<OutboundMessage> {
        let frame = match parse_frame(text) {
            Ok(frame) => frame,
            Err(FrameError::UnknownType(kind)) => {
                tracing::debug!(kind = %kind, "Ignoring frame of unknown type");
                return None;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Dropping malformed frame");
                self.report_error(&ConnectionError::Parse(e.to_string()));
                return None;
            }
        };

        if let Some(sequence) = frame.sequence {
            self.with_session(|s| {
                s.last_sequence_seen = Some(s.last_sequence_seen.map_or(sequence, |seen| seen.max(sequence)));
            });
        }

        match frame.message {
            InboundMessage::Ping => Some(OutboundMessage::Pong),
            InboundMessage::Pong => {
                tracing::trace!("Pong received");
                self.with_session(|s| s.last_pong_at = Some(Instant::now()));
                None
            }
            _ => {
                self.dispatch(&frame);
                None
            }
        }
    }

    fn dispatch(&self, frame: &InboundFrame) {
        let handled = self.bus.dispatch(frame);
        tracing::trace!(kind = %frame.kind(), handled, sequence = ?frame.sequence, "Frame dispatched");
    }
}

/// Why a live socket stopped being driven
enum SocketExit {
    /// `disconnect()` was requested
    Cancelled,
    /// The socket closed or failed without being asked to
    Lost(ConnectionError),
}

/// WebSocket session manager for one player.
///
/// Explicitly constructed and owned; share it behind an `Arc`.
pub struct ConnectionManager {
    inner: Arc<Inner>,
    active: tokio::sync::Mutex<Option<ActiveSession>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8())),
                bus: EventBus::new(),
                session: Mutex::new(None),
                outbound: Mutex::new(None),
                pending_connect: Mutex::new(None),
                on_state_change: RwLock::new(None),
                on_error: RwLock::new(None),
                on_failure: RwLock::new(None),
            }),
            active: tokio::sync::Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(Arc::clone(&self.inner.state))
    }

    /// Snapshot of the current session, if any. A session whose retry budget
    /// ran out reads as `None`.
    pub fn session(&self) -> Option<Session> {
        let state = self.state();
        if !state.is_in_session() {
            return None;
        }
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|info| Session {
                game_id: info.game_id.clone(),
                state,
                reconnect_attempts: info.reconnect_attempts,
                last_sequence_seen: info.last_sequence_seen,
            })
    }

    /// When the last `pong` arrived on the current session.
    pub fn last_pong_at(&self) -> Option<Instant> {
        self.inner.with_session(|s| s.last_pong_at).flatten()
    }

    pub fn set_on_state_change<F>(&self, callback: F)
    where
        F: Fn(ConnectionState) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_state_change
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Called for socket and parse errors of a live session.
    pub fn set_on_error<F>(&self, callback: F)
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_error
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Called once when the reconnect budget is exhausted.
    pub fn set_on_failure<F>(&self, callback: F)
    where
        F: Fn(&ConnectionError) + Send + Sync + 'static,
    {
        *self
            .inner
            .on_failure
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    /// Register a handler for frames of `kind`.
    ///
    /// `ping` and `pong` are answered internally and never reach handlers.
    pub fn on<F>(&self, kind: MessageKind, handler: F) -> SubscriptionId
    where
        F: Fn(&InboundFrame) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        if kind.is_control() {
            tracing::debug!(kind = %kind, "Handler registered for a control frame; it will not be called");
        }
        self.inner.bus.subscribe(kind, handler)
    }

    pub fn off(&self, kind: MessageKind, id: SubscriptionId) -> bool {
        self.inner.bus.unsubscribe(kind, id)
    }

    pub fn handler_count(&self, kind: MessageKind) -> usize {
        self.inner.bus.subscriber_count(kind)
    }

    /// Open the session for `game_id`.
    ///
    /// No-op when already connected to the same game. Any other session is
    /// torn down first; switching games also clears registered handlers.
    /// A failed handshake is returned as an error and is not retried.
    pub async fn connect(&self, game_id: impl Into<GameId>) -> Result<(), ConnectionError> {
        let game_id = game_id.into();
        let mut active = self.active.lock().await;

        if let Some(current) = active.as_ref() {
            if current.game_id == game_id && self.state() == ConnectionState::Connected {
                tracing::debug!(game_id = %game_id, "Already connected");
                return Ok(());
            }
        }

        if let Some(previous) = active.take() {
            let switching = previous.game_id != game_id;
            tracing::info!(previous = %previous.game_id, game_id = %game_id, "Closing previous session");
            self.shutdown(previous, switching).await;
        }

        let url = build_session_url(
            &self.inner.config.base_url,
            &game_id,
            self.inner.config.client_id.as_deref(),
        )?;

        self.inner.set_session(Some(SessionInfo::new(game_id.clone())));
        self.inner.set_state(ConnectionState::Connecting);

        let pending = CancellationToken::new();
        *self
            .inner
            .pending_connect
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(pending.clone());

        let opened = tokio::select! {
            _ = pending.cancelled() => Err(ConnectionError::Cancelled),
            result = open_socket(&url, self.inner.config.connect_timeout) => result,
        };

        *self
            .inner
            .pending_connect
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;

        let socket = match opened {
            Ok(socket) => socket,
            Err(e) => {
                tracing::error!(game_id = %game_id, error = %e, "Failed to connect");
                self.inner.set_session(None);
                self.inner.set_state(ConnectionState::Disconnected);
                return Err(e);
            }
        };

        tracing::info!(game_id = %game_id, url = %url, "Connected");

        let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
        self.inner.set_outbound(Some(tx));
        self.inner.set_state(ConnectionState::Connected);

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(
            Arc::clone(&self.inner),
            url,
            socket,
            rx,
            cancel.clone(),
        ));

        *active = Some(ActiveSession {
            game_id,
            cancel,
            task,
        });
        Ok(())
    }

    /// Close the session: cancel any pending reconnect, stop the heartbeat,
    /// close the socket and clear registered handlers. Safe to call at any time.
    pub async fn disconnect(&self) {
        if let Some(pending) = self
            .inner
            .pending_connect
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            pending.cancel();
        }

        let mut active = self.active.lock().await;
        match active.take() {
            Some(session) => {
                tracing::info!(game_id = %session.game_id, "Disconnecting");
                self.shutdown(session, true).await;
            }
            None => {
                self.inner.bus.clear();
                self.inner.set_session(None);
                self.inner.set_state(ConnectionState::Disconnected);
            }
        }
    }

    /// Queue a message for the socket.
    ///
    /// Returns `false` (and logs) when the socket is not open. There is no
    /// delivery guarantee.
    pub fn send(&self, message: OutboundMessage) -> bool {
        let kind = message.kind();
        if self.state() != ConnectionState::Connected {
            tracing::warn!(kind, state = %self.state(), "Cannot send: socket not open");
            return false;
        }

        let sender = self
            .inner
            .outbound
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(sender) = sender else {
            tracing::warn!(kind, "Cannot send: no active session");
            return false;
        };

        match sender.try_send(message) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(kind, error = %e, "Cannot send: outbound queue unavailable");
                false
            }
        }
    }

    async fn shutdown(&self, mut session: ActiveSession, clear_handlers: bool) {
        session.cancel.cancel();
        let grace = Duration::from_millis(SHUTDOWN_GRACE_MS);
        if tokio::time::timeout(grace, &mut session.task).await.is_err() {
            tracing::warn!(game_id = %session.game_id, "Session task did not stop in time; aborting");
            session.task.abort();
        }

        self.inner.set_outbound(None);
        self.inner.set_session(None);
        if clear_handlers {
            self.inner.bus.clear();
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Ok(active) = self.active.try_lock() {
            if let Some(session) = active.as_ref() {
                session.cancel.cancel();
            }
        }
    }
}

async fn open_socket(url: &Url, connect_timeout: Duration) -> Result<WsStream, ConnectionError> {
    match tokio::time::timeout(connect_timeout, connect_async(url.as_str())).await {
        Err(_) => Err(ConnectionError::Timeout(connect_timeout)),
        Ok(Err(e)) => Err(ConnectionError::Socket(e.to_string())),
        Ok(Ok((socket, _response))) => Ok(socket),
    }
}

async fn send_message(writer: &mut WsWriter, message: &OutboundMessage) -> Result<(), ConnectionError> {
    let json = match encode_outbound(message) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(kind = message.kind(), error = %e, "Failed to serialize outbound message");
            return Ok(());
        }
    };
    writer
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| ConnectionError::Socket(e.to_string()))
}

/// Session task: drive the socket, reconnect on loss, stop on cancel.
async fn run_session(
    inner: Arc<Inner>,
    url: Url,
    mut socket: WsStream,
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    cancel: CancellationToken,
) {
    let mut backoff = BackoffState::new(inner.config.reconnect);

    loop {
        match drive_socket(&inner, socket, &mut outbound_rx, &cancel).await {
            SocketExit::Cancelled => {
                tracing::debug!("Session task stopped");
                return;
            }
            SocketExit::Lost(reason) => {
                tracing::warn!(error = %reason, "Connection lost");
                inner.set_state(ConnectionState::Error);
                inner.report_error(&reason);
            }
        }

        socket = match reconnect(&inner, &url, &mut backoff, &cancel).await {
            Some(socket) => socket,
            None => {
                inner.set_outbound(None);
                return;
            }
        };
    }
}

/// Wait out the backoff and try again until connected, cancelled or out of budget.
async fn reconnect(
    inner: &Inner,
    url: &Url,
    backoff: &mut BackoffState,
    cancel: &CancellationToken,
) -> Option<WsStream> {
    loop {
        let Some(delay) = backoff.next_delay_and_advance() else {
            let attempts = backoff.attempts();
            tracing::error!(attempts, "Max reconnection attempts reached, giving up");
            inner.set_state(ConnectionState::Disconnected);
            inner.report_failure(&ConnectionError::RetriesExhausted { attempts });
            return None;
        };

        let attempt = backoff.attempts();
        inner.with_session(|s| s.reconnect_attempts = attempt);
        inner.set_state(ConnectionState::Reconnecting);
        tracing::info!(
            attempt,
            max_attempts = backoff.max_attempts(),
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Reconnection cancelled - intentional disconnect");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        inner.set_state(ConnectionState::Connecting);
        let opened = tokio::select! {
            _ = cancel.cancelled() => return None,
            result = open_socket(url, inner.config.connect_timeout) => result,
        };

        match opened {
            Ok(mut socket) => {
                tracing::info!(attempt, "Reconnected");
                backoff.reset();
                inner.with_session(|s| s.reconnect_attempts = 0);
                inner.set_state(ConnectionState::Connected);

                if let Some(last_sequence) = inner.last_sequence() {
                    let notice = OutboundMessage::Reconnect { last_sequence };
                    if let Ok(json) = encode_outbound(&notice) {
                        if let Err(e) = socket.send(Message::Text(json.into())).await {
                            tracing::warn!(error = %e, "Failed to send reconnect notice");
                        }
                    }
                }
                return Some(socket);
            }
            Err(e) => {
                tracing::warn!(attempt, error = %e, "Reconnection attempt failed");
                inner.set_state(ConnectionState::Error);
                inner.report_error(&e);
            }
        }
    }
}

/// Pump one socket until it is lost or the session is cancelled.
async fn drive_socket(
    inner: &Inner,
    socket: WsStream,
    outbound_rx: &mut mpsc::Receiver<OutboundMessage>,
    cancel: &CancellationToken,
) -> SocketExit {
    let (mut write, mut read): (WsWriter, WsReader) = socket.split();

    let period = inner.config.heartbeat_period();
    let mut heartbeat = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                if let Err(e) = write.send(Message::Close(None)).await {
                    tracing::debug!(error = %e, "Close frame not delivered");
                }
                return SocketExit::Cancelled;
            }

            _ = heartbeat.tick() => {
                if inner.state() == ConnectionState::Connected {
                    tracing::trace!("Heartbeat ping");
                    if let Err(e) = send_message(&mut write, &OutboundMessage::Ping).await {
                        return SocketExit::Lost(e);
                    }
                }
            }

            Some(message) = outbound_rx.recv() => {
                if let Err(e) = send_message(&mut write, &message).await {
                    return SocketExit::Lost(e);
                }
            }

            incoming = read.next() => {
                let text = match incoming {
                    Some(Ok(Message::Text(text))) => text.to_string(),
                    Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping non-UTF-8 binary frame");
                            continue;
                        }
                    },
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(frame = ?frame, "Server closed connection");
                        return SocketExit::Lost(ConnectionError::Socket("closed by server".to_string()));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "WebSocket error");
                        return SocketExit::Lost(ConnectionError::Socket(e.to_string()));
                    }
                    None => {
                        return SocketExit::Lost(ConnectionError::Socket("stream ended".to_string()));
                    }
                };

                if let Some(reply) = inner.handle_text(&text) {
                    if let Err(e) = send_message(&mut write, &reply).await {
                        return SocketExit::Lost(e);
                    }
                }
            }
        }
    }
}
