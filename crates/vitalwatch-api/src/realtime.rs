//! Realtime event channel with auto-reconnect.
//!
//! Owns at most one WebSocket connection to the telemetry server and
//! dispatches inbound frames to handlers registered per event type.
//! When the connection drops, a supervisor task retries with a fixed
//! delay until the attempt budget runs out.
//!
//! # Example
//!
//! ```rust,ignore
//! use vitalwatch_api::{RealtimeChannel, RealtimeConfig};
//!
//! let channel = RealtimeChannel::new(&base_url, RealtimeConfig::default())?;
//! channel.on("location_update", |data| println!("{data}"));
//! channel.on("disconnected", |data| eprintln!("lost: {data}"));
//!
//! if channel.connect().await {
//!     channel.send("subscribe", serde_json::json!({"zone": "A"}));
//! }
//! // ...
//! channel.disconnect();
//! ```
//!
//! # Handler contract
//!
//! Frames are dispatched one at a time, in arrival order, on the reader
//! task. All handlers for frame N return before frame N+1 is looked at,
//! so a slow handler stalls the whole channel. Handlers must not block;
//! hand heavy work off to another task.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::client::duration_millis;
use crate::error::Error;
use crate::frame::Frame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsRead = SplitStream<WsStream>;
type WsWrite = SplitSink<WsStream, Message>;

/// A subscriber callback. Receives the frame's `data` payload.
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

// ── Event names ──────────────────────────────────────────────────────

/// Synthetic event dispatched after every successful open.
pub const CONNECTED: &str = "connected";
/// Synthetic event dispatched when an established connection drops.
pub const DISCONNECTED: &str = "disconnected";
/// Synthetic event dispatched on handshake or stream errors.
pub const ERROR: &str = "error";
/// Frame the server expects right after the handshake.
pub const REGISTER: &str = "register";

/// Close code reported when the socket died without a close frame.
const ABNORMAL_CLOSE: u16 = 1006;

// ── Configuration ────────────────────────────────────────────────────

/// Reconnect policy and identity for a [`RealtimeChannel`].
#[derive(Debug, Clone)]
pub struct RealtimeConfig {
    /// Reconnect attempts after a drop before giving up. Default: 5.
    pub max_reconnect_attempts: u32,

    /// Fixed wait before each reconnect attempt. Default: 3s.
    pub reconnect_delay: Duration,

    /// Sent as `clientType` in the `register` frame. Default: `"dashboard"`.
    pub client_type: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_millis(3000),
            client_type: "dashboard".into(),
        }
    }
}

// ── ConnectionState ──────────────────────────────────────────────────

/// Lifecycle of the channel's single connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting out the delay before reconnect attempt `attempt`.
    Reconnecting { attempt: u32 },
}

impl ConnectionState {
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

// ── URL derivation ───────────────────────────────────────────────────

/// Derive the socket URL from the HTTP base URL.
///
/// `http` becomes `ws`, `https` becomes `wss`, and `/ws` is appended to
/// the base path.
pub fn websocket_url(base: &Url) -> Result<Url, Error> {
    let scheme = match base.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(Error::UnsupportedScheme(other.to_owned())),
    };

    let mut url = base.clone();
    url.set_scheme(scheme)
        .map_err(|()| Error::UnsupportedScheme(base.scheme().to_owned()))?;
    let path = format!("{}/ws", url.path().trim_end_matches('/'));
    url.set_path(&path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

// ── RealtimeChannel ──────────────────────────────────────────────────

/// Handle to the realtime channel.
///
/// Cheaply cloneable; all clones share one connection, one subscription
/// table and one state. Call [`disconnect`](Self::disconnect) to tear the
/// connection down and stop background reconnects.
#[derive(Clone)]
pub struct RealtimeChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    ws_url: Url,
    config: RealtimeConfig,
    state: watch::Sender<ConnectionState>,
    subscribers: RwLock<HashMap<String, Vec<Handler>>>,
    /// Writer queue of the live connection. `None` whenever not connected.
    outbound: Mutex<Option<mpsc::UnboundedSender<Message>>>,
    attempts: AtomicU32,
    /// Token for the current connection and its reconnect loop. Replaced
    /// on every explicit connect, cancelled on disconnect.
    session: Mutex<CancellationToken>,
}

/// Why an established connection ended.
#[derive(Debug)]
struct CloseInfo {
    code: u16,
    reason: String,
}

impl CloseInfo {
    fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: ABNORMAL_CLOSE,
            reason: reason.into(),
        }
    }
}

impl From<Option<CloseFrame>> for CloseInfo {
    fn from(frame: Option<CloseFrame>) -> Self {
        match frame {
            Some(cf) => Self {
                code: u16::from(cf.code),
                reason: cf.reason.to_string(),
            },
            // 1005: no status code present
            None => Self {
                code: 1005,
                reason: String::new(),
            },
        }
    }
}

impl RealtimeChannel {
    /// Create a channel for the server behind `base_url`. Does not connect.
    pub fn new(base_url: &Url, config: RealtimeConfig) -> Result<Self, Error> {
        let ws_url = websocket_url(base_url)?;
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(ChannelInner {
                ws_url,
                config,
                state,
                subscribers: RwLock::new(HashMap::new()),
                outbound: Mutex::new(None),
                attempts: AtomicU32::new(0),
                session: Mutex::new(CancellationToken::new()),
            }),
        })
    }

    pub fn ws_url(&self) -> &Url {
        &self.inner.ws_url
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.state()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.state.subscribe()
    }

    /// Reconnect attempts made since the last successful open.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Open the connection.
    ///
    /// Returns `true` once the socket is open (immediately if already
    /// connected) and `false` if the handshake failed. An explicit call
    /// resets the reconnect budget and supersedes any pending automatic
    /// reconnect. A failed handshake enters the reconnect cycle.
    pub async fn connect(&self) -> bool {
        if self.state().is_connected() {
            debug!("realtime channel already connected");
            return true;
        }

        let session = self.inner.begin_session();
        self.inner.attempts.store(0, Ordering::SeqCst);

        match self.inner.establish(&session).await {
            Ok(read) => {
                tokio::spawn(supervise(Arc::clone(&self.inner), Start::Open(read), session));
                true
            }
            Err(_) if session.is_cancelled() => false,
            Err(err) => {
                warn!(url = %self.inner.ws_url, error = %err, "realtime connect failed");
                let next = self.inner.schedule_retry(&session);
                self.inner.report_error(&err);
                if let Some(attempt) = next {
                    tokio::spawn(supervise(Arc::clone(&self.inner), Start::Retry(attempt), session));
                }
                false
            }
        }
    }

    /// Send a `{type, data, timestamp}` frame.
    ///
    /// Frames sent while not connected are logged and dropped, never
    /// queued. Returns whether the frame was handed to the socket writer.
    pub fn send(&self, kind: &str, data: Value) -> bool {
        self.inner.send(kind, data)
    }

    /// Register `handler` for frames of type `kind`.
    ///
    /// Handlers accumulate: registering twice runs both, in order.
    pub fn on<F>(&self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let mut table = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        table.entry(kind.into()).or_default().push(Arc::new(handler));
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn disconnect(&self) {
        {
            // Held across the teardown so an in-flight handshake cannot
            // publish `Connected` in between.
            let session = lock(&self.inner.session);
            session.cancel();
            lock(&self.inner.outbound).take();
            self.inner.set_state(ConnectionState::Disconnected);
        }
        info!("realtime channel disconnected by caller");
    }
}

impl ChannelInner {
    fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let prev = self.state.send_replace(next);
        if prev != next {
            debug!(from = ?prev, to = ?next, "realtime state changed");
        }
    }

    fn begin_session(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut current = lock(&self.session);
        current.cancel();
        *current = token.clone();
        token
    }

    /// Open the socket and bring the connection fully up: writer task,
    /// `Connected` state, `register` frame, `connected` event.
    async fn establish(&self, session: &CancellationToken) -> Result<WsRead, Error> {
        self.set_state(ConnectionState::Connecting);
        info!(url = %self.ws_url, "connecting realtime channel");

        let handshake = tokio_tungstenite::connect_async(self.ws_url.as_str());
        let (stream, _response) = tokio::select! {
            biased;
            () = session.cancelled() => {
                return Err(Error::WebSocketConnect("connection attempt cancelled".into()));
            }
            result = handshake => result.map_err(|e| Error::WebSocketConnect(e.to_string()))?,
        };

        let (write, read) = stream.split();
        {
            let _current = lock(&self.session);
            if session.is_cancelled() {
                return Err(Error::WebSocketConnect("connection cancelled during handshake".into()));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            tokio::spawn(write_frames(write, rx, session.clone()));
            *lock(&self.outbound) = Some(tx);

            self.attempts.store(0, Ordering::SeqCst);
            self.set_state(ConnectionState::Connected);
        }
        info!("realtime channel connected");

        self.send(REGISTER, json!({ "clientType": self.config.client_type }));
        self.dispatch(CONNECTED, &json!({ "status": "connected" }));
        Ok(read)
    }

    fn send(&self, kind: &str, data: Value) -> bool {
        if !self.state().is_connected() {
            warn!(kind, "realtime channel not connected, dropping frame");
            return false;
        }

        let text = match Frame::new(kind, data).to_text() {
            Ok(text) => text,
            Err(e) => {
                warn!(kind, error = %e, "failed to encode frame");
                return false;
            }
        };

        let sent = lock(&self.outbound)
            .as_ref()
            .is_some_and(|tx| tx.send(Message::text(text)).is_ok());
        if sent {
            debug!(kind, "frame sent");
        } else {
            warn!(kind, "realtime writer gone, dropping frame");
        }
        sent
    }

    /// Invoke every handler for `kind` in registration order.
    ///
    /// A panicking handler is logged and skipped; the rest still run.
    fn dispatch(&self, kind: &str, data: &Value) -> usize {
        let handlers: Vec<Handler> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            trace!(kind, "no subscribers for event");
            return 0;
        }

        for (index, handler) in handlers.iter().enumerate() {
            let callback: &(dyn Fn(&Value) + Send + Sync) = &**handler;
            if catch_unwind(AssertUnwindSafe(|| callback(data))).is_err() {
                error!(kind, handler = index, "realtime handler panicked");
            }
        }
        handlers.len()
    }

    fn handle_text(&self, text: &str) {
        match Frame::parse(text) {
            Ok(frame) => {
                debug!(kind = %frame.kind, "frame received");
                self.dispatch(&frame.kind, &frame.data);
            }
            Err(e) => warn!(error = %e, "dropping malformed frame"),
        }
    }

    fn report_error(&self, err: &Error) {
        self.dispatch(ERROR, &json!({ "error": err.to_string() }));
    }

    /// Read frames until the connection ends.
    ///
    /// Returns `None` when the session was cancelled locally.
    async fn read_frames(&self, mut read: WsRead, session: &CancellationToken) -> Option<CloseInfo> {
        loop {
            tokio::select! {
                biased;
                () = session.cancelled() => return None,
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Binary(bytes))) => {
                        debug!(len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let close = CloseInfo::from(frame);
                        info!(code = close.code, reason = %close.reason, "realtime close frame received");
                        return Some(close);
                    }
                    Some(Ok(_)) => trace!("realtime control frame"),
                    Some(Err(e)) => {
                        let err = Error::WebSocketConnect(e.to_string());
                        self.report_error(&err);
                        return Some(CloseInfo::abnormal(e.to_string()));
                    }
                    None => return Some(CloseInfo::abnormal("stream ended")),
                }
            }
        }
    }

    /// Tear down after a drop, move to the next state, then announce it.
    ///
    /// Returns the reconnect attempt that was claimed, if any.
    fn connection_lost(&self, close: &CloseInfo, session: &CancellationToken) -> Option<u32> {
        lock(&self.outbound).take();
        warn!(code = close.code, reason = %close.reason, "realtime connection lost");
        let next = self.schedule_retry(session);
        self.dispatch(
            DISCONNECTED,
            &json!({ "code": close.code, "reason": close.reason }),
        );
        next
    }

    /// Claim the next reconnect attempt and enter `Reconnecting`, or enter
    /// `Disconnected` once the budget is spent. A cancelled session leaves
    /// the state alone.
    fn schedule_retry(&self, session: &CancellationToken) -> Option<u32> {
        let _current = lock(&self.session);
        if session.is_cancelled() {
            return None;
        }

        let max = self.config.max_reconnect_attempts;
        let attempt = self.attempts.load(Ordering::SeqCst);
        if attempt >= max {
            error!(max_attempts = max, "reconnect budget exhausted, realtime unavailable");
            self.set_state(ConnectionState::Disconnected);
            return None;
        }

        let attempt = attempt + 1;
        self.attempts.store(attempt, Ordering::SeqCst);
        self.set_state(ConnectionState::Reconnecting { attempt });
        Some(attempt)
    }

    /// Wait-and-retry from an already claimed attempt until a connection
    /// opens, the budget runs out, or the session is cancelled.
    async fn reconnect(&self, mut attempt: u32, session: &CancellationToken) -> Option<WsRead> {
        loop {
            info!(
                attempt,
                max_attempts = self.config.max_reconnect_attempts,
                delay_ms = duration_millis(self.config.reconnect_delay),
                "waiting before reconnect"
            );

            tokio::select! {
                biased;
                () = session.cancelled() => return None,
                () = tokio::time::sleep(self.config.reconnect_delay) => {}
            }

            // A disconnect or explicit connect may have landed meanwhile.
            if !matches!(self.state(), ConnectionState::Reconnecting { .. }) {
                debug!("state changed during backoff, abandoning reconnect");
                return None;
            }

            match self.establish(session).await {
                Ok(read) => return Some(read),
                Err(_) if session.is_cancelled() => return None,
                Err(err) => {
                    warn!(attempt, error = %err, "reconnect attempt failed");
                    let next = self.schedule_retry(session);
                    self.report_error(&err);
                    attempt = next?;
                }
            }
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────────

/// Connection supervisor: read until the connection drops, then
/// reconnect, until the budget runs out or the session is cancelled.
///
/// Starts either on an open stream or on a reconnect attempt already
/// claimed by a failed `connect`.
async fn supervise(inner: Arc<ChannelInner>, start: Start, session: CancellationToken) {
    let mut next = start;
    loop {
        let attempt = match next {
            Start::Open(stream) => {
                let Some(close) = inner.read_frames(stream, &session).await else {
                    break;
                };
                match inner.connection_lost(&close, &session) {
                    Some(attempt) => attempt,
                    None => break,
                }
            }
            Start::Retry(attempt) => attempt,
        };

        match inner.reconnect(attempt, &session).await {
            Some(stream) => next = Start::Open(stream),
            None => break,
        }
    }
    debug!("realtime supervisor exiting");
}

enum Start {
    Open(WsRead),
    Retry(u32),
}

/// Drain the outbound queue into the socket. Sends a close frame when the
/// session is cancelled.
async fn write_frames(
    mut write: WsWrite,
    mut rx: mpsc::UnboundedReceiver<Message>,
    session: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = session.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break;
            }
            msg = rx.recv() => match msg {
                Some(msg) => {
                    if let Err(e) = write.send(msg).await {
                        warn!(error = %e, "realtime write failed");
                        break;
                    }
                }
                None => break,
            }
        }
    }
    let _ = write.close().await;
    trace!("realtime writer exiting");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn channel() -> RealtimeChannel {
        let base = Url::parse("http://127.0.0.1:9").unwrap();
        RealtimeChannel::new(&base, RealtimeConfig::default()).unwrap()
    }

    #[test]
    fn default_config() {
        let config = RealtimeConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_delay, Duration::from_millis(3000));
        assert_eq!(config.client_type, "dashboard");
    }

    #[test]
    fn websocket_url_swaps_scheme_and_appends_ws() {
        let https = Url::parse("https://telemetry.example.com").unwrap();
        assert_eq!(
            websocket_url(&https).unwrap().as_str(),
            "wss://telemetry.example.com/ws"
        );

        let http = Url::parse("http://localhost:8080/base/").unwrap();
        assert_eq!(
            websocket_url(&http).unwrap().as_str(),
            "ws://localhost:8080/base/ws"
        );
    }

    #[test]
    fn websocket_url_rejects_other_schemes() {
        let ftp = Url::parse("ftp://example.com").unwrap();
        assert!(matches!(websocket_url(&ftp), Err(Error::UnsupportedScheme(s)) if s == "ftp"));
    }

    #[test]
    fn starts_disconnected() {
        let ch = channel();
        assert_eq!(ch.state(), ConnectionState::Disconnected);
        assert_eq!(ch.reconnect_attempts(), 0);
    }

    #[test]
    fn send_while_disconnected_is_dropped() {
        let ch = channel();
        assert!(!ch.send("telemetry", json!({"heart_rate": 80})));
    }

    #[test]
    fn handlers_run_in_order_even_after_a_panic() {
        let ch = channel();
        let calls = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&calls);
        ch.on("alert", move |_| {
            first.lock().unwrap().push("first");
            panic!("handler failure");
        });
        let second = Arc::clone(&calls);
        ch.on("alert", move |data| {
            second.lock().unwrap().push("second");
            assert_eq!(data["level"], "critical");
        });

        let ran = ch.inner.dispatch("alert", &json!({"level": "critical"}));

        assert_eq!(ran, 2);
        assert_eq!(*calls.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn inbound_text_routes_by_type() {
        let ch = channel();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        ch.on("status_change", move |data| {
            assert_eq!(data["status"], "offline");
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ch.inner
            .handle_text(r#"{"type":"status_change","data":{"status":"offline"}}"#);
        ch.inner.handle_text(r#"{"type":"other","data":{}}"#);
        ch.inner.handle_text("{garbage");
        ch.inner.handle_text(r#"{"data":{"status":"offline"}}"#);

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispatch_without_subscribers_is_a_noop() {
        let ch = channel();
        assert_eq!(ch.inner.dispatch("nobody", &Value::Null), 0);
    }

    #[test]
    fn disconnect_forces_disconnected_and_cancels_session() {
        let ch = channel();
        let session = ch.inner.begin_session();
        ch.inner.set_state(ConnectionState::Reconnecting { attempt: 2 });

        ch.disconnect();

        assert!(session.is_cancelled());
        assert_eq!(ch.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn close_info_from_frame() {
        let info = CloseInfo::from(None);
        assert_eq!(info.code, 1005);
        assert_eq!(CloseInfo::abnormal("gone").code, 1006);
    }
}
