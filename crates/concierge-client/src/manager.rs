//! The connection manager: one logical relay connection per session.
//!
//! Owns a single outbound WebSocket for the lifetime of an authenticated
//! session and keeps it alive through an explicit state machine:
//!
//! ```text
//! Disconnected → Connecting → Connected
//!        ↑            │           │
//!        └── ReconnectScheduled ←─┘   (close / error, attempts < 10)
//! ```
//!
//! The whole lifecycle runs in one spawned task driven by `tokio::select!`
//! — connect, read loop, 30 s heartbeat, and the single cancellable backoff
//! sleep per scheduled retry. There are no nested timer callbacks, so
//! teardown is one token cancellation: it closes the open transport and
//! kills any pending retry sleep.
//!
//! After ten consecutive failed attempts the manager parks in
//! `Disconnected` and stays there silently. The UI detects prolonged
//! disconnection through staleness, not through an error event; CRUD data
//! remains fetchable on demand the whole time.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use futures::{SinkExt as _, StreamExt as _};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use concierge_core::backoff::reconnect_delay;
use concierge_core::constants::HEARTBEAT_INTERVAL;
use concierge_core::frame::{EventFrame, PING_FRAME};
use concierge_core::ids::{HotelId, UserId};

use crate::subscriptions::{Subscription, SubscriptionTable};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ─────────────────────────────────────────────────────────────────────────────
// Identity and state
// ─────────────────────────────────────────────────────────────────────────────

/// The resolved identity a session connects under. Carried as handshake
/// query parameters; never renegotiated mid-connection.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity {
    /// Tenant of the session.
    pub hotel_id: HotelId,
    /// Authenticated user.
    pub user_id: UserId,
    /// Role name from the auth layer.
    pub role: String,
}

impl SessionIdentity {
    /// Bundle the three identity fields.
    #[must_use]
    pub fn new(
        hotel_id: impl Into<HotelId>,
        user_id: impl Into<UserId>,
        role: impl Into<String>,
    ) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            user_id: user_id.into(),
            role: role.into(),
        }
    }
}

/// Where the manager currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport open and nothing scheduled.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Live transport, heartbeating.
    Connected,
    /// Waiting out a backoff delay before the next attempt.
    ReconnectScheduled,
}

// ─────────────────────────────────────────────────────────────────────────────
// ConnectionManager
// ─────────────────────────────────────────────────────────────────────────────

struct ManagerInner {
    url: String,
    identity: RwLock<Option<SessionIdentity>>,
    subscriptions: SubscriptionTable,
    state: RwLock<ConnectionState>,
    attempts: AtomicU32,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ManagerInner {
    fn set_state(&self, state: ConnectionState) {
        *self.state.write() = state;
    }

    /// Handshake URL carrying the scope, or `None` if identity is unset.
    fn handshake_url(&self) -> Option<String> {
        let identity = self.identity.read();
        let identity = identity.as_ref()?;
        Some(format!(
            "{}?hotelId={}&userId={}&role={}",
            self.url, identity.hotel_id, identity.user_id, identity.role
        ))
    }
}

/// Client-side connection manager with automatic backoff reconnection.
///
/// One manager per logical session. After [`shutdown`](Self::shutdown) the
/// manager is permanently stopped; a new login creates a new manager.
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

impl ConnectionManager {
    /// Create a manager targeting the relay endpoint, e.g.
    /// `ws://host/ws`. No connection is attempted until [`connect`]
    /// is called with identity present.
    ///
    /// [`connect`]: Self::connect
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                url: url.into(),
                identity: RwLock::new(None),
                subscriptions: SubscriptionTable::new(),
                state: RwLock::new(ConnectionState::Disconnected),
                attempts: AtomicU32::new(0),
                cancel: CancellationToken::new(),
                task: Mutex::new(None),
            }),
        }
    }

    /// Provide the session identity resolved by the auth layer.
    pub fn set_identity(&self, identity: SessionIdentity) {
        *self.inner.identity.write() = Some(identity);
    }

    /// Start the connection loop.
    ///
    /// No-op while identity is unresolved (connection is deferred until the
    /// session is authenticated), while a loop is already running, or after
    /// shutdown.
    pub fn connect(&self) {
        if self.inner.identity.read().is_none() {
            debug!("connect deferred: session identity not resolved");
            return;
        }
        if self.inner.cancel.is_cancelled() {
            debug!("connect ignored: manager is shut down");
            return;
        }
        let mut task = self.inner.task.lock();
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }
        *task = Some(tokio::spawn(run_loop(Arc::clone(&self.inner))));
    }

    /// Register a handler for a named event. Dropping the returned guard
    /// removes exactly this handler.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        self.inner.subscriptions.on(event, handler)
    }

    /// Register a wildcard handler receiving every incoming frame —
    /// a debug/observability escape hatch.
    pub fn on_any(&self, handler: impl Fn(&EventFrame) + Send + Sync + 'static) -> Subscription {
        self.inner.subscriptions.on_any(handler)
    }

    /// Remove every handler registered for `event`.
    pub fn off_all(&self, event: &str) {
        self.inner.subscriptions.off_all(event);
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    /// Consecutive failed attempts since the last successful connection.
    #[must_use]
    pub fn attempt_count(&self) -> u32 {
        self.inner.attempts.load(Ordering::SeqCst)
    }

    /// Whether the connection loop task is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    /// Tear the session down: cancel any pending reconnect timer, close the
    /// open transport, and wait for the loop to exit. Permanent.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        let task = self.inner.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        self.inner.set_state(ConnectionState::Disconnected);
    }

    /// Direct table access for tests that inject frames without a transport.
    #[cfg(test)]
    pub(crate) fn subscriptions(&self) -> &SubscriptionTable {
        &self.inner.subscriptions
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        // A dangling reconnect timer must never fire after the manager is
        // gone; cancelling the token kills the sleep and the open socket.
        self.inner.cancel.cancel();
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Run loop
// ─────────────────────────────────────────────────────────────────────────────

async fn run_loop(inner: Arc<ManagerInner>) {
    let cancel = inner.cancel.clone();
    loop {
        let Some(url) = inner.handshake_url() else {
            inner.set_state(ConnectionState::Disconnected);
            return;
        };
        inner.set_state(ConnectionState::Connecting);

        let connected = tokio::select! {
            res = connect_async(&url) => res,
            () = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
        };

        match connected {
            Ok((stream, _response)) => {
                inner.set_state(ConnectionState::Connected);
                inner.attempts.store(0, Ordering::SeqCst);
                debug!("relay connected");

                run_connected(&inner, stream).await;

                if cancel.is_cancelled() {
                    inner.set_state(ConnectionState::Disconnected);
                    return;
                }
                debug!("relay connection closed");
            }
            Err(e) => {
                debug!(error = %e, "relay connect failed");
            }
        }

        inner.set_state(ConnectionState::Disconnected);
        let attempt = inner.attempts.load(Ordering::SeqCst);
        let Some(delay) = reconnect_delay(attempt) else {
            // Deliberate fail-stop: staleness is the only symptom.
            warn!(attempts = attempt, "reconnect ceiling reached, giving up");
            return;
        };
        let _ = inner.attempts.fetch_add(1, Ordering::SeqCst);
        inner.set_state(ConnectionState::ReconnectScheduled);
        debug!(delay_ms = delay.as_millis() as u64, attempt, "reconnect scheduled");

        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {
                inner.set_state(ConnectionState::Disconnected);
                return;
            }
        }
    }
}

/// Drive one open transport until close, error, or cancellation.
async fn run_connected(inner: &Arc<ManagerInner>, stream: WsStream) {
    let cancel = inner.cancel.clone();
    let (mut write, mut read) = stream.split();

    let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                return;
            }
            _ = heartbeat.tick() => {
                // A send on a non-open transport ends the loop, which is
                // what stops the heartbeats — nothing throws into
                // application code.
                if write.send(Message::Text(PING_FRAME.into())).await.is_err() {
                    return;
                }
            }
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<EventFrame>(text.as_str()) {
                        Ok(frame) => inner.subscriptions.dispatch(&frame),
                        Err(e) => debug!(error = %e, "dropping malformed frame"),
                    }
                }
                Some(Ok(Message::Close(_))) | None => return,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(error = %e, "relay read error");
                    return;
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_without_identity_is_deferred() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1/ws");
        manager.connect();
        assert!(!manager.is_running());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn connect_after_shutdown_is_ignored() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1/ws");
        manager.set_identity(SessionIdentity::new("h1", "u1", "manager"));
        manager.shutdown().await;
        manager.connect();
        assert!(!manager.is_running());
    }

    #[tokio::test]
    async fn connect_is_reentrant() {
        let manager = ConnectionManager::new("ws://127.0.0.1:1/ws");
        manager.set_identity(SessionIdentity::new("h1", "u1", "manager"));
        manager.connect();
        manager.connect(); // second call must not spawn a second loop
        assert!(manager.is_running());
        manager.shutdown().await;
        assert!(!manager.is_running());
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn failed_connect_schedules_backoff() {
        // Port 1 is never listening; the first attempt fails fast.
        let manager = ConnectionManager::new("ws://127.0.0.1:1/ws");
        manager.set_identity(SessionIdentity::new("h1", "u1", "manager"));
        manager.connect();

        // One failure: attempt count reaches 1 and a retry is pending.
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(2);
        loop {
            if manager.state() == ConnectionState::ReconnectScheduled {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "no reconnect scheduled");
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(manager.attempt_count(), 1);
        manager.shutdown().await;
    }

    #[test]
    fn handshake_url_carries_scope() {
        let manager = ConnectionManager::new("ws://relay.local/ws");
        manager.set_identity(SessionIdentity::new("h1", "u1", "housekeeping"));
        let url = manager.inner.handshake_url().unwrap();
        assert_eq!(url, "ws://relay.local/ws?hotelId=h1&userId=u1&role=housekeeping");
    }

    #[test]
    fn handshake_url_requires_identity() {
        let manager = ConnectionManager::new("ws://relay.local/ws");
        assert!(manager.inner.handshake_url().is_none());
    }
}
