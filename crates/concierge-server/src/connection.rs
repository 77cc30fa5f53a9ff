//! One live client connection.
//!
//! A [`ClientConnection`] owns the sending side of a bounded queue drained
//! by the socket's writer task. Pushes are non-blocking `try_send`: the
//! emit path must never wait on a slow socket. Because each connection has
//! exactly one queue and one writer, frames enqueued for it are delivered
//! in enqueue order.
//!
//! Each connection also carries a shutdown token. Unregistering cancels
//! it, and the socket task selects on it, so a server-side removal (idle
//! reap, failed send) always closes the transport and the client sees a
//! real disconnect instead of a silent one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
// tokio's Instant so paused-clock tests can drive the idle timer.
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use concierge_core::ids::ConnectionId;
use concierge_core::scope::ScopeKey;

/// Outbound queue depth per connection. A full queue means the client has
/// stopped draining and is treated as a failed write.
pub const SEND_QUEUE_CAPACITY: usize = 64;

/// A registered connection: identity, scope, and outbound queue.
pub struct ClientConnection {
    /// Unique connection ID, minted at registration.
    pub id: ConnectionId,
    /// Authenticated scope resolved at handshake.
    pub scope: ScopeKey,
    tx: mpsc::Sender<Arc<String>>,
    last_seen: RwLock<Instant>,
    shutdown: CancellationToken,
}

impl ClientConnection {
    /// Create a connection around the sending half of its writer queue.
    #[must_use]
    pub fn new(scope: ScopeKey, tx: mpsc::Sender<Arc<String>>) -> Self {
        Self {
            id: ConnectionId::new(),
            scope,
            tx,
            last_seen: RwLock::new(Instant::now()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Enqueue a serialized frame. Returns `false` when the queue is full
    /// or the writer task is gone — either way the connection is dead to us.
    #[must_use]
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.tx.try_send(frame).is_ok()
    }

    /// Record a liveness signal (heartbeat ping received).
    pub fn touch(&self) {
        *self.last_seen.write() = Instant::now();
    }

    /// Time since the last liveness signal.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_seen.read().elapsed()
    }

    /// Signal the socket task to close the transport. Idempotent.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    /// Whether the connection has been told to close.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

impl std::fmt::Debug for ClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConnection")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
