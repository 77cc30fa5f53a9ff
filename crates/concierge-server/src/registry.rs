//! Connection registry: the single shared mutable resource of the relay.
//!
//! Tracks every live connection keyed by [`ConnectionId`] and answers
//! "which connections match this scope filter." Ownership is exclusive:
//! no other component holds the connection set. Reads snapshot the matching
//! set before any sends happen, so an unregister racing a fan-out can never
//! invalidate the iteration — a destroyed connection's queue simply rejects
//! the push.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use concierge_core::ids::ConnectionId;
use concierge_core::scope::ScopeFilter;

use crate::connection::ClientConnection;
use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL, WS_IDLE_EXPIRED_TOTAL,
    WS_SEND_FAILURES_TOTAL,
};

/// Registry of live connections, keyed by connection ID.
pub struct ConnectionRegistry {
    /// Connected clients indexed by connection ID.
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
    /// Atomic counter tracking total connections (avoids read-locking for count queries).
    active_count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active_count: AtomicUsize::new(0),
        }
    }

    /// Register a connection. The connection becomes visible to matching
    /// queries immediately. Returns its ID.
    pub async fn register(&self, connection: Arc<ClientConnection>) -> ConnectionId {
        let id = connection.id.clone();
        let mut conns = self.connections.write().await;
        if conns.insert(id.clone(), connection).is_none() {
            let count = self.active_count.fetch_add(1, Ordering::Relaxed) + 1;
            gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
        }
        counter!(WS_CONNECTIONS_TOTAL).increment(1);
        id
    }

    /// Remove a connection by ID. Idempotent: removing an absent ID is a
    /// no-op, not an error. Called from every socket exit path so cleanup
    /// happens regardless of how the connection ended.
    ///
    /// Removal also signals the connection to close, so a server-initiated
    /// unregister (idle reap, failed send) tears the transport down and the
    /// client observes a real disconnect that triggers its reconnect logic.
    pub async fn unregister(&self, id: &ConnectionId) {
        let removed = {
            let mut conns = self.connections.write().await;
            conns.remove(id)
        };
        if let Some(conn) = removed {
            conn.close();
            let count = self.active_count.fetch_sub(1, Ordering::Relaxed) - 1;
            gauge!(WS_CONNECTIONS_ACTIVE).set(count as f64);
            counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
            debug!(conn_id = %id, "connection unregistered");
        }
    }

    /// Snapshot of all connections matching `filter`.
    ///
    /// Linear scan — the registry holds at most low thousands of entries
    /// per process. All filter fields are AND-combined; the hotel bound is
    /// enforced by [`ScopeFilter`] construction.
    pub async fn find_matching(&self, filter: &ScopeFilter) -> Vec<Arc<ClientConnection>> {
        let conns = self.connections.read().await;
        conns
            .values()
            .filter(|c| filter.matches(&c.scope))
            .cloned()
            .collect()
    }

    /// Best-effort push of a serialized frame to one connection.
    ///
    /// A failed write unregisters the connection and is swallowed — one bad
    /// connection must not abort a broadcast to others. Returns whether the
    /// frame was enqueued.
    pub async fn send(&self, connection: &Arc<ClientConnection>, frame: Arc<String>) -> bool {
        if connection.send(frame) {
            return true;
        }
        counter!(WS_SEND_FAILURES_TOTAL).increment(1);
        warn!(conn_id = %connection.id, "send failed, dropping connection");
        self.unregister(&connection.id).await;
        false
    }

    /// Unregister every connection silent for longer than `max_idle`.
    /// Returns how many were expired.
    pub async fn expire_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<ConnectionId> = {
            let conns = self.connections.read().await;
            conns
                .values()
                .filter(|c| c.idle_for() > max_idle)
                .map(|c| c.id.clone())
                .collect()
        };
        for id in &stale {
            warn!(conn_id = %id, "expiring idle connection");
            self.unregister(id).await;
        }
        if !stale.is_empty() {
            counter!(WS_IDLE_EXPIRED_TOTAL).increment(stale.len() as u64);
        }
        stale.len()
    }

    /// Number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
