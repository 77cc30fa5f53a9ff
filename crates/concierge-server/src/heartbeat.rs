//! Liveness reaper for connections that stopped heartbeating.
//!
//! Clients ping every 30 seconds; a connection silent for more than
//! [`IDLE_TIMEOUT`] (90 s) is treated as dead and unregistered. The reaper
//! runs on its own interval and is cancelled through the server's shutdown
//! token.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use concierge_core::constants::IDLE_TIMEOUT;

use crate::registry::ConnectionRegistry;

/// Cadence at which the reaper scans for idle connections.
pub const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Spawn the idle-connection reaper. Runs until `cancel` fires.
pub fn spawn_reaper(
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    spawn_reaper_with(registry, cancel, REAP_INTERVAL, IDLE_TIMEOUT)
}

/// Reaper with explicit timing, used by paused-clock tests.
pub(crate) fn spawn_reaper_with(
    registry: Arc<ConnectionRegistry>,
    cancel: CancellationToken,
    reap_interval: Duration,
    idle_timeout: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let expired = registry.expire_idle(idle_timeout).await;
                    if expired > 0 {
                        debug!(expired, "reaped idle connections");
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use concierge_core::scope::ScopeKey;
    use tokio::sync::mpsc;

    use crate::connection::ClientConnection;

    #[tokio::test(start_paused = true)]
    async fn reaper_expires_silent_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _rx) = mpsc::channel(8);
        let scope = ScopeKey::from_handshake("h1", "u1", "manager").unwrap();
        let _ = registry.register(Arc::new(ClientConnection::new(scope, tx))).await;

        let cancel = CancellationToken::new();
        let handle = spawn_reaper_with(
            Arc::clone(&registry),
            cancel.clone(),
            Duration::from_secs(30),
            Duration::from_secs(90),
        );

        // Just past the idle threshold plus one scan.
        tokio::time::sleep(Duration::from_secs(121)).await;
        assert_eq!(registry.connection_count(), 0);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_keeps_heartbeating_connection() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (tx, _rx) = mpsc::channel(8);
        let scope = ScopeKey::from_handshake("h1", "u1", "manager").unwrap();
        let conn = Arc::new(ClientConnection::new(scope, tx));
        let _ = registry.register(Arc::clone(&conn)).await;

        let cancel = CancellationToken::new();
        let handle = spawn_reaper_with(
            Arc::clone(&registry),
            cancel.clone(),
            Duration::from_secs(30),
            Duration::from_secs(90),
        );

        // Touch every 30 simulated seconds, like a live client.
        for _ in 0..6 {
            tokio::time::sleep(Duration::from_secs(30)).await;
            conn.touch();
        }
        assert_eq!(registry.connection_count(), 1);

        cancel.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn reaper_stops_on_cancel() {
        let registry = Arc::new(ConnectionRegistry::new());
        let cancel = CancellationToken::new();
        let handle = spawn_reaper(Arc::clone(&registry), cancel.clone());

        cancel.cancel();
        handle.await.unwrap();
    }
}
