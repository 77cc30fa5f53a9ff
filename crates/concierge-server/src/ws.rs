//! Axum WebSocket endpoint: handshake validation and per-socket loops.
//!
//! The upgrade URL carries the session scope as query parameters
//! (`hotelId`, `userId`, `role`). All three are required; a request missing
//! any of them is refused with `400` before the upgrade completes, so an
//! unauthenticated socket is never registered. Scope is fixed at handshake
//! time — there is no mid-connection renegotiation.
//!
//! Each accepted socket gets two halves: a writer task draining the
//! connection's frame queue, and a read loop that only understands
//! `{"type":"ping"}` (touch liveness, reply `pong`). Malformed inbound
//! frames are dropped. Every exit path unregisters the connection.

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use futures::{SinkExt as _, StreamExt as _};
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use concierge_core::frame::{ClientFrame, EventFrame};
use concierge_core::scope::ScopeKey;

use crate::connection::{ClientConnection, SEND_QUEUE_CAPACITY};
use crate::hub::EventHub;
use crate::metrics::WS_HANDSHAKE_REJECTED_TOTAL;
use crate::registry::ConnectionRegistry;

/// Shared server state: the registry and the hub CRUD handlers emit through.
pub struct RelayState {
    /// The process-wide connection registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Fan-out hub over the same registry.
    pub hub: EventHub,
}

impl RelayState {
    /// Create state with a fresh registry.
    #[must_use]
    pub fn new() -> Self {
        let registry = Arc::new(ConnectionRegistry::new());
        let hub = EventHub::new(Arc::clone(&registry));
        Self { registry, hub }
    }
}

impl Default for RelayState {
    fn default() -> Self {
        Self::new()
    }
}

/// Scope parameters carried on the upgrade URL.
///
/// Fields are `Option` so the handler can refuse with a clean `400` and a
/// counter bump instead of axum's generic rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeParams {
    #[serde(default)]
    hotel_id: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    role: Option<String>,
}

/// Build the relay router: `GET /ws`.
pub fn router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Relay router plus a `GET /metrics` Prometheus endpoint.
pub fn router_with_metrics(state: Arc<RelayState>, handle: PrometheusHandle) -> Router {
    router(state).route("/metrics", get(move || async move { handle.render() }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    State(state): State<Arc<RelayState>>,
    Query(params): Query<HandshakeParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let scope = ScopeKey::from_handshake(
        params.hotel_id.as_deref().unwrap_or(""),
        params.user_id.as_deref().unwrap_or(""),
        params.role.as_deref().unwrap_or(""),
    );
    match scope {
        Ok(scope) => ws.on_upgrade(move |socket| handle_socket(socket, scope, state)),
        Err(e) => {
            counter!(WS_HANDSHAKE_REJECTED_TOTAL).increment(1);
            warn!(error = %e, "refusing websocket handshake");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// Drive one accepted socket until it closes, then unregister.
async fn handle_socket(socket: WebSocket, scope: ScopeKey, state: Arc<RelayState>) {
    let (tx, mut rx) = mpsc::channel::<Arc<String>>(SEND_QUEUE_CAPACITY);
    let connection = Arc::new(ClientConnection::new(scope, tx));
    let id = state.registry.register(Arc::clone(&connection)).await;
    debug!(conn_id = %id, hotel_id = %connection.scope.hotel_id, "websocket connected");

    let (mut write, mut read) = socket.split();

    // Single writer per connection: frames leave in enqueue order. When
    // the connection is told to close (idle reap, failed send, normal
    // teardown) the writer sends a close frame so the client observes a
    // real disconnect and its reconnect logic kicks in.
    let writer = tokio::spawn({
        let connection = Arc::clone(&connection);
        async move {
            loop {
                tokio::select! {
                    frame = rx.recv() => match frame {
                        Some(frame) => {
                            if write.send(Message::Text(frame.as_str().into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                    () = connection.closed() => {
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }
                }
            }
        }
    });

    loop {
        let msg = tokio::select! {
            msg = read.next() => msg,
            () = connection.closed() => break,
        };
        match msg {
            Some(Ok(Message::Text(text))) => {
                match serde_json::from_str::<ClientFrame>(text.as_str()) {
                    Ok(ClientFrame::Ping) => {
                        connection.touch();
                        match serde_json::to_string(&EventFrame::pong()) {
                            Ok(pong) => {
                                if !connection.send(Arc::new(pong)) {
                                    break;
                                }
                            }
                            Err(e) => warn!(error = %e, "failed to serialize pong"),
                        }
                    }
                    Err(e) => {
                        debug!(conn_id = %id, error = %e, "dropping malformed client frame");
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => break,
            // Transport-level ping/pong and binary frames carry no relay
            // semantics.
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(conn_id = %id, error = %e, "websocket read error");
                break;
            }
        }
    }

    // Unregister cancels the shutdown token, which is what lets the
    // writer drain out and send its close frame.
    state.registry.unregister(&id).await;
    let _ = writer.await;
    debug!(conn_id = %id, "websocket closed");
}
