//! Protocol-level timing policy shared by both halves of the relay.

use std::time::Duration;

/// Cadence at which clients send `{"type":"ping"}` liveness frames.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Server-side silence threshold after which a connection is treated as
/// dead and unregistered. Three missed heartbeats.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(90);
