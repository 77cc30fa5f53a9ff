//! Wire frames exchanged over the relay WebSocket.
//!
//! Server → client traffic is the [`EventFrame`]: a named event with an
//! opaque JSON payload and an ISO-8601 timestamp. Payloads are deliberately
//! schemaless — the relay never inspects them, and the consuming side
//! (query invalidation) only cares about the event name.
//!
//! Client → server traffic is the [`ClientFrame`], of which `ping` is the
//! only variant: browsers send `{"type":"ping"}` every 30 seconds and the
//! server answers with a `pong`-named event frame. Heartbeat frames are
//! control traffic and never reach subscriber dispatch.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved event name for the server's heartbeat reply.
pub const EVENT_PONG: &str = "pong";

/// Serialized heartbeat ping, precomputed for the client's send path.
pub const PING_FRAME: &str = r#"{"type":"ping"}"#;

// ─────────────────────────────────────────────────────────────────────────────
// EventFrame — server → client
// ─────────────────────────────────────────────────────────────────────────────

/// A server-to-client event frame.
///
/// Transient and fire-and-forget: frames are never journaled or replayed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventFrame {
    /// Domain event name (`task:created`, `stock:updated`, `order:placed`, …).
    pub event: String,
    /// Event payload (opaque JSON).
    pub data: Value,
    /// ISO-8601 emission timestamp.
    pub timestamp: String,
}

impl EventFrame {
    /// Build a frame stamped with the current time.
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// The heartbeat reply frame.
    #[must_use]
    pub fn pong() -> Self {
        Self::new(EVENT_PONG, Value::Null)
    }

    /// Whether this frame is the heartbeat reply.
    #[must_use]
    pub fn is_pong(&self) -> bool {
        self.event == EVENT_PONG
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ClientFrame — client → server
// ─────────────────────────────────────────────────────────────────────────────

/// A client-to-server frame. Heartbeat pings are the only inbound traffic
/// in this subsystem; mutations go through the HTTP CRUD handlers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Liveness signal, sent every 30 seconds.
    Ping,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_frame_wire_format() {
        let frame = EventFrame::new("task:created", json!({"taskId": "t1"}));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["event"], "task:created");
        assert_eq!(value["data"]["taskId"], "t1");
        // RFC 3339 with millisecond precision, UTC "Z" suffix.
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'), "timestamp not UTC: {ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn event_frame_roundtrip_preserves_payload() {
        let frame = EventFrame::new("stock:updated", json!({"itemId": 7, "qty": 42}));
        let json = serde_json::to_string(&frame).unwrap();
        let back: EventFrame = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame);
    }

    #[test]
    fn pong_frame_is_recognized() {
        let frame = EventFrame::pong();
        assert!(frame.is_pong());
        assert!(!EventFrame::new("order:placed", Value::Null).is_pong());
    }

    #[test]
    fn client_ping_wire_format() {
        let json = serde_json::to_string(&ClientFrame::Ping).unwrap();
        assert_eq!(json, PING_FRAME);
        let back: ClientFrame = serde_json::from_str(PING_FRAME).unwrap();
        assert_eq!(back, ClientFrame::Ping);
    }

    #[test]
    fn unknown_client_frame_fails_to_parse() {
        // Only ping is a valid inbound frame; everything else is dropped
        // by the server's read loop.
        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"subscribe"}"#).is_err());
        assert!(serde_json::from_str::<ClientFrame>("not json").is_err());
    }
}
