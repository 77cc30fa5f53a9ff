//! Event fan-out to connected clients.
//!
//! [`EventHub::emit`] is the single entry point CRUD handlers call after a
//! successful mutation. It assumes the mutation already committed — the
//! relay never participates in rollback, and nothing here can fail toward
//! the emitter. Returns once every send has been attempted; no network
//! acknowledgement is awaited.

use std::sync::Arc;

use metrics::counter;
use serde_json::Value;
use tracing::{debug, warn};

use concierge_core::frame::EventFrame;
use concierge_core::scope::ScopeFilter;

use crate::metrics::EVENTS_EMITTED_TOTAL;
use crate::registry::ConnectionRegistry;

/// Translates a domain event into a registry query plus fan-out push.
#[derive(Clone)]
pub struct EventHub {
    registry: Arc<ConnectionRegistry>,
}

impl EventHub {
    /// Create a hub over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }

    /// The registry this hub fans out through.
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Emit a named event to every connection matching `filter`.
    ///
    /// The frame is serialized once and shared across recipients. The
    /// matching set is snapshotted before any send, so connections removed
    /// mid-fan-out simply fail their individual push. Send failures are
    /// swallowed per connection.
    pub async fn emit(&self, event: &str, filter: &ScopeFilter, payload: Value) {
        let frame = EventFrame::new(event, payload);
        let json = match serde_json::to_string(&frame) {
            Ok(j) => Arc::new(j),
            Err(e) => {
                warn!(event, error = %e, "failed to serialize event frame");
                return;
            }
        };

        let matched = self.registry.find_matching(filter).await;
        let mut delivered = 0u32;
        for conn in &matched {
            if self.registry.send(conn, Arc::clone(&json)).await {
                delivered += 1;
            }
        }
        counter!(EVENTS_EMITTED_TOTAL).increment(1);
        debug!(
            event,
            hotel_id = %filter.hotel_id,
            recipients = matched.len(),
            delivered,
            "emitted event"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
