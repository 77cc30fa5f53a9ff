//! Subscription registry: event names to handler sets.
//!
//! Named handlers receive the event payload; wildcard handlers are a
//! debug/observability escape hatch receiving the whole frame. Dispatch
//! iterates over a snapshot of the handler set, never the live map, so a
//! handler may subscribe or unsubscribe reentrantly without invalidating
//! the iteration.
//!
//! The table never keeps an empty handler set as a key — the entry is
//! deleted with its last handler, so subscribe/unsubscribe churn from page
//! navigation cannot grow the map unboundedly.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use concierge_core::frame::EventFrame;

/// Handler for a named event; receives the event payload.
pub type PayloadHandler = Arc<dyn Fn(&Value) + Send + Sync>;
/// Wildcard handler; receives the full frame, not just the payload.
pub type FrameHandler = Arc<dyn Fn(&EventFrame) + Send + Sync>;

#[derive(Default)]
struct TableInner {
    next_id: u64,
    named: HashMap<String, HashMap<u64, PayloadHandler>>,
    wildcard: HashMap<u64, FrameHandler>,
}

/// Registry mapping event names to handler callbacks.
#[derive(Clone, Default)]
pub struct SubscriptionTable {
    inner: Arc<Mutex<TableInner>>,
}

impl SubscriptionTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a named event. Dropping the returned
    /// [`Subscription`] removes exactly this handler.
    pub fn on(
        &self,
        event: &str,
        handler: impl Fn(&Value) + Send + Sync + 'static,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let _ = inner
            .named
            .entry(event.to_owned())
            .or_default()
            .insert(id, Arc::new(handler));
        Subscription {
            table: Arc::downgrade(&self.inner),
            target: Target::Named(event.to_owned()),
            id,
        }
    }

    /// Register a wildcard handler invoked for every dispatched frame.
    pub fn on_any(&self, handler: impl Fn(&EventFrame) + Send + Sync + 'static) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        let _ = inner.wildcard.insert(id, Arc::new(handler));
        Subscription {
            table: Arc::downgrade(&self.inner),
            target: Target::Wildcard,
            id,
        }
    }

    /// Remove every handler registered for `event`.
    pub fn off_all(&self, event: &str) {
        let _ = self.inner.lock().named.remove(event);
    }

    /// Dispatch a frame to the matching named handlers and all wildcard
    /// handlers. Heartbeat `pong` frames are control traffic and are
    /// swallowed here, before any handler runs.
    pub fn dispatch(&self, frame: &EventFrame) {
        if frame.is_pong() {
            trace!("pong received");
            return;
        }
        // Snapshot under the lock; invoke outside it.
        let (named, wildcard): (Vec<PayloadHandler>, Vec<FrameHandler>) = {
            let inner = self.inner.lock();
            (
                inner
                    .named
                    .get(&frame.event)
                    .map(|set| set.values().cloned().collect())
                    .unwrap_or_default(),
                inner.wildcard.values().cloned().collect(),
            )
        };
        for handler in &named {
            handler(&frame.data);
        }
        for handler in &wildcard {
            handler(frame);
        }
    }

    /// Whether any handler is registered for `event`. Exposed for tests
    /// and for the no-empty-set invariant.
    #[must_use]
    pub fn has_handlers(&self, event: &str) -> bool {
        self.inner.lock().named.contains_key(event)
    }

    /// Number of distinct named-event entries.
    #[must_use]
    pub fn named_event_count(&self) -> usize {
        self.inner.lock().named.len()
    }
}

enum Target {
    Named(String),
    Wildcard,
}

/// Capability to remove one registered handler. Unsubscribes on drop.
pub struct Subscription {
    table: Weak<Mutex<TableInner>>,
    target: Target,
    id: u64,
}

impl Subscription {
    /// Remove the handler now. Equivalent to dropping the guard.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut inner = table.lock();
        match &self.target {
            Target::Named(event) => {
                if let Some(set) = inner.named.get_mut(event) {
                    let _ = set.remove(&self.id);
                    // Last handler out deletes the entry.
                    if set.is_empty() {
                        let _ = inner.named.remove(event);
                    }
                }
            }
            Target::Wildcard => {
                let _ = inner.wildcard.remove(&self.id);
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
