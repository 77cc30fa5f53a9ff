//! Declarative glue from event names to cache invalidation.
//!
//! Pages declare "when any of these events fire, refetch this query" by
//! mounting a [`QueryInvalidationBridge`]: one subscription per event name,
//! all released when the bridge is dropped (component unmount, or key /
//! event-list change followed by a remount). Invalidation is coarse: the
//! event payload is never inspected — the cache refetches the whole key.

use std::sync::Arc;

use tracing::trace;

use crate::manager::ConnectionManager;
use crate::subscriptions::Subscription;

/// A cache key, single or composite (`["orders", "pending"]`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<String>);

impl QueryKey {
    /// Composite key from parts.
    #[must_use]
    pub fn new<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(parts.into_iter().map(Into::into).collect())
    }

    /// Single-segment key.
    #[must_use]
    pub fn single(part: impl Into<String>) -> Self {
        Self(vec![part.into()])
    }

    /// The key's segments.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.0
    }
}

impl std::fmt::Display for QueryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(":"))
    }
}

/// The external data-fetching cache the bridge drives.
pub trait QueryCache: Send + Sync {
    /// Mark the key stale so the next read refetches.
    fn invalidate(&self, key: &QueryKey);
}

/// Subscriptions binding a set of event names to one cache key.
///
/// Dropping the bridge unsubscribes everything — repeated mount/unmount
/// cycles leave no handlers behind.
pub struct QueryInvalidationBridge {
    _subscriptions: Vec<Subscription>,
}

impl QueryInvalidationBridge {
    /// Subscribe `cache.invalidate(key)` to every event name in `events`.
    pub fn mount(
        manager: &ConnectionManager,
        events: &[&str],
        key: QueryKey,
        cache: Arc<dyn QueryCache>,
    ) -> Self {
        let subscriptions = events
            .iter()
            .map(|event| {
                let cache = Arc::clone(&cache);
                let key = key.clone();
                let event_name = (*event).to_owned();
                manager.on(event, move |_payload| {
                    trace!(event = %event_name, key = %key, "invalidating query");
                    cache.invalidate(&key);
                })
            })
            .collect();
        Self {
            _subscriptions: subscriptions,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
