//! # concierge-client
//!
//! Client half of the concierge real-time relay: one logical WebSocket
//! connection per authenticated session, kept alive across failures by an
//! explicit reconnect state machine, with a publish/subscribe surface that
//! UI code and the query-cache bridge consume.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `manager` | Connection state machine, handshake, heartbeat, backoff reconnect |
//! | `subscriptions` | Event name → handler set registry with RAII guards |
//! | `invalidation` | Named events → cache-key invalidation glue |
//!
//! Everything here is best-effort by design: a lost connection degrades to
//! stale badges and counters, never to a failed CRUD operation.

#![deny(unsafe_code)]

pub mod invalidation;
pub mod manager;
pub mod subscriptions;

pub use invalidation::{QueryCache, QueryInvalidationBridge, QueryKey};
pub use manager::{ConnectionManager, ConnectionState, SessionIdentity};
pub use subscriptions::{Subscription, SubscriptionTable};
