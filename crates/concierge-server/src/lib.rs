//! # concierge-server
//!
//! Server half of the concierge real-time relay: tracks connected browser
//! sessions and fans domain events out to them, scoped by hotel and role.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `connection` | One live socket: scope, send queue, liveness timestamp |
//! | `registry` | Connection set keyed by ID, scope-filtered queries, best-effort send |
//! | `hub` | `emit(event, filter, payload)` — frame once, push to every match |
//! | `ws` | Axum upgrade endpoint, handshake validation, per-socket loops |
//! | `heartbeat` | Reaper task expiring connections silent for too long |
//! | `metrics` | Prometheus recorder and metric-name constants |
//!
//! ## Data Flow
//!
//! CRUD handler commits a mutation → [`hub::EventHub::emit`] →
//! [`registry::ConnectionRegistry::find_matching`] snapshot → per-connection
//! queue → writer task → socket. Delivery is fire-and-forget: a dead
//! connection is unregistered and never aborts the fan-out to others.

#![deny(unsafe_code)]

pub mod connection;
pub mod heartbeat;
pub mod hub;
pub mod metrics;
pub mod registry;
pub mod ws;

pub use hub::EventHub;
pub use registry::ConnectionRegistry;
pub use ws::{RelayState, router, router_with_metrics};
