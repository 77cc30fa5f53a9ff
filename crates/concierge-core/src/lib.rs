//! # concierge-core
//!
//! Foundation types shared by both halves of the concierge real-time relay.
//!
//! The relay fans domain events (task created, stock updated, order placed)
//! out from the hotel management backend to connected browser sessions. This
//! crate provides the vocabulary the server and client crates agree on:
//!
//! - **Branded IDs**: [`ids::ConnectionId`], [`ids::HotelId`], [`ids::UserId`]
//! - **Scoping**: [`scope::ScopeKey`] (who a connection is) and
//!   [`scope::ScopeFilter`] (who an event targets)
//! - **Wire frames**: [`frame::EventFrame`] (server → client) and
//!   [`frame::ClientFrame`] (client → server)
//! - **Backoff**: [`backoff::reconnect_delay`] — the reconnect ladder
//! - **Logging**: [`logging::init_subscriber`] tracing bootstrap
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by `concierge-server` and `concierge-client`.

#![deny(unsafe_code)]

pub mod backoff;
pub mod constants;
pub mod frame;
pub mod ids;
pub mod logging;
pub mod scope;
