//! Connection scoping: who a connection is, and who an event targets.
//!
//! Every connection is registered under a [`ScopeKey`] resolved at handshake
//! time from the session's `hotelId`, `userId`, and `role`. Every emit
//! carries a [`ScopeFilter`] selecting the subset of connections that should
//! receive the event. The hotel ID is mandatory on both sides: no event is
//! ever broadcast hotel-agnostically — that is the multi-tenant isolation
//! boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ids::{HotelId, UserId};

/// Error constructing a scope from handshake parameters.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScopeError {
    /// A required scope field was missing or empty.
    #[error("missing required scope field: {0}")]
    MissingField(&'static str),
}

// ─────────────────────────────────────────────────────────────────────────────
// ScopeKey — the identity a connection is registered under
// ─────────────────────────────────────────────────────────────────────────────

/// The fully-resolved scope of an authenticated connection.
///
/// All three fields are resolved before the WebSocket upgrade completes;
/// unauthenticated sockets are refused at handshake, never registered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeKey {
    /// Tenant the session belongs to.
    pub hotel_id: HotelId,
    /// Authenticated user behind the session.
    pub user_id: UserId,
    /// Role name (`manager`, `housekeeping`, `kitchen`, …). The vocabulary
    /// is owned by the auth layer; the relay treats it as opaque.
    pub role: String,
}

impl ScopeKey {
    /// Build a scope from raw handshake parameters, rejecting empty fields.
    pub fn from_handshake(hotel_id: &str, user_id: &str, role: &str) -> Result<Self, ScopeError> {
        if hotel_id.is_empty() {
            return Err(ScopeError::MissingField("hotelId"));
        }
        if user_id.is_empty() {
            return Err(ScopeError::MissingField("userId"));
        }
        if role.is_empty() {
            return Err(ScopeError::MissingField("role"));
        }
        Ok(Self {
            hotel_id: HotelId::from(hotel_id),
            user_id: UserId::from(user_id),
            role: role.to_owned(),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ScopeFilter — the predicate an emit carries
// ─────────────────────────────────────────────────────────────────────────────

/// Selects which connections receive an event.
///
/// Built per emit call and never persisted. All set fields are AND-combined:
/// hotel must match exactly, then role if set, then user if set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopeFilter {
    /// Tenant boundary — always required.
    pub hotel_id: HotelId,
    /// Restrict delivery to one role.
    pub role: Option<String>,
    /// Restrict delivery to one user's sessions.
    pub user_id: Option<UserId>,
}

impl ScopeFilter {
    /// Target every session of a hotel.
    #[must_use]
    pub fn hotel(hotel_id: impl Into<HotelId>) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            role: None,
            user_id: None,
        }
    }

    /// Additionally require an exact role match.
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Additionally require an exact user match.
    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Whether a connection registered under `key` should receive events
    /// selected by this filter.
    #[must_use]
    pub fn matches(&self, key: &ScopeKey) -> bool {
        if self.hotel_id != key.hotel_id {
            return false;
        }
        if let Some(role) = &self.role
            && *role != key.role
        {
            return false;
        }
        if let Some(user_id) = &self.user_id
            && *user_id != key.user_id
        {
            return false;
        }
        true
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn key(hotel: &str, user: &str, role: &str) -> ScopeKey {
        ScopeKey::from_handshake(hotel, user, role).unwrap()
    }

    #[test]
    fn handshake_rejects_empty_fields() {
        assert_eq!(
            ScopeKey::from_handshake("", "u1", "manager"),
            Err(ScopeError::MissingField("hotelId"))
        );
        assert_eq!(
            ScopeKey::from_handshake("h1", "", "manager"),
            Err(ScopeError::MissingField("userId"))
        );
        assert_eq!(
            ScopeKey::from_handshake("h1", "u1", ""),
            Err(ScopeError::MissingField("role"))
        );
    }

    #[test]
    fn hotel_only_filter_matches_any_role_and_user() {
        let filter = ScopeFilter::hotel("h1");
        assert!(filter.matches(&key("h1", "u1", "manager")));
        assert!(filter.matches(&key("h1", "u2", "kitchen")));
        assert!(!filter.matches(&key("h2", "u1", "manager")));
    }

    #[test]
    fn role_filter_is_and_combined() {
        let filter = ScopeFilter::hotel("h1").with_role("kitchen");
        assert!(filter.matches(&key("h1", "u1", "kitchen")));
        assert!(!filter.matches(&key("h1", "u1", "manager")));
        // Hotel mismatch wins even when the role matches.
        assert!(!filter.matches(&key("h2", "u1", "kitchen")));
    }

    #[test]
    fn user_filter_is_and_combined() {
        let filter = ScopeFilter::hotel("h1").with_user("u1");
        assert!(filter.matches(&key("h1", "u1", "manager")));
        assert!(!filter.matches(&key("h1", "u2", "manager")));
    }

    #[test]
    fn fully_qualified_filter_requires_all_three() {
        let filter = ScopeFilter::hotel("h1").with_role("waiter").with_user("u1");
        assert!(filter.matches(&key("h1", "u1", "waiter")));
        assert!(!filter.matches(&key("h1", "u1", "manager")));
        assert!(!filter.matches(&key("h1", "u2", "waiter")));
        assert!(!filter.matches(&key("h2", "u1", "waiter")));
    }

    #[test]
    fn scope_key_camel_case_wire_format() {
        let k = key("h1", "u1", "manager");
        let json = serde_json::to_value(&k).unwrap();
        assert_eq!(json["hotelId"], "h1");
        assert_eq!(json["userId"], "u1");
        assert_eq!(json["role"], "manager");
    }
}
