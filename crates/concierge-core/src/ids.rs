//! Branded ID newtypes for type safety.
//!
//! Each entity the relay touches has a distinct ID type implemented as a
//! newtype wrapper around `String`, preventing a user ID from being passed
//! where a hotel ID is expected. Hotel and user IDs originate in the
//! authentication layer and arrive as opaque strings; connection IDs are
//! minted locally as UUID v7 (time-ordered).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generate a new UUID v7 string (time-ordered).
fn new_v7() -> String {
    Uuid::now_v7().to_string()
}

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random ID (UUID v7, time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(new_v7())
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for one live WebSocket connection.
    ConnectionId
}

branded_id! {
    /// Identifier of the hotel (tenant) a session belongs to.
    HotelId
}

branded_id! {
    /// Identifier of the authenticated user behind a session.
    UserId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_distinct_types() {
        // Compile-time check: HotelId and UserId are not interchangeable.
        fn takes_hotel(_: &HotelId) {}
        let hotel = HotelId::from("h1");
        takes_hotel(&hotel);
    }

    #[test]
    fn serde_transparent() {
        let id = HotelId::from("h1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"h1\"");
        let back: HotelId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_and_as_str() {
        let id = UserId::from("u42");
        assert_eq!(id.as_str(), "u42");
        assert_eq!(id.to_string(), "u42");
        assert_eq!(String::from(id), "u42");
    }
}
