//! Branded ID newtypes for type safety.
//!
//! Identifiers that cross component boundaries are distinct newtypes around
//! `String`, so a request id can never be passed where a listener id is
//! expected.
//!
//! Generated ids are UUID v7 (time-ordered) via [`uuid::Uuid::now_v7`].
//! Listener ids are usually supplied by the UI layer (one per mounted
//! component) and are built with `From<&str>`.

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
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
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

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
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
    /// Identifier correlating a client process with the server across reconnects.
    SessionId
}

branded_id! {
    /// Identifier attached to every outbound socket request, echoed back in
    /// the server's acknowledgement.
    RequestId
}

branded_id! {
    /// Identifier of one local listener (typically one mounted UI component).
    ListenerId
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_new_is_uuid_v7() {
        let id = SessionId::new();
        let parsed = Uuid::parse_str(id.as_str()).expect("should be valid UUID");
        assert_eq!(parsed.get_version(), Some(uuid::Version::SortRand));
    }

    #[test]
    fn request_ids_are_unique() {
        let a = RequestId::new();
        let b = RequestId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn listener_id_from_str() {
        let id = ListenerId::from("user-card-7");
        assert_eq!(id.as_str(), "user-card-7");
        assert_eq!(format!("{id}"), "user-card-7");
    }

    #[test]
    fn deref_to_str() {
        let id = RequestId::from("req");
        let s: &str = &id;
        assert_eq!(s, "req");
    }

    #[test]
    fn serializes_transparently() {
        let id = RequestId::from("req-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"req-1\"");
        let back: RequestId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn into_inner() {
        let id = SessionId::from("inner-test");
        assert_eq!(id.into_inner(), "inner-test");
    }
}
