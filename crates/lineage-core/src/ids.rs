//! Identity tokens
//!
//! Provides [`ItemId`], [`ObjectId`] and [`DocumentId`], strongly-typed
//! UUID wrappers used to give graph elements an identity that is
//! independent of their position.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID
            #[inline]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Underlying UUID
            #[inline]
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }

            /// Build a deterministic identifier from a 128-bit value
            #[inline]
            #[must_use]
            pub const fn from_u128(value: u128) -> Self {
                Self(Uuid::from_u128(value))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0.simple())
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|_| IdError::Invalid(s.to_string()))
            }
        }
    };
}

uuid_id! {
    /// Stable identity of a collection or dictionary element
    ///
    /// Assigned when the element enters its container and kept across
    /// reorders, undo/redo and save/load. Never reused for another element.
    ItemId
}

uuid_id! {
    /// Identity of an object that other nodes can reference
    ObjectId
}

uuid_id! {
    /// Identity of a document (asset)
    DocumentId
}

impl ItemId {
    /// Length of the textual form (32 lowercase hex digits)
    pub const TEXT_LEN: usize = 32;
}

/// Errors parsing identifiers
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// Not a valid UUID
    #[error("invalid identifier: '{0}'")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn item_id_display_is_simple_hex() {
        let id = ItemId::from_u128(0x1234);
        let text = id.to_string();
        assert_eq!(text.len(), ItemId::TEXT_LEN);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(text.ends_with("1234"));
    }

    #[test]
    fn item_id_parse_roundtrip() {
        let id = ItemId::new();
        let parsed: ItemId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn item_id_parse_rejects_garbage() {
        let result: Result<ItemId, _> = "not-an-id".parse();
        assert!(matches!(result, Err(IdError::Invalid(_))));
    }

    #[test]
    fn document_id_from_u128_is_deterministic() {
        assert_eq!(DocumentId::from_u128(7), DocumentId::from_u128(7));
    }
}
