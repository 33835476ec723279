//! Typed ID wrappers for type safety across reelvault.
//!
//! This module provides newtype wrappers around UUIDs to prevent mixing
//! different kinds of identifiers (e.g. using a UserId where a MediaLinkId is
//! expected).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a new random ID.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Parse an ID from its string representation.
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id! {
    /// Unique identifier for a media link (one filesystem entity).
    MediaLinkId
}

define_id! {
    /// Unique identifier for a metadata record (movie, show, season, episode).
    MetadataId
}

define_id! {
    /// Unique identifier for a user.
    UserId
}

define_id! {
    /// Unique identifier for a per-user playback state record.
    PlaybackStateId
}

define_id! {
    /// Unique identifier for a probed stream encoding row.
    StreamEncodingId
}

define_id! {
    /// Opaque token identifying one live transcode session.
    SessionToken
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id1 = MediaLinkId::new();
        let id2 = MediaLinkId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_id_from_uuid() {
        let uuid = Uuid::new_v4();
        let link_id = MediaLinkId::from(uuid);
        let uuid_back: Uuid = link_id.into();
        assert_eq!(uuid, uuid_back);
    }

    #[test]
    fn test_id_serialization() {
        let id = MetadataId::new();
        let json = serde_json::to_string(&id).unwrap();
        let deserialized: MetadataId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, deserialized);
    }

    #[test]
    fn test_id_display_roundtrip() {
        let id = UserId::new();
        let parsed = UserId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(SessionToken::parse("not-a-uuid").is_err());
    }

    #[test]
    fn test_id_hash() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = PlaybackStateId::new();
        set.insert(id);
        assert!(set.contains(&id));
    }
}
