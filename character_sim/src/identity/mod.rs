//! Identifiers for the parties of a conversation.
//!
//! Ids are opaque strings handed in by the caller's storage layer, so they are wrapped rather
//! than generated here.

use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a character (the persona the user talks to).
    CharacterId
);

string_id!(
    /// Identifier of an end user.
    UserId
);

string_id!(
    /// Identifier of a single chat session.
    SessionId
);

/// Composite key of a core memory: one per (user, character) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryKey {
    pub user: UserId,
    pub character: CharacterId,
}

impl MemoryKey {
    pub fn new(user: impl Into<UserId>, character: impl Into<CharacterId>) -> Self {
        Self {
            user: user.into(),
            character: character.into(),
        }
    }
}

impl std::fmt::Display for MemoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user, self.character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        let id = CharacterId::new("yuna");
        assert_eq!(id.to_string(), "yuna");
        assert_eq!(id.as_str(), "yuna");
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id = SessionId::from("s-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"s-1\"");
    }

    #[test]
    fn test_memory_key_equality() {
        let a = MemoryKey::new("u1", "c1");
        let b = MemoryKey::new(UserId::new("u1"), CharacterId::new("c1"));
        let c = MemoryKey::new("u2", "c1");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.to_string(), "u1/c1");
    }
}
