//! Identity types for networked entities

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a networked entity, unique per connected player
///
/// The server assigns these as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create a new entity ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_id() {
        let id = EntityId::new("player-7");
        assert_eq!(id.as_str(), "player-7");
        assert_eq!(format!("{}", id), "player-7");
        assert_eq!(id, EntityId::from("player-7"));
    }

    #[test]
    fn test_entity_id_is_transparent() {
        let id: EntityId = ron::from_str("\"truck\"").unwrap();
        assert_eq!(id.as_str(), "truck");
    }
}
