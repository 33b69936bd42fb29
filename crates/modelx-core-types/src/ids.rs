//! Identity newtypes for graph elements and recorded operations
//!
//! Element ids are produced by the identifier generator in `modelx-core`;
//! this crate only fixes their representation so every layer agrees on it.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of an element in the model graph
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ElementId(String);

impl ElementId {
    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization and tests)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    /// Consume the id and return the inner string
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for ElementId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ElementId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a recorded operation batch
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationId(String);

impl OperationId {
    /// Generate a new time-ordered OperationId using UUIDv7
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (for deserialization)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for OperationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OperationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_id_generation() {
        let id1 = OperationId::new();
        let id2 = OperationId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_element_id_display() {
        let id = ElementId::from("AAAB");
        assert_eq!(format!("{}", id), "AAAB");
        assert_eq!(id.as_str(), "AAAB");
    }

    #[test]
    fn test_element_id_serializes_as_plain_string() {
        let id = ElementId::from("e-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"e-1\"");

        let back: ElementId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
