//! Entity as seen from the primary content store.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A content entity with multi-valued metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable entity identifier
    pub id: String,

    /// Entity type (e.g. "Publication"); entities without one are never indexed
    #[serde(default)]
    pub entity_type: Option<String>,

    /// Withdrawn entities are removed from the index
    #[serde(default)]
    pub withdrawn: bool,

    /// Metadata field -> ordered values
    #[serde(default)]
    pub metadata: BTreeMap<String, Vec<String>>,
}

impl Entity {
    /// Create an entity of the given type with no metadata.
    pub fn new(id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            entity_type: Some(entity_type.into()),
            withdrawn: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Add a value to a metadata field.
    pub fn with_value(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata
            .entry(field.into())
            .or_default()
            .push(value.into());
        self
    }

    /// Mark as withdrawn.
    pub fn withdrawn(mut self) -> Self {
        self.withdrawn = true;
        self
    }

    /// The entity type, if present and not blank.
    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// Serialize to JSON bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Deserialize from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_entity_type_is_none() {
        let mut entity = Entity::new("e1", "  ");
        assert_eq!(entity.entity_type(), None);

        entity.entity_type = None;
        assert_eq!(entity.entity_type(), None);

        entity.entity_type = Some("Publication".to_string());
        assert_eq!(entity.entity_type(), Some("Publication"));
    }

    #[test]
    fn test_with_value_keeps_order() {
        let entity = Entity::new("e1", "Publication")
            .with_value("author", "Smith")
            .with_value("author", "Jones");
        assert_eq!(entity.metadata["author"], vec!["Smith", "Jones"]);
    }

    #[test]
    fn test_minimal_json_uses_defaults() {
        let entity: Entity = serde_json::from_str(r#"{"id":"e1"}"#).unwrap();
        assert_eq!(entity.entity_type, None);
        assert!(!entity.withdrawn);
        assert!(entity.metadata.is_empty());
    }
}
