//! Entity to canonical JSON conversion.

use std::collections::HashMap;

use tracing::{debug, warn};

use sync_types::{Entity, EntitySettings};

use crate::crosswalk::{Crosswalk, MetadataCrosswalk};

/// Dispatches conversion to the crosswalk registered for the entity's type.
#[derive(Default)]
pub struct DocumentConverter {
    crosswalks: HashMap<String, Box<dyn Crosswalk>>,
}

impl DocumentConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// One [`MetadataCrosswalk`] per configured entity type.
    pub fn from_settings(entities: &[EntitySettings]) -> Self {
        let mut converter = Self::new();
        for entity in entities {
            converter.register(
                entity.entity_type.clone(),
                Box::new(MetadataCrosswalk::new().with_fields(entity.fields.clone())),
            );
        }
        converter
    }

    /// Register (or replace) the crosswalk for an entity type.
    pub fn register(&mut self, entity_type: impl Into<String>, crosswalk: Box<dyn Crosswalk>) {
        self.crosswalks.insert(entity_type.into(), crosswalk);
    }

    /// Builder form of [`register`](Self::register).
    pub fn with_crosswalk(
        mut self,
        entity_type: impl Into<String>,
        crosswalk: Box<dyn Crosswalk>,
    ) -> Self {
        self.register(entity_type, crosswalk);
        self
    }

    /// Convert an entity to its canonical JSON.
    ///
    /// Returns an empty string when the type has no crosswalk or the
    /// crosswalk fails; the failure is logged.
    pub fn convert(&self, entity: &Entity) -> String {
        let Some(entity_type) = entity.entity_type() else {
            debug!(entity_id = %entity.id, "Entity has no type, nothing to convert");
            return String::new();
        };

        let Some(crosswalk) = self.crosswalks.get(entity_type) else {
            debug!(entity_id = %entity.id, entity_type = %entity_type, "No crosswalk for entity type");
            return String::new();
        };

        match crosswalk.disseminate(entity) {
            Ok(json) => json,
            Err(e) => {
                warn!(entity_id = %entity.id, entity_type = %entity_type, error = %e, "Conversion failed");
                String::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;

    struct FailingCrosswalk;

    impl Crosswalk for FailingCrosswalk {
        fn disseminate(&self, _entity: &Entity) -> Result<String, SyncError> {
            Err(SyncError::Serialization("broken template".to_string()))
        }
    }

    struct FixedCrosswalk(&'static str);

    impl Crosswalk for FixedCrosswalk {
        fn disseminate(&self, _entity: &Entity) -> Result<String, SyncError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_dispatches_by_type() {
        let converter = DocumentConverter::new()
            .with_crosswalk("Publication", Box::new(FixedCrosswalk(r#"{"kind":"pub"}"#)))
            .with_crosswalk("Person", Box::new(FixedCrosswalk(r#"{"kind":"person"}"#)));

        assert_eq!(
            converter.convert(&Entity::new("e1", "Publication")),
            r#"{"kind":"pub"}"#
        );
        assert_eq!(
            converter.convert(&Entity::new("e2", "Person")),
            r#"{"kind":"person"}"#
        );
    }

    #[test]
    fn test_unsupported_type_converts_to_empty() {
        let converter =
            DocumentConverter::new().with_crosswalk("Publication", Box::new(FixedCrosswalk("{}")));
        assert_eq!(converter.convert(&Entity::new("e1", "Widget")), "");
    }

    #[test]
    fn test_crosswalk_failure_converts_to_empty() {
        let converter =
            DocumentConverter::new().with_crosswalk("Publication", Box::new(FailingCrosswalk));
        assert_eq!(converter.convert(&Entity::new("e1", "Publication")), "");
    }

    #[test]
    fn test_from_settings_uses_field_projection() {
        let converter = DocumentConverter::from_settings(&[
            EntitySettings::new("Publication", "pubs").with_fields(&["title"])
        ]);
        let entity = Entity::new("e1", "Publication")
            .with_value("title", "Rust")
            .with_value("secret", "x");

        let json = converter.convert(&entity);
        assert!(json.contains("Rust"));
        assert!(!json.contains("secret"));
    }
}
