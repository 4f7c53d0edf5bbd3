//! Per entity type serialization strategies.

use serde_json::{Map, Value};

use sync_types::Entity;

use crate::error::SyncError;

/// Serializes an entity into its canonical JSON document.
pub trait Crosswalk: Send + Sync {
    fn disseminate(&self, entity: &Entity) -> Result<String, SyncError>;
}

/// Emits `{"id", "entityType", ...metadata}`.
///
/// Single-valued metadata becomes a JSON string, multi-valued metadata a
/// JSON array. With a non-empty `fields` list only those metadata fields
/// are emitted.
#[derive(Debug, Clone, Default)]
pub struct MetadataCrosswalk {
    fields: Vec<String>,
}

impl MetadataCrosswalk {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict output to the given metadata fields.
    pub fn with_fields(mut self, fields: Vec<String>) -> Self {
        self.fields = fields;
        self
    }

    fn emits(&self, field: &str) -> bool {
        self.fields.is_empty() || self.fields.iter().any(|f| f == field)
    }
}

impl Crosswalk for MetadataCrosswalk {
    fn disseminate(&self, entity: &Entity) -> Result<String, SyncError> {
        let entity_type = entity.entity_type().ok_or_else(|| {
            SyncError::InvalidInput(format!("entity {} has no entity type", entity.id))
        })?;

        let mut document = Map::new();
        document.insert("id".to_string(), Value::String(entity.id.clone()));
        document.insert(
            "entityType".to_string(),
            Value::String(entity_type.to_string()),
        );

        for (field, values) in &entity.metadata {
            if !self.emits(field) {
                continue;
            }
            let value = match values.as_slice() {
                [] => continue,
                [single] => Value::String(single.clone()),
                many => Value::Array(many.iter().cloned().map(Value::String).collect()),
            };
            document.insert(field.clone(), value);
        }

        Ok(serde_json::to_string(&Value::Object(document))?)
    }
}
