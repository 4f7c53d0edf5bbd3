//! Expands multi-valued fields into separate index documents.
//!
//! For each entity type an ordered list of fields is configured. The first
//! configured field present as an array explodes the document into one
//! copy per non-blank element. Every later array field refines the already
//! expanded set, so the result is the cross product of the element counts
//! of all configured array fields.
//!
//! An array with no non-blank elements removes the field and keeps the
//! document rather than dropping it. Scalar values of configured fields are
//! left as they are.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use sync_types::EntitySettings;

/// Configured fan-out per entity type.
#[derive(Debug, Clone, Default)]
pub struct Denormalizer {
    mapping: HashMap<String, Vec<String>>,
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Non-blank elements of `field` in `original`, or None when it is not an array.
fn exploded_values<'a>(original: &'a Map<String, Value>, field: &str) -> Option<Vec<&'a Value>> {
    match original.get(field) {
        Some(Value::Array(items)) => Some(items.iter().filter(|v| !is_blank(v)).collect()),
        _ => None,
    }
}

/// One copy of `document` per value, with `field` set to that value.
fn expand(document: &Map<String, Value>, field: &str, values: &[&Value]) -> Vec<Map<String, Value>> {
    if values.is_empty() {
        let mut kept = document.clone();
        kept.remove(field);
        return vec![kept];
    }
    values
        .iter()
        .map(|value| {
            let mut copy = document.clone();
            copy.insert(field.to_string(), (*value).clone());
            copy
        })
        .collect()
}

impl Denormalizer {
    pub fn new(mapping: HashMap<String, Vec<String>>) -> Self {
        Self { mapping }
    }

    /// Mapping from each entity type's `denormalize` list.
    pub fn from_settings(entities: &[EntitySettings]) -> Self {
        let mapping = entities
            .iter()
            .filter(|e| !e.denormalize.is_empty())
            .map(|e| (e.entity_type.clone(), e.denormalize.clone()))
            .collect();
        Self::new(mapping)
    }

    /// Fields configured for an entity type.
    pub fn fields_for(&self, entity_type: &str) -> &[String] {
        self.mapping
            .get(entity_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Expand `json` into one or more documents.
    ///
    /// Returns `[json]` unchanged when nothing is configured for the type,
    /// none of the configured fields is an array in `json`, or `json` is not
    /// a JSON object.
    pub fn denormalize(&self, entity_type: &str, json: &str) -> Vec<String> {
        let fields = self.fields_for(entity_type);
        if fields.is_empty() {
            return vec![json.to_string()];
        }

        let original = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!(entity_type = %entity_type, "Document is not a JSON object, not denormalizing");
                return vec![json.to_string()];
            }
            Err(e) => {
                warn!(entity_type = %entity_type, error = %e, "Malformed document, not denormalizing");
                return vec![json.to_string()];
            }
        };

        let mut current: Vec<Map<String, Value>> = Vec::new();
        for field in fields {
            let Some(values) = exploded_values(&original, field) else {
                continue;
            };

            current = if current.is_empty() {
                expand(&original, field, &values)
            } else {
                current
                    .iter()
                    .flat_map(|document| expand(document, field, &values))
                    .collect()
            };
        }

        if current.is_empty() {
            return vec![json.to_string()];
        }

        current
            .into_iter()
            .filter_map(|document| match serde_json::to_string(&Value::Object(document)) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!(entity_type = %entity_type, error = %e, "Could not serialize expanded document");
                    None
                }
            })
            .collect()
    }
}
