//! Entity to index documents: conversion followed by denormalization.

use sync_types::{Entity, EntitySettings};

use crate::converter::DocumentConverter;
use crate::denormalizer::Denormalizer;

/// Converter plus denormalizer, shared by the drain worker and the bulk
/// reindex job.
pub struct IndexDocumentBuilder {
    converter: DocumentConverter,
    denormalizer: Denormalizer,
}

impl IndexDocumentBuilder {
    pub fn new(converter: DocumentConverter, denormalizer: Denormalizer) -> Self {
        Self {
            converter,
            denormalizer,
        }
    }

    pub fn from_settings(entities: &[EntitySettings]) -> Self {
        Self::new(
            DocumentConverter::from_settings(entities),
            Denormalizer::from_settings(entities),
        )
    }

    pub fn converter(&self) -> &DocumentConverter {
        &self.converter
    }

    /// Whether documents of this type may be split into several copies.
    pub fn fans_out(&self, entity_type: &str) -> bool {
        !self.denormalizer.fields_for(entity_type).is_empty()
    }

    /// Documents for one entity; empty when conversion produced nothing.
    pub fn build(&self, entity: &Entity) -> Vec<String> {
        let json = self.converter.convert(entity);
        if json.is_empty() {
            return Vec::new();
        }
        match entity.entity_type() {
            Some(entity_type) => self.denormalizer.denormalize(entity_type, &json),
            None => vec![json],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_converts_then_denormalizes() {
        let builder = IndexDocumentBuilder::from_settings(&[
            EntitySettings::new("Publication", "pubs").with_denormalize(&["author"])
        ]);
        let entity = Entity::new("e1", "Publication")
            .with_value("author", "Ann")
            .with_value("author", "Bob");

        let docs = builder.build(&entity);
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("Ann"));
        assert!(docs[1].contains("Bob"));
    }

    #[test]
    fn test_fans_out_only_with_denormalized_fields() {
        let builder = IndexDocumentBuilder::from_settings(&[
            EntitySettings::new("Publication", "pubs").with_denormalize(&["author"]),
            EntitySettings::new("Person", "people"),
        ]);
        assert!(builder.fans_out("Publication"));
        assert!(!builder.fans_out("Person"));
        assert!(!builder.fans_out("Widget"));
    }

    #[test]
    fn test_build_unsupported_entity_is_empty() {
        let builder =
            IndexDocumentBuilder::from_settings(&[EntitySettings::new("Publication", "pubs")]);
        assert!(builder.build(&Entity::new("e1", "Person")).is_empty());
    }
}
