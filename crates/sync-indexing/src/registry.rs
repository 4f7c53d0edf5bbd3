//! Entity type to index name mapping.
//!
//! The mapping is built once at startup. Entity types with a registered
//! [`IndexNameGenerator`] get their index name recomputed at that point,
//! which is how date-stamped index names are produced.

use std::collections::{BTreeSet, HashMap};

use chrono::{Datelike, Utc};
use tracing::{debug, info};

use sync_types::{Entity, EntitySettings};

/// Computes an index name at startup.
///
/// A blank result keeps the configured name.
pub trait IndexNameGenerator: Send + Sync {
    fn generate(&self, configured: &str) -> String;
}

impl<F> IndexNameGenerator for F
where
    F: Fn(&str) -> String + Send + Sync,
{
    fn generate(&self, configured: &str) -> String {
        self(configured)
    }
}

/// Appends `-{current year}` to the configured name.
#[derive(Debug, Clone, Copy, Default)]
pub struct YearSuffixGenerator;

impl IndexNameGenerator for YearSuffixGenerator {
    fn generate(&self, configured: &str) -> String {
        format!("{}-{}", configured, Utc::now().year())
    }
}

/// Expands a trailing `-{DATE.yyyy}` (or `-{DATE.yy}`) template.
///
/// Names without the template produce a blank result.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTemplateGenerator;

impl DateTemplateGenerator {
    fn expand(configured: &str, year: i32) -> Option<String> {
        let body = configured.strip_suffix('}')?;
        let (prefix, pattern) = body.rsplit_once("-{DATE.")?;
        if pattern.len() < 2
            || pattern.len() > 4
            || !pattern.chars().all(|c| c == 'y' || c == 'Y')
        {
            return None;
        }
        let year = if pattern.len() == 2 {
            format!("{:02}", year.rem_euclid(100))
        } else {
            year.to_string()
        };
        Some(format!("{}-{}", prefix, year))
    }

    /// True when the name carries a date template.
    pub fn matches(configured: &str) -> bool {
        Self::expand(configured, 2000).is_some()
    }
}

impl IndexNameGenerator for DateTemplateGenerator {
    fn generate(&self, configured: &str) -> String {
        Self::expand(configured, Utc::now().year()).unwrap_or_default()
    }
}

/// Holds `entity type -> index name`.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    indexes: HashMap<String, String>,
}

impl IndexRegistry {
    /// Build the registry, applying each type's generator once.
    pub fn new(
        mapping: HashMap<String, String>,
        generators: HashMap<String, Box<dyn IndexNameGenerator>>,
    ) -> Self {
        let mut indexes = mapping;
        for (entity_type, generator) in &generators {
            let Some(configured) = indexes.get_mut(entity_type) else {
                debug!(entity_type = %entity_type, "Generator registered for unmapped type");
                continue;
            };
            let generated = generator.generate(configured);
            if !generated.trim().is_empty() {
                debug!(entity_type = %entity_type, from = %configured, to = %generated, "Generated index name");
                *configured = generated;
            }
        }
        Self { indexes }
    }

    /// Build the registry from entity settings.
    ///
    /// `year_suffix` registers [`YearSuffixGenerator`]; a name ending in a
    /// `{DATE.yyyy}` template registers [`DateTemplateGenerator`].
    pub fn from_settings(entities: &[EntitySettings]) -> Self {
        let mut mapping = HashMap::new();
        let mut generators: HashMap<String, Box<dyn IndexNameGenerator>> = HashMap::new();

        for entity in entities {
            mapping.insert(entity.entity_type.clone(), entity.index.clone());
            if DateTemplateGenerator::matches(&entity.index) {
                generators.insert(entity.entity_type.clone(), Box::new(DateTemplateGenerator));
            } else if entity.year_suffix {
                generators.insert(entity.entity_type.clone(), Box::new(YearSuffixGenerator));
            }
        }

        let registry = Self::new(mapping, generators);
        info!(entity_types = registry.indexes.len(), "Index registry ready");
        registry
    }

    /// Index name for an entity type.
    pub fn index_for(&self, entity_type: &str) -> Option<&str> {
        self.indexes.get(entity_type).map(String::as_str)
    }

    pub fn is_supported_entity_type(&self, entity_type: &str) -> bool {
        self.indexes.contains_key(entity_type)
    }

    /// Entities without type metadata are never supported.
    pub fn is_supported_entity(&self, entity: &Entity) -> bool {
        entity
            .entity_type()
            .is_some_and(|t| self.is_supported_entity_type(t))
    }

    /// Registered entity types, sorted.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.indexes.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Distinct index names, sorted.
    pub fn index_names(&self) -> Vec<&str> {
        self.indexes
            .values()
            .map(String::as_str)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
