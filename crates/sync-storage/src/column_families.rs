//! Column family definitions for RocksDB.
//!
//! - outbox: pending sync records ordered by insertion date
//! - outbox_index: record-id and item-id lookups into the queue
//! - entities: entity documents keyed by id
//! - entity_types: per-type entity index used for paged enumeration

use rocksdb::{ColumnFamilyDescriptor, Options};

/// Column family name for the outbox queue
pub const CF_OUTBOX: &str = "outbox";

/// Column family name for outbox secondary indexes
pub const CF_OUTBOX_INDEX: &str = "outbox_index";

/// Column family name for entities
pub const CF_ENTITIES: &str = "entities";

/// Column family name for the entity type index
pub const CF_ENTITY_TYPES: &str = "entity_types";

/// All column family names
pub const ALL_CF_NAMES: &[&str] = &[CF_OUTBOX, CF_OUTBOX_INDEX, CF_ENTITIES, CF_ENTITY_TYPES];

/// Create column family options for entities (compressed)
fn entities_options() -> Options {
    let mut opts = Options::default();
    opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
    opts
}

/// Build all column family descriptors
///
/// The outbox keeps the default (level) compaction: FIFO compaction would
/// drop pending records once the size cap is hit.
pub fn build_cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
    vec![
        ColumnFamilyDescriptor::new(CF_OUTBOX, Options::default()),
        ColumnFamilyDescriptor::new(CF_OUTBOX_INDEX, Options::default()),
        ColumnFamilyDescriptor::new(CF_ENTITIES, entities_options()),
        ColumnFamilyDescriptor::new(CF_ENTITY_TYPES, Options::default()),
    ]
}
