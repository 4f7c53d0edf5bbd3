//! RocksDB wrapper for search-sync storage.
//!
//! Provides:
//! - Database open/close with column family setup
//! - Entity store with a per-type index for paged enumeration
//! - The monotonic clock that stamps outbox insertion dates
//! - Admin operations (stats, compaction)

use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, Direction, IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use tracing::{debug, info};

use crate::column_families::{
    build_cf_descriptors, ALL_CF_NAMES, CF_ENTITIES, CF_ENTITY_TYPES, CF_OUTBOX,
};
use crate::error::StorageError;
use crate::keys::{entity_key, entity_type_key, entity_type_prefix, OutboxKey};
use sync_types::Entity;

/// Main storage interface for search-sync
pub struct Storage {
    pub(crate) db: DB,
    /// Last insertion date handed out, in microseconds
    last_insertion_micros: AtomicI64,
}

impl Storage {
    /// Open storage at the given path, creating if necessary
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        info!("Opening storage at {:?}", path);

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_background_jobs(4);

        let cf_descriptors = build_cf_descriptors();
        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        // Resume the clock from the newest queued record
        let last_insertion_micros = Self::load_last_insertion_micros(&db)?;

        Ok(Self {
            db,
            last_insertion_micros: AtomicI64::new(last_insertion_micros),
        })
    }

    /// Find the highest insertion date in the outbox
    fn load_last_insertion_micros(db: &DB) -> Result<i64, StorageError> {
        let cf = db
            .cf_handle(CF_OUTBOX)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(CF_OUTBOX.to_string()))?;

        // Iterate in reverse to find highest key
        let mut iter = db.iterator_cf(cf, IteratorMode::End);
        if let Some(result) = iter.next() {
            let (key, _) = result?;
            let outbox_key = OutboxKey::from_bytes(&key)?;
            return Ok(outbox_key.insertion_micros);
        }
        Ok(0)
    }

    /// Next insertion date, strictly greater than every date handed out before.
    ///
    /// Wall-clock time is used when it moves forward; otherwise the previous
    /// value is bumped by one microsecond.
    pub(crate) fn next_insertion_date(&self) -> Result<DateTime<Utc>, StorageError> {
        let now = Utc::now().timestamp_micros();
        let previous = self
            .last_insertion_micros
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(now.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        let micros = now.max(previous + 1);

        DateTime::from_timestamp_micros(micros)
            .ok_or_else(|| StorageError::Key(format!("Insertion date out of range: {}", micros)))
    }

    pub(crate) fn cf(&self, name: &str) -> Result<&ColumnFamily, StorageError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StorageError::ColumnFamilyNotFound(name.to_string()))
    }

    // ===== Entity Operations =====

    /// Store an entity, replacing any previous version.
    ///
    /// Returns true when the entity did not exist before.
    pub fn put_entity(&self, entity: &Entity) -> Result<bool, StorageError> {
        let entities_cf = self.cf(CF_ENTITIES)?;
        let types_cf = self.cf(CF_ENTITY_TYPES)?;

        let new_type = entity.entity_type();
        if let Some(entity_type) = new_type {
            if entity_type.contains(':') {
                return Err(StorageError::Key(format!(
                    "Entity type must not contain ':': {}",
                    entity_type
                )));
            }
        }

        let previous = self.get_entity(&entity.id)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(entities_cf, entity_key(&entity.id), entity.to_bytes()?);

        // Keep the type index in step with the stored entity
        if let Some(old_type) = previous.as_ref().and_then(|e| e.entity_type()) {
            if Some(old_type) != new_type {
                batch.delete_cf(types_cf, entity_type_key(old_type, &entity.id));
            }
        }
        if let Some(entity_type) = new_type {
            batch.put_cf(types_cf, entity_type_key(entity_type, &entity.id), b"");
        }

        self.db.write(batch)?;
        debug!(entity_id = %entity.id, created = previous.is_none(), "Stored entity");

        Ok(previous.is_none())
    }

    /// Get an entity by id
    pub fn get_entity(&self, id: &str) -> Result<Option<Entity>, StorageError> {
        let cf = self.cf(CF_ENTITIES)?;
        match self.db.get_cf(cf, entity_key(id))? {
            Some(bytes) => Ok(Some(Entity::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Delete an entity, returning the removed version.
    pub fn delete_entity(&self, id: &str) -> Result<Option<Entity>, StorageError> {
        let Some(entity) = self.get_entity(id)? else {
            return Ok(None);
        };

        let mut batch = WriteBatch::default();
        batch.delete_cf(self.cf(CF_ENTITIES)?, entity_key(id));
        if let Some(entity_type) = entity.entity_type() {
            batch.delete_cf(self.cf(CF_ENTITY_TYPES)?, entity_type_key(entity_type, id));
        }
        self.db.write(batch)?;
        debug!(entity_id = %id, "Deleted entity");

        Ok(Some(entity))
    }

    /// Page through the entities of one type, ordered by id.
    pub fn get_entities_by_type(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, StorageError> {
        let types_cf = self.cf(CF_ENTITY_TYPES)?;
        let prefix = entity_type_prefix(entity_type);

        let iter = self.db.iterator_cf(
            types_cf,
            IteratorMode::From(&prefix, Direction::Forward),
        );

        let mut results = Vec::new();
        let mut skipped = 0usize;
        for item in iter {
            if results.len() >= limit {
                break;
            }
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }

            let id = std::str::from_utf8(&key[prefix.len()..])
                .map_err(|e| StorageError::Key(format!("Invalid UTF-8: {}", e)))?;
            match self.get_entity(id)? {
                Some(entity) => results.push(entity),
                None => debug!(entity_id = %id, "Type index points at missing entity"),
            }
        }

        Ok(results)
    }

    /// Flush all column families to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.flush_cf(cf)?;
            }
        }
        Ok(())
    }

    // ===== Admin Operations =====

    /// Trigger manual compaction on all column families.
    pub fn compact(&self) -> Result<(), StorageError> {
        info!("Starting full compaction...");
        self.db.compact_range::<&[u8], &[u8]>(None, None);

        for cf_name in ALL_CF_NAMES {
            if let Some(cf) = self.db.cf_handle(cf_name) {
                self.db.compact_range_cf::<&[u8], &[u8]>(cf, None, None);
            }
        }
        info!("Compaction complete");
        Ok(())
    }

    /// Get database statistics.
    pub fn get_stats(&self) -> Result<StorageStats, StorageError> {
        Ok(StorageStats {
            entity_count: self.count_cf_entries(self.cf(CF_ENTITIES)?)?,
            outbox_count: self.count_cf_entries(self.cf(CF_OUTBOX)?)?,
            disk_usage_bytes: self.get_disk_usage(),
        })
    }

    pub(crate) fn count_cf_entries(&self, cf: &ColumnFamily) -> Result<u64, StorageError> {
        let mut count = 0u64;
        let iter = self.db.iterator_cf(cf, IteratorMode::Start);
        for item in iter {
            item?;
            count += 1;
        }
        Ok(count)
    }

    fn get_disk_usage(&self) -> u64 {
        let path = self.db.path();
        let mut total_size = 0u64;

        if let Ok(entries) = std::fs::read_dir(path) {
            for entry in entries.flatten() {
                if let Ok(metadata) = entry.metadata() {
                    total_size += metadata.len();
                }
            }
        }

        total_size
    }
}

/// Statistics about the storage.
#[derive(Debug, Default)]
pub struct StorageStats {
    /// Number of stored entities
    pub entity_count: u64,
    /// Number of pending outbox records
    pub outbox_count: u64,
    /// Total disk usage in bytes
    pub disk_usage_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_storage() -> (Storage, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let storage = Storage::open(temp_dir.path()).unwrap();
        (storage, temp_dir)
    }

    #[test]
    fn test_open_creates_column_families() {
        let (storage, _temp) = create_test_storage();
        for cf_name in ALL_CF_NAMES {
            assert!(
                storage.db.cf_handle(cf_name).is_some(),
                "CF {} should exist",
                cf_name
            );
        }
    }

    #[test]
    fn test_put_and_get_entity() {
        let (storage, _temp) = create_test_storage();
        let entity = Entity::new("e1", "Publication").with_value("title", "Rust");

        assert!(storage.put_entity(&entity).unwrap());
        assert!(!storage.put_entity(&entity).unwrap());

        let loaded = storage.get_entity("e1").unwrap().unwrap();
        assert_eq!(loaded, entity);
        assert!(storage.get_entity("missing").unwrap().is_none());
    }

    #[test]
    fn test_get_entities_by_type_paginates() {
        let (storage, _temp) = create_test_storage();
        for i in 0..5 {
            storage
                .put_entity(&Entity::new(format!("pub-{}", i), "Publication"))
                .unwrap();
        }
        storage.put_entity(&Entity::new("person-1", "Person")).unwrap();

        let first = storage.get_entities_by_type("Publication", 0, 2).unwrap();
        let second = storage.get_entities_by_type("Publication", 2, 2).unwrap();
        let last = storage.get_entities_by_type("Publication", 4, 2).unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(last.len(), 1);
        assert_eq!(first[0].id, "pub-0");
        assert_eq!(last[0].id, "pub-4");
        assert_eq!(storage.get_entities_by_type("Person", 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_type_change_updates_type_index() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Entity::new("e1", "Publication")).unwrap();
        storage.put_entity(&Entity::new("e1", "Person")).unwrap();

        assert!(storage
            .get_entities_by_type("Publication", 0, 10)
            .unwrap()
            .is_empty());
        assert_eq!(storage.get_entities_by_type("Person", 0, 10).unwrap().len(), 1);
    }

    #[test]
    fn test_delete_entity() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Entity::new("e1", "Publication")).unwrap();

        let removed = storage.delete_entity("e1").unwrap();
        assert_eq!(removed.map(|e| e.id), Some("e1".to_string()));
        assert!(storage.get_entity("e1").unwrap().is_none());
        assert!(storage
            .get_entities_by_type("Publication", 0, 10)
            .unwrap()
            .is_empty());
        assert!(storage.delete_entity("e1").unwrap().is_none());
    }

    #[test]
    fn test_rejects_type_with_colon() {
        let (storage, _temp) = create_test_storage();
        let result = storage.put_entity(&Entity::new("e1", "a:b"));
        assert!(matches!(result, Err(StorageError::Key(_))));
    }

    #[test]
    fn test_insertion_dates_strictly_increase() {
        let (storage, _temp) = create_test_storage();
        let mut previous = storage.next_insertion_date().unwrap();
        for _ in 0..1000 {
            let next = storage.next_insertion_date().unwrap();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn test_get_stats() {
        let (storage, _temp) = create_test_storage();
        storage.put_entity(&Entity::new("e1", "Publication")).unwrap();
        storage.put_entity(&Entity::new("e2", "Publication")).unwrap();

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.entity_count, 2);
        assert_eq!(stats.outbox_count, 0);
    }
}
