//! Access to the primary content store.

use sync_storage::Storage;
use sync_types::Entity;

use crate::error::SyncError;

/// What the jobs need from the primary content store.
pub trait ContentStore: Send + Sync {
    /// Load the live entity, if it still exists.
    fn find_entity(&self, id: &str) -> Result<Option<Entity>, SyncError>;

    /// One page of entities of a type. Order is whatever the store provides.
    fn find_by_type(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, SyncError>;

    /// Commit the current unit of work.
    fn commit(&self) -> Result<(), SyncError>;
}

impl ContentStore for Storage {
    fn find_entity(&self, id: &str) -> Result<Option<Entity>, SyncError> {
        Ok(self.get_entity(id)?)
    }

    fn find_by_type(
        &self,
        entity_type: &str,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Entity>, SyncError> {
        self.get_entities_by_type(entity_type, offset, limit)
            .map_err(|e| SyncError::Content(e.to_string()))
    }

    /// Writes are already durable per batch; this flushes memtables.
    fn commit(&self) -> Result<(), SyncError> {
        Ok(self.flush()?)
    }
}
