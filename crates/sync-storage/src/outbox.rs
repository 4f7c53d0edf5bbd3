//! Outbox queue operations.
//!
//! Records live in the `outbox` column family under time-ordered keys, so
//! the first key is always the oldest pending record. The `outbox_index`
//! column family maps record ids to their current queue key and item ids to
//! their records.

use rocksdb::{Direction, IteratorMode, WriteBatch};
use std::collections::HashMap;
use tracing::{debug, info};
use ulid::Ulid;

use crate::column_families::{CF_OUTBOX, CF_OUTBOX_INDEX};
use crate::db::Storage;
use crate::error::StorageError;
use crate::keys::{
    outbox_id_key, outbox_item_key, outbox_item_prefix, parse_outbox_item_key, OutboxKey,
};
use sync_types::{OperationType, OutboxRecord};

fn parse_record_id(id: &str) -> Result<Ulid, StorageError> {
    Ulid::from_string(id).map_err(|e| StorageError::Key(format!("Invalid record id {}: {}", id, e)))
}

fn queue_key_for(record: &OutboxRecord) -> Result<OutboxKey, StorageError> {
    Ok(OutboxKey::new(
        record.insertion_date.timestamp_micros(),
        parse_record_id(&record.id)?,
    ))
}

impl Storage {
    /// Queue a new record for `item_id`.
    pub fn create_outbox_record(
        &self,
        item_id: &str,
        operation_type: OperationType,
    ) -> Result<OutboxRecord, StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;

        let record_id = Ulid::new();
        let record = OutboxRecord::new(
            record_id.to_string(),
            item_id,
            operation_type,
            self.next_insertion_date()?,
        );
        let queue_key = queue_key_for(&record)?.to_bytes();

        // Queue entry and both lookups land together
        let mut batch = WriteBatch::default();
        batch.put_cf(outbox_cf, &queue_key, record.to_bytes()?);
        batch.put_cf(index_cf, outbox_id_key(&record.id), &queue_key);
        batch.put_cf(index_cf, outbox_item_key(item_id, &record.id), b"");
        self.db.write(batch)?;

        debug!(
            record_id = %record.id,
            item_id = %item_id,
            operation = %operation_type,
            "Created outbox record"
        );
        Ok(record)
    }

    /// Current queue key of a record, if the record exists.
    fn current_queue_key(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;
        Ok(self.db.get_cf(index_cf, outbox_id_key(id))?)
    }

    fn read_queue_entry(&self, queue_key: &[u8]) -> Result<Option<OutboxRecord>, StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        match self.db.get_cf(outbox_cf, queue_key)? {
            Some(bytes) => Ok(Some(OutboxRecord::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Find a record by its id.
    pub fn find_outbox_record(&self, id: &str) -> Result<Option<OutboxRecord>, StorageError> {
        match self.current_queue_key(id)? {
            Some(queue_key) => self.read_queue_entry(&queue_key),
            None => Ok(None),
        }
    }

    /// All pending records of one item, oldest first.
    pub fn find_outbox_records_by_item(
        &self,
        item_id: &str,
    ) -> Result<Vec<OutboxRecord>, StorageError> {
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;
        let prefix = outbox_item_prefix(item_id);

        let iter = self
            .db
            .iterator_cf(index_cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut records = Vec::new();
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(&prefix) {
                break;
            }
            // "a:b" shares the "a:" prefix, so match the item id exactly
            let (key_item_id, record_id) = parse_outbox_item_key(&key)?;
            if key_item_id != item_id {
                continue;
            }
            if let Some(record) = self.find_outbox_record(&record_id)? {
                records.push(record);
            }
        }

        records.sort_by(|a, b| a.insertion_date.cmp(&b.insertion_date));
        Ok(records)
    }

    /// Persist a changed record, moving it in the queue when its date changed.
    pub fn update_outbox_record(&self, record: &OutboxRecord) -> Result<(), StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;

        let old_key = self
            .current_queue_key(&record.id)?
            .ok_or_else(|| StorageError::NotFound(format!("outbox record {}", record.id)))?;
        let new_key = queue_key_for(record)?.to_bytes();

        let mut batch = WriteBatch::default();
        if old_key != new_key {
            batch.delete_cf(outbox_cf, &old_key);
        }
        batch.put_cf(outbox_cf, &new_key, record.to_bytes()?);
        batch.put_cf(index_cf, outbox_id_key(&record.id), &new_key);

        if let Some(previous) = self.read_queue_entry(&old_key)? {
            if previous.item_id != record.item_id {
                batch.delete_cf(index_cf, outbox_item_key(&previous.item_id, &record.id));
                batch.put_cf(index_cf, outbox_item_key(&record.item_id, &record.id), b"");
            }
        }

        self.db.write(batch)?;
        debug!(record_id = %record.id, item_id = %record.item_id, "Updated outbox record");
        Ok(())
    }

    /// Re-stamp a record with a new operation and a fresh insertion date.
    ///
    /// The record moves to the back of the queue and any reader holding the
    /// old date will see it as modified.
    pub fn touch_outbox_record(
        &self,
        record: &mut OutboxRecord,
        operation_type: OperationType,
    ) -> Result<(), StorageError> {
        record.operation_type = operation_type;
        record.insertion_date = self.next_insertion_date()?;
        self.update_outbox_record(record)
    }

    /// Stage deletion of the record stored under `queue_key` and its lookups
    /// into `batch`.
    fn stage_outbox_delete(
        &self,
        batch: &mut WriteBatch,
        id: &str,
        queue_key: &[u8],
    ) -> Result<(), StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;

        if let Some(stored) = self.read_queue_entry(queue_key)? {
            batch.delete_cf(index_cf, outbox_item_key(&stored.item_id, id));
        }
        batch.delete_cf(outbox_cf, queue_key);
        batch.delete_cf(index_cf, outbox_id_key(id));
        Ok(())
    }

    /// Delete a record by id. Returns false when it was already gone.
    pub fn delete_outbox_record(&self, record: &OutboxRecord) -> Result<bool, StorageError> {
        let Some(queue_key) = self.current_queue_key(&record.id)? else {
            return Ok(false);
        };
        let mut batch = WriteBatch::default();
        self.stage_outbox_delete(&mut batch, &record.id, &queue_key)?;
        self.db.write(batch)?;
        debug!(record_id = %record.id, item_id = %record.item_id, "Deleted outbox record");
        Ok(true)
    }

    /// Oldest pending record, if any.
    pub fn first_outbox_record(&self) -> Result<Option<OutboxRecord>, StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        let mut iter = self.db.iterator_cf(
            outbox_cf,
            IteratorMode::From(OutboxKey::prefix(), Direction::Forward),
        );

        match iter.next() {
            Some(item) => {
                let (_, value) = item?;
                Ok(Some(OutboxRecord::from_bytes(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Remove every pending record. Irreversible.
    pub fn delete_all_outbox_records(&self) -> Result<usize, StorageError> {
        let outbox_cf = self.cf(CF_OUTBOX)?;
        let index_cf = self.cf(CF_OUTBOX_INDEX)?;

        let mut batch = WriteBatch::default();
        let mut deleted = 0usize;

        for item in self.db.iterator_cf(outbox_cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(outbox_cf, &key);
            deleted += 1;
        }
        for item in self.db.iterator_cf(index_cf, IteratorMode::Start) {
            let (key, _) = item?;
            batch.delete_cf(index_cf, &key);
        }

        self.db.write(batch)?;
        info!(deleted, "Deleted all outbox records");
        Ok(deleted)
    }

    /// Number of pending records.
    pub fn outbox_len(&self) -> Result<u64, StorageError> {
        self.count_cf_entries(self.cf(CF_OUTBOX)?)
    }

    /// Start a unit of work for a drain run.
    pub fn begin_outbox_transaction(&self) -> OutboxTransaction<'_> {
        OutboxTransaction {
            storage: self,
            deleted: HashMap::new(),
            cursor: None,
            committed: false,
        }
    }
}

/// A drain unit of work over the outbox.
///
/// Deletes are staged against the queue key the record had when it was
/// deleted, and hidden from this transaction's own reads until
/// [`commit`](Self::commit) writes them in one batch. Dropping the
/// transaction without committing discards them.
///
/// A record re-touched after its delete was staged has moved to a new
/// queue key. The transaction returns it again and the stale delete is
/// dropped, so the newer change is never lost.
///
/// Records queued by other writers while the transaction is open stay
/// visible to it.
pub struct OutboxTransaction<'a> {
    storage: &'a Storage,
    /// record id -> queue key at the time the delete was staged
    deleted: HashMap<String, Vec<u8>>,
    /// Every queue key below this one was deleted in this transaction
    cursor: Option<Vec<u8>>,
    committed: bool,
}

impl<'a> OutboxTransaction<'a> {
    /// Oldest record not deleted in this transaction.
    pub fn first_record(&mut self) -> Result<Option<OutboxRecord>, StorageError> {
        let outbox_cf = self.storage.cf(CF_OUTBOX)?;
        let start = self
            .cursor
            .clone()
            .unwrap_or_else(|| OutboxKey::prefix().to_vec());

        let iter = self
            .storage
            .db
            .iterator_cf(outbox_cf, IteratorMode::From(&start, Direction::Forward));

        for item in iter {
            let (key, value) = item?;
            if !key.starts_with(OutboxKey::prefix()) {
                break;
            }
            let record = OutboxRecord::from_bytes(&value)?;
            match self.deleted.get(&record.id) {
                Some(staged_key) if staged_key.as_slice() == &*key => continue,
                Some(_) => {
                    debug!(record_id = %record.id, item_id = %record.item_id, "Record re-queued after delete was staged");
                    self.deleted.remove(&record.id);
                }
                None => {}
            }
            self.cursor = Some(key.to_vec());
            return Ok(Some(record));
        }

        Ok(None)
    }

    /// Find a record by id, as seen by this transaction.
    pub fn find(&self, id: &str) -> Result<Option<OutboxRecord>, StorageError> {
        let Some(queue_key) = self.storage.current_queue_key(id)? else {
            return Ok(None);
        };
        if self.deleted.get(id) == Some(&queue_key) {
            return Ok(None);
        }
        self.storage.read_queue_entry(&queue_key)
    }

    /// Stage deletion of a record. Returns false when it is already gone.
    pub fn delete(&mut self, record: &OutboxRecord) -> Result<bool, StorageError> {
        let Some(queue_key) = self.storage.current_queue_key(&record.id)? else {
            return Ok(false);
        };
        if self.deleted.get(&record.id) == Some(&queue_key) {
            return Ok(false);
        }
        self.deleted.insert(record.id.clone(), queue_key);
        Ok(true)
    }

    /// Write the staged deletes atomically.
    ///
    /// A delete is only written when the record still sits under the queue
    /// key it was staged with. Returns the number of records removed.
    pub fn commit(mut self) -> Result<usize, StorageError> {
        let mut batch = WriteBatch::default();
        let mut removed = 0usize;

        for (id, staged_key) in &self.deleted {
            match self.storage.current_queue_key(id)? {
                Some(current) if current == *staged_key => {
                    self.storage.stage_outbox_delete(&mut batch, id, staged_key)?;
                    removed += 1;
                }
                Some(_) => {
                    debug!(record_id = %id, "Record re-queued before commit, keeping it");
                }
                None => {}
            }
        }

        self.storage.db.write(batch)?;
        self.committed = true;
        debug!(removed, "Committed outbox transaction");
        Ok(removed)
    }
}

impl Drop for OutboxTransaction<'_> {
    fn drop(&mut self) {
        if !self.committed && !self.deleted.is_empty() {
            debug!(
                discarded = self.deleted.len(),
                "Outbox transaction rolled back"
            );
        }
    }
}
