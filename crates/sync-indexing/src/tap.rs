//! Event tap: turns content-change notifications into outbox records.
//!
//! The tap runs inside the caller's write path and must never fail it, so
//! every problem is logged and reported as [`TapOutcome::Failed`] instead
//! of being returned as an error.
//!
//! Deduplication is scoped to a [`TapBatch`] that the caller opens with
//! [`IndexQueueConsumer::begin_batch`] and closes with
//! [`IndexQueueConsumer::end_batch`].

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use sync_storage::{Storage, StorageError};
use sync_types::{ContentEvent, Entity, EventKind, OperationType, OutboxRecord};

use crate::registry::IndexRegistry;

/// Why a notification produced no outbox change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Subject is not an entity
    NotAnEntity,
    /// Notification kind is not tracked
    IgnoredKind,
    /// Entity type has no index
    UnsupportedType,
    /// Entity already handled in this batch
    AlreadyProcessed,
}

/// Result of one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// A new record was queued
    Enqueued(OutboxRecord),
    /// An existing record was re-stamped
    Retouched(OutboxRecord),
    Skipped(SkipReason),
    /// Writing the record failed; the error was logged
    Failed,
}

/// Per-batch state: entities already handled plus counters.
#[derive(Debug, Default)]
pub struct TapBatch {
    processed: HashSet<String>,
    enqueued: usize,
    retouched: usize,
    skipped: usize,
    failed: usize,
}

impl TapBatch {
    fn record(&mut self, outcome: &TapOutcome) {
        match outcome {
            TapOutcome::Enqueued(_) => self.enqueued += 1,
            TapOutcome::Retouched(_) => self.retouched += 1,
            TapOutcome::Skipped(_) => self.skipped += 1,
            TapOutcome::Failed => self.failed += 1,
        }
    }

    pub fn enqueued(&self) -> usize {
        self.enqueued
    }

    pub fn retouched(&self) -> usize {
        self.retouched
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn failed(&self) -> usize {
        self.failed
    }
}

/// Feeds supported entity changes into the outbox.
pub struct IndexQueueConsumer {
    storage: Arc<Storage>,
    registry: Arc<IndexRegistry>,
}

impl IndexQueueConsumer {
    pub fn new(storage: Arc<Storage>, registry: Arc<IndexRegistry>) -> Self {
        Self { storage, registry }
    }

    /// Open a processing batch.
    pub fn begin_batch(&self) -> TapBatch {
        TapBatch::default()
    }

    /// Handle one notification.
    pub fn consume(&self, batch: &mut TapBatch, event: &ContentEvent) -> TapOutcome {
        let outcome = self.handle(batch, event);
        batch.record(&outcome);
        outcome
    }

    /// Close a batch, dropping its deduplication set.
    pub fn end_batch(&self, batch: TapBatch) {
        info!(
            enqueued = batch.enqueued,
            retouched = batch.retouched,
            skipped = batch.skipped,
            failed = batch.failed,
            "Event batch processed"
        );
    }

    fn handle(&self, batch: &mut TapBatch, event: &ContentEvent) -> TapOutcome {
        let Some(entity) = event.entity() else {
            return TapOutcome::Skipped(SkipReason::NotAnEntity);
        };

        let result = match event.kind {
            EventKind::Create | EventKind::Modify | EventKind::Delete => {
                match self.check(batch, entity) {
                    Some(reason) => return TapOutcome::Skipped(reason),
                    None => self.enqueue(entity, event.kind),
                }
            }
            EventKind::ModifyMetadata => match self.check(batch, entity) {
                Some(reason) => return TapOutcome::Skipped(reason),
                None => self.retouch(entity),
            },
            EventKind::Add | EventKind::Remove => {
                return TapOutcome::Skipped(SkipReason::IgnoredKind);
            }
        };

        match result {
            Ok(outcome) => {
                batch.processed.insert(entity.id.clone());
                outcome
            }
            Err(e) => {
                warn!(entity_id = %entity.id, kind = ?event.kind, error = %e, "Could not queue entity for indexing");
                TapOutcome::Failed
            }
        }
    }

    fn check(&self, batch: &TapBatch, entity: &Entity) -> Option<SkipReason> {
        if batch.processed.contains(&entity.id) {
            return Some(SkipReason::AlreadyProcessed);
        }
        if !self.registry.is_supported_entity(entity) {
            debug!(entity_id = %entity.id, entity_type = ?entity.entity_type(), "Entity type not indexed");
            return Some(SkipReason::UnsupportedType);
        }
        None
    }

    fn enqueue(&self, entity: &Entity, kind: EventKind) -> Result<TapOutcome, StorageError> {
        let operation = kind.operation_type().unwrap_or(OperationType::Modify);
        let record = self.storage.create_outbox_record(&entity.id, operation)?;
        Ok(TapOutcome::Enqueued(record))
    }

    /// Re-stamp the newest pending record of the entity, or queue one.
    fn retouch(&self, entity: &Entity) -> Result<TapOutcome, StorageError> {
        let operation = if entity.withdrawn {
            OperationType::Delete
        } else {
            OperationType::Modify
        };

        let existing = self.storage.find_outbox_records_by_item(&entity.id)?.pop();
        match existing {
            Some(mut record) => {
                self.storage.touch_outbox_record(&mut record, operation)?;
                debug!(entity_id = %entity.id, operation = %operation, "Re-touched outbox record");
                Ok(TapOutcome::Retouched(record))
            }
            None => {
                let record = self.storage.create_outbox_record(&entity.id, operation)?;
                Ok(TapOutcome::Enqueued(record))
            }
        }
    }
}
