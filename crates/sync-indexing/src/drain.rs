//! Drain worker: pushes every pending outbox record to the external index.
//!
//! One run is one unit of work. Records are read oldest first inside an
//! [`OutboxTransaction`]; a record is deleted only when its insertion date
//! is unchanged since it was read. Deletes are committed together at the
//! end, and any error rolls the whole run back.
//!
//! Index removals go through [`IndexClient::delete_item_documents`], so the
//! denormalized copies a bulk reindex wrote for an item are removed along
//! with it. Pushes of a type that fans out purge those copies first.
//!
//! A record that keeps being re-touched between the push and the check is
//! never removed, so an entity under constant modification can keep a
//! drain busy indefinitely unless a `limit` is set.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use sync_storage::{OutboxTransaction, Storage};
use sync_types::{Entity, OperationType, OutboxRecord, SyncSettings};

use crate::client::IndexClient;
use crate::content::ContentStore;
use crate::builder::IndexDocumentBuilder;
use crate::error::SyncError;
use crate::registry::IndexRegistry;

/// Configuration for a drain run.
#[derive(Debug, Clone, Default)]
pub struct DrainConfig {
    /// Stop after this many records (0 = until the outbox is empty)
    pub limit: usize,
}

impl DrainConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            limit: settings.drain_limit,
        }
    }

    /// Set the record limit.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

/// Counters for a drain run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Records read from the outbox
    pub processed: u64,
    /// Documents accepted by the index
    pub pushed: u64,
    /// Documents removed from the index
    pub deleted: u64,
    /// Records that produced no document
    pub skipped: u64,
    /// Pushes or deletes the index refused
    pub failed: u64,
    /// Records removed from the outbox
    pub removed: u64,
    /// Records modified while being processed and left queued
    pub left_in_place: u64,
}

/// Pushes outbox records to the index.
pub struct DrainWorker {
    storage: Arc<Storage>,
    content: Arc<dyn ContentStore>,
    registry: Arc<IndexRegistry>,
    builder: Arc<IndexDocumentBuilder>,
    client: Arc<dyn IndexClient>,
    config: DrainConfig,
}

impl DrainWorker {
    pub fn new(
        storage: Arc<Storage>,
        content: Arc<dyn ContentStore>,
        registry: Arc<IndexRegistry>,
        builder: Arc<IndexDocumentBuilder>,
        client: Arc<dyn IndexClient>,
    ) -> Self {
        Self {
            storage,
            content,
            registry,
            builder,
            client,
            config: DrainConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DrainConfig) -> Self {
        self.config = config;
        self
    }

    /// Drain the outbox.
    ///
    /// An empty outbox is a successful no-op.
    pub async fn run(&self) -> Result<DrainReport, SyncError> {
        info!(limit = self.config.limit, "Starting outbox drain");

        let mut tx = self.storage.begin_outbox_transaction();
        let mut report = match self.drain(&mut tx).await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "Drain aborted, rolling back");
                return Err(e);
            }
        };

        report.removed = tx.commit()? as u64;
        self.content.commit()?;

        info!(
            processed = report.processed,
            pushed = report.pushed,
            deleted = report.deleted,
            skipped = report.skipped,
            failed = report.failed,
            removed = report.removed,
            left_in_place = report.left_in_place,
            "Outbox drain complete"
        );
        Ok(report)
    }

    async fn drain(&self, tx: &mut OutboxTransaction<'_>) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();

        while let Some(record) = tx.first_record()? {
            self.process(&record, &mut report).await?;

            match tx.find(&record.id)? {
                Some(current) if current.is_unmodified_since(&record) => {
                    tx.delete(&record)?;
                }
                Some(_) => {
                    debug!(record_id = %record.id, item_id = %record.item_id, "Record modified during drain, leaving it queued");
                    report.left_in_place += 1;
                }
                None => debug!(record_id = %record.id, "Record vanished during drain"),
            }

            report.processed += 1;
            if self.config.limit > 0 && report.processed >= self.config.limit as u64 {
                debug!(limit = self.config.limit, "Drain limit reached");
                break;
            }
        }

        Ok(report)
    }

    async fn process(&self, record: &OutboxRecord, report: &mut DrainReport) -> Result<(), SyncError> {
        let entity = self.content.find_entity(&record.item_id)?;

        let removal = record.operation_type == OperationType::Delete
            || entity.as_ref().is_some_and(|e| e.withdrawn);
        if removal {
            return self.remove(record, entity.as_ref(), report).await;
        }

        let Some(entity) = entity else {
            warn!(item_id = %record.item_id, operation = %record.operation_type, "Entity not found, no document produced");
            report.skipped += 1;
            return Ok(());
        };

        let Some((entity_type, index)) = entity
            .entity_type()
            .and_then(|t| self.registry.index_for(t).map(|index| (t, index)))
        else {
            debug!(item_id = %record.item_id, "Entity type no longer indexed");
            report.skipped += 1;
            return Ok(());
        };

        let json = self.builder.converter().convert(&entity);
        if json.is_empty() {
            warn!(item_id = %record.item_id, operation = %record.operation_type, "Could not convert entity");
            report.skipped += 1;
            return Ok(());
        }

        if self.builder.fans_out(entity_type)
            && !self.client.delete_item_documents(index, &record.item_id).await?
        {
            warn!(item_id = %record.item_id, index = %index, "Index refused purge of denormalized copies");
        }

        if self.client.index_document(index, &record.item_id, &json).await? {
            debug!(item_id = %record.item_id, index = %index, "Pushed document");
            report.pushed += 1;
        } else {
            warn!(item_id = %record.item_id, index = %index, "Index rejected document");
            report.failed += 1;
        }
        Ok(())
    }

    /// Remove the entity's documents from its index, or from every index
    /// when the entity itself is gone.
    async fn remove(
        &self,
        record: &OutboxRecord,
        entity: Option<&Entity>,
        report: &mut DrainReport,
    ) -> Result<(), SyncError> {
        let targets: Vec<&str> = match entity {
            Some(entity) => entity
                .entity_type()
                .and_then(|t| self.registry.index_for(t))
                .into_iter()
                .collect(),
            None => self.registry.index_names(),
        };

        if targets.is_empty() {
            report.skipped += 1;
            return Ok(());
        }

        for index in targets {
            if self.client.delete_item_documents(index, &record.item_id).await? {
                debug!(item_id = %record.item_id, index = %index, "Deleted documents");
                report.deleted += 1;
            } else {
                warn!(item_id = %record.item_id, index = %index, "Index refused document delete");
                report.failed += 1;
            }
        }
        Ok(())
    }
}
