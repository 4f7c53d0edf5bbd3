//! Command implementations for search-sync.
//!
//! Handles:
//! - ingest: store entities and feed their changes to the event tap
//! - delete: remove entities and queue their removal from the index
//! - drain: push pending outbox records
//! - reindex: rebuild one index from the content store
//! - admin: storage maintenance

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sync_indexing::{
    BulkReindexJob, ContentStore, DrainConfig, DrainReport, DrainWorker,
    HttpIndexClient, HttpIndexClientConfig, IndexClient, IndexDocumentBuilder,
    IndexQueueConsumer, IndexRegistry, ReindexConfig, ReindexReport,
};
use sync_storage::Storage;
use sync_types::{ContentEvent, Entity, EventKind, Settings};

use crate::cli::AdminCommands;

/// Load settings and apply CLI overrides.
pub fn load_settings(
    config_path: Option<&str>,
    log_level: Option<&str>,
    db_path: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(level) = log_level {
        settings.log_level = level.to_string();
    }
    if let Some(path) = db_path {
        settings.db_path = path.to_string();
    }

    Ok(settings)
}

/// Install the global tracing subscriber.
///
/// RUST_LOG wins over the configured level.
pub fn init_tracing(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_level)),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

/// Open the database, creating its parent directory.
pub fn open_storage(settings: &Settings) -> Result<Arc<Storage>> {
    let db_path = settings.expanded_db_path();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    info!("Opening storage at {:?}", db_path);
    let storage = Storage::open(&db_path).context("Failed to open storage")?;
    Ok(Arc::new(storage))
}

/// HTTP client for the configured search service.
pub fn http_client(settings: &Settings) -> Result<Arc<dyn IndexClient>> {
    let config = HttpIndexClientConfig::from_settings(&settings.index);
    let client = HttpIndexClient::new(config).context("Failed to create index client")?;
    Ok(Arc::new(client))
}

/// Read a JSON array of entities.
pub fn read_entities(path: &Path) -> Result<Vec<Entity>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let entities: Vec<Entity> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of entities", path.display()))?;
    Ok(entities)
}

/// Counts reported by [`Pipeline::ingest`] and [`Pipeline::delete`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ChangeSummary {
    /// Entities written or removed in the content store
    pub changed: usize,
    /// Ids that were not found (delete only)
    pub missing: usize,
    /// Outbox records created
    pub enqueued: usize,
    /// Outbox records re-stamped
    pub retouched: usize,
    /// Notifications that produced no outbox change
    pub skipped: usize,
    /// Notifications whose outbox write failed
    pub failed: usize,
}

/// All components wired from one set of settings.
pub struct Pipeline {
    settings: Settings,
    storage: Arc<Storage>,
    registry: Arc<IndexRegistry>,
    builder: Arc<IndexDocumentBuilder>,
    client: Arc<dyn IndexClient>,
}

impl Pipeline {
    pub fn new(settings: Settings, storage: Arc<Storage>, client: Arc<dyn IndexClient>) -> Self {
        let registry = Arc::new(IndexRegistry::from_settings(&settings.entities));
        let builder = Arc::new(IndexDocumentBuilder::from_settings(&settings.entities));
        Self {
            settings,
            storage,
            registry,
            builder,
            client,
        }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    fn tap(&self) -> IndexQueueConsumer {
        IndexQueueConsumer::new(self.storage.clone(), self.registry.clone())
    }

    fn content(&self) -> Arc<dyn ContentStore> {
        self.storage.clone()
    }

    /// Store entities and report each change to the event tap in one batch.
    ///
    /// New entities are reported as creations, existing ones as
    /// modifications, or all as metadata-only changes when asked.
    pub fn ingest(&self, entities: Vec<Entity>, metadata_only: bool) -> Result<ChangeSummary> {
        let tap = self.tap();
        let mut batch = tap.begin_batch();
        let mut summary = ChangeSummary::default();

        for entity in entities {
            let created = self
                .storage
                .put_entity(&entity)
                .with_context(|| format!("Failed to store entity {}", entity.id))?;
            summary.changed += 1;

            let kind = if metadata_only {
                EventKind::ModifyMetadata
            } else if created {
                EventKind::Create
            } else {
                EventKind::Modify
            };
            tap.consume(&mut batch, &ContentEvent::for_entity(kind, entity));
        }

        summary.enqueued = batch.enqueued();
        summary.retouched = batch.retouched();
        summary.skipped = batch.skipped();
        summary.failed = batch.failed();
        tap.end_batch(batch);
        Ok(summary)
    }

    /// Remove entities and report each deletion to the event tap.
    pub fn delete(&self, ids: &[String]) -> Result<ChangeSummary> {
        let tap = self.tap();
        let mut batch = tap.begin_batch();
        let mut summary = ChangeSummary::default();

        for id in ids {
            let removed = self
                .storage
                .delete_entity(id)
                .with_context(|| format!("Failed to delete entity {}", id))?;
            match removed {
                Some(entity) => {
                    summary.changed += 1;
                    tap.consume(&mut batch, &ContentEvent::for_entity(EventKind::Delete, entity));
                }
                None => {
                    warn!(entity_id = %id, "Entity not found");
                    summary.missing += 1;
                }
            }
        }

        summary.enqueued = batch.enqueued();
        summary.retouched = batch.retouched();
        summary.skipped = batch.skipped();
        summary.failed = batch.failed();
        tap.end_batch(batch);
        Ok(summary)
    }

    /// Drain the outbox. `limit` overrides `sync.drain_limit`.
    pub async fn drain(&self, limit: Option<usize>) -> Result<DrainReport> {
        let mut config = DrainConfig::from_settings(&self.settings.sync);
        if let Some(limit) = limit {
            config = config.with_limit(limit);
        }

        let worker = DrainWorker::new(
            self.storage.clone(),
            self.content(),
            self.registry.clone(),
            self.builder.clone(),
            self.client.clone(),
        )
        .with_config(config);

        worker.run().await.context("Outbox drain failed")
    }

    /// Rebuild an index. `max_attempts` overrides `sync.max_attempts`.
    pub async fn reindex(
        &self,
        entity_type: &str,
        index: Option<&str>,
        max_attempts: Option<u32>,
    ) -> Result<ReindexReport> {
        let mut config = ReindexConfig::from_settings(&self.settings.sync);
        if let Some(attempts) = max_attempts {
            if attempts == 0 {
                bail!("--max-attempts must be > 0");
            }
            config = config.with_max_attempts(attempts);
        }

        let job = BulkReindexJob::new(
            self.content(),
            self.registry.clone(),
            self.builder.clone(),
            self.client.clone(),
        )
        .with_config(config);

        job.run(entity_type, index)
            .await
            .with_context(|| format!("Reindex of {} failed", entity_type))
    }
}

/// Handle admin commands.
pub fn handle_admin(storage: &Storage, command: AdminCommands) -> Result<()> {
    match command {
        AdminCommands::Stats => {
            let stats = storage.get_stats().context("Failed to read statistics")?;
            println!("Database Statistics");
            println!("===================");
            println!("Entities:      {}", stats.entity_count);
            println!("Outbox:        {}", stats.outbox_count);
            println!("Disk usage:    {} bytes", stats.disk_usage_bytes);
        }
        AdminCommands::ClearOutbox { yes } => {
            if !yes {
                bail!("Refusing to clear the outbox without --yes");
            }
            let removed = storage
                .delete_all_outbox_records()
                .context("Failed to clear outbox")?;
            println!("Removed {} outbox records", removed);
        }
        AdminCommands::Compact => {
            println!("Compacting...");
            storage.compact().context("Compaction failed")?;
            println!("Compaction complete.");
        }
    }
    Ok(())
}

pub fn print_change_summary(action: &str, summary: &ChangeSummary) {
    println!("{}: {}", action, summary.changed);
    if summary.missing > 0 {
        println!("Not found: {}", summary.missing);
    }
    println!(
        "Outbox: {} queued, {} re-touched, {} skipped, {} failed",
        summary.enqueued, summary.retouched, summary.skipped, summary.failed
    );
}

pub fn print_drain_report(report: &DrainReport) {
    println!("Drain complete");
    println!("  Processed:     {}", report.processed);
    println!("  Pushed:        {}", report.pushed);
    println!("  Deleted:       {}", report.deleted);
    println!("  Skipped:       {}", report.skipped);
    println!("  Failed:        {}", report.failed);
    println!("  Removed:       {}", report.removed);
    println!("  Left queued:   {}", report.left_in_place);
}

pub fn print_reindex_report(report: &ReindexReport) {
    println!("Reindex of {} complete", report.index);
    println!("  Index reset:   {}", report.index_reset);
    println!("  Entities:      {}/{}", report.entities_indexed, report.entities_found);
    println!("  Documents:     {} pushed, {} failed", report.documents_pushed, report.documents_failed);
    println!("  Commits:       {}", report.commits);
}
