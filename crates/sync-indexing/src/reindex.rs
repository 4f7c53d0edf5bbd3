//! Bulk reindex: rebuild one index from scratch, bypassing the outbox.
//!
//! The target index is reset first, then every entity of the type is
//! enumerated page by page, converted, denormalized and pushed. A document
//! that keeps failing is skipped after the retry policy gives up; only
//! enumeration errors and a failed reset abort the job.

use std::sync::Arc;

use chrono::{Datelike, Utc};
use tracing::{debug, error, info, warn};

use sync_types::{Entity, SyncSettings};

use crate::builder::IndexDocumentBuilder;
use crate::client::{IndexClient, IndexStatus};
use crate::content::ContentStore;
use crate::error::SyncError;
use crate::registry::IndexRegistry;
use crate::retry::{push_with_retry, FixedAttempts, RetryPolicy};

/// Configuration for a bulk reindex.
#[derive(Debug, Clone)]
pub struct ReindexConfig {
    /// Push attempts per document
    pub max_attempts: u32,
    /// Entities fetched per page
    pub page_size: usize,
    /// Entities processed between commits
    pub commit_interval: usize,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            page_size: 20,
            commit_interval: 20,
        }
    }
}

impl ReindexConfig {
    pub fn from_settings(settings: &SyncSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            page_size: settings.page_size,
            commit_interval: settings.commit_interval,
        }
    }

    /// Set the attempts per document.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Set the commit interval.
    pub fn with_commit_interval(mut self, interval: usize) -> Self {
        self.commit_interval = interval;
        self
    }
}

/// Outcome of a bulk reindex.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReindexReport {
    /// Index that was rebuilt
    pub index: String,
    /// Whether an existing index was deleted first
    pub index_reset: bool,
    /// Entities enumerated
    pub entities_found: u64,
    /// Entities with at least one document indexed
    pub entities_indexed: u64,
    /// Documents accepted by the index
    pub documents_pushed: u64,
    /// Documents skipped after exhausting retries
    pub documents_failed: u64,
    /// Unit-of-work commits performed
    pub commits: u64,
}

impl ReindexReport {
    fn record_entity(&mut self, pushed: u64, failed: u64) {
        self.entities_found += 1;
        self.documents_pushed += pushed;
        self.documents_failed += failed;
        if pushed > 0 {
            self.entities_indexed += 1;
        }
    }
}

/// Default target index: `{lowercase type}-{current year}`.
pub fn default_index_name(entity_type: &str) -> String {
    format!("{}-{}", entity_type.to_lowercase(), Utc::now().year())
}

/// Document id for the `n`th document built from one entity.
fn document_id(item_id: &str, n: usize, total: usize) -> String {
    if total == 1 {
        item_id.to_string()
    } else {
        format!("{}_{}", item_id, n)
    }
}

/// Rebuilds an index from the primary content store.
pub struct BulkReindexJob {
    content: Arc<dyn ContentStore>,
    registry: Arc<IndexRegistry>,
    builder: Arc<IndexDocumentBuilder>,
    client: Arc<dyn IndexClient>,
    retry: Box<dyn RetryPolicy>,
    config: ReindexConfig,
}

impl BulkReindexJob {
    pub fn new(
        content: Arc<dyn ContentStore>,
        registry: Arc<IndexRegistry>,
        builder: Arc<IndexDocumentBuilder>,
        client: Arc<dyn IndexClient>,
    ) -> Self {
        let config = ReindexConfig::default();
        Self {
            content,
            registry,
            builder,
            client,
            retry: Box::new(FixedAttempts::new(config.max_attempts)),
            config,
        }
    }

    /// Apply a configuration; resets the retry policy to its attempt count.
    pub fn with_config(mut self, config: ReindexConfig) -> Self {
        self.retry = Box::new(FixedAttempts::new(config.max_attempts));
        self.config = config;
        self
    }

    /// Replace the retry policy.
    pub fn with_retry_policy(mut self, policy: Box<dyn RetryPolicy>) -> Self {
        self.retry = policy;
        self
    }

    /// Rebuild `index` (or the default name) with every entity of `entity_type`.
    pub async fn run(
        &self,
        entity_type: &str,
        index: Option<&str>,
    ) -> Result<ReindexReport, SyncError> {
        if entity_type.trim().is_empty() {
            return Err(SyncError::InvalidInput("entity type must be provided".to_string()));
        }
        if !self.registry.is_supported_entity_type(entity_type) {
            return Err(SyncError::UnsupportedEntityType(entity_type.to_string()));
        }
        if self.config.page_size == 0 || self.config.commit_interval == 0 {
            return Err(SyncError::InvalidInput(
                "page size and commit interval must be > 0".to_string(),
            ));
        }

        let index = match index.map(str::trim).filter(|i| !i.is_empty()) {
            Some(index) => index.to_string(),
            None => default_index_name(entity_type),
        };

        info!(entity_type = %entity_type, index = %index, max_attempts = self.retry.max_attempts(), "Starting bulk reindex");

        let mut report = ReindexReport {
            index: index.clone(),
            ..Default::default()
        };
        report.index_reset = self.reset_index(&index).await?;

        if let Err(e) = self.populate(entity_type, &index, &mut report).await {
            error!(
                entity_type = %entity_type,
                index = %index,
                error = %e,
                entities_found = report.entities_found,
                "Bulk reindex aborted"
            );
            return Err(e);
        }

        info!(
            entity_type = %entity_type,
            index = %index,
            found = report.entities_found,
            indexed = report.entities_indexed,
            documents_pushed = report.documents_pushed,
            documents_failed = report.documents_failed,
            "Bulk reindex complete"
        );
        Ok(report)
    }

    /// Delete the index when it exists. Returns true when it was deleted.
    async fn reset_index(&self, index: &str) -> Result<bool, SyncError> {
        match self.client.check_index(index).await? {
            IndexStatus::Missing => {
                debug!(index = %index, "Index does not exist, nothing to reset");
                Ok(false)
            }
            IndexStatus::Exists => {
                if !self.client.delete_index(index).await? {
                    return Err(SyncError::IndexReset(format!("cannot delete index {}", index)));
                }
                info!(index = %index, "Deleted existing index");
                Ok(true)
            }
            IndexStatus::Unexpected(status) => Err(SyncError::IndexReset(format!(
                "unexpected status {} checking index {}",
                status, index
            ))),
        }
    }

    async fn populate(
        &self,
        entity_type: &str,
        index: &str,
        report: &mut ReindexReport,
    ) -> Result<(), SyncError> {
        let mut offset = 0usize;
        let mut since_commit = 0usize;

        loop {
            let page = self
                .content
                .find_by_type(entity_type, offset, self.config.page_size)?;
            let page_len = page.len();

            for entity in &page {
                let (pushed, failed) = self.index_entity(index, entity).await;
                report.record_entity(pushed, failed);

                since_commit += 1;
                if since_commit == self.config.commit_interval {
                    self.content.commit()?;
                    report.commits += 1;
                    since_commit = 0;
                    debug!(entities_found = report.entities_found, "Committed reindex batch");
                }
            }

            if page_len < self.config.page_size {
                break;
            }
            offset += page_len;
        }

        self.content.commit()?;
        report.commits += 1;
        Ok(())
    }

    /// Push every document built from `entity`. Returns (pushed, failed).
    async fn index_entity(&self, index: &str, entity: &Entity) -> (u64, u64) {
        let documents = self.builder.build(entity);
        if documents.is_empty() {
            warn!(entity_id = %entity.id, "No document produced");
            return (0, 0);
        }

        let total = documents.len();
        let mut pushed = 0u64;
        let mut failed = 0u64;
        for (n, json) in documents.iter().enumerate() {
            let id = document_id(&entity.id, n, total);
            let outcome =
                push_with_retry(self.client.as_ref(), self.retry.as_ref(), index, &id, json).await;
            if outcome.is_indexed() {
                pushed += 1;
            } else {
                failed += 1;
            }
        }
        (pushed, failed)
    }
}
