//! End-to-end test infrastructure for search-sync.
//!
//! Provides a shared TestHarness that wires storage, the event tap, the
//! drain worker and the bulk reindex job against an in-memory index.

use std::sync::Arc;

use sync_indexing::{
    BulkReindexJob, ContentStore, DrainWorker, IndexDocumentBuilder,
    IndexQueueConsumer, IndexRegistry, MockIndexClient,
};
use sync_storage::Storage;
use sync_types::{ContentEvent, Entity, EntitySettings, EventKind};

/// Shared test harness for E2E tests.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Shared storage instance (outbox and content store)
    pub storage: Arc<Storage>,
    pub entities: Vec<EntitySettings>,
    pub registry: Arc<IndexRegistry>,
}

impl TestHarness {
    /// Harness indexing `Publication` into `pubs` and `Person` into `people`.
    pub fn new() -> Self {
        Self::with_entities(vec![
            EntitySettings::new("Publication", "pubs"),
            EntitySettings::new("Person", "people"),
        ])
    }

    pub fn with_entities(entities: Vec<EntitySettings>) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let storage =
            Arc::new(Storage::open(temp_dir.path()).expect("Failed to open test storage"));
        let registry = Arc::new(IndexRegistry::from_settings(&entities));

        Self {
            _temp_dir: temp_dir,
            storage,
            entities,
            registry,
        }
    }

    pub fn tap(&self) -> IndexQueueConsumer {
        IndexQueueConsumer::new(self.storage.clone(), self.registry.clone())
    }

    pub fn drain_worker(&self, client: Arc<MockIndexClient>) -> DrainWorker {
        let content: Arc<dyn ContentStore> = self.storage.clone();
        DrainWorker::new(
            self.storage.clone(),
            content,
            self.registry.clone(),
            Arc::new(IndexDocumentBuilder::from_settings(&self.entities)),
            client,
        )
    }

    pub fn reindex_job(&self, client: Arc<MockIndexClient>) -> BulkReindexJob {
        let content: Arc<dyn ContentStore> = self.storage.clone();
        BulkReindexJob::new(
            content,
            self.registry.clone(),
            Arc::new(IndexDocumentBuilder::from_settings(&self.entities)),
            client,
        )
    }

    /// Store entities and report them to the tap in one batch, the way a
    /// content store would after a write.
    pub fn store(&self, kind: EventKind, entities: Vec<Entity>) {
        let tap = self.tap();
        let mut batch = tap.begin_batch();
        for entity in entities {
            if kind == EventKind::Delete {
                self.storage
                    .delete_entity(&entity.id)
                    .expect("Failed to delete entity");
            } else {
                self.storage
                    .put_entity(&entity)
                    .expect("Failed to put entity");
            }
            tap.consume(&mut batch, &ContentEvent::for_entity(kind, entity));
        }
        tap.end_batch(batch);
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// `count` publications `pub-000`, `pub-001`, ... each with a title.
pub fn publications(count: usize) -> Vec<Entity> {
    (0..count)
        .map(|i| {
            Entity::new(format!("pub-{:03}", i), "Publication")
                .with_value("title", format!("Publication {}", i))
        })
        .collect()
}

/// Parse a stored document.
pub fn parse_document(json: &str) -> serde_json::Value {
    serde_json::from_str(json).expect("Document is not valid JSON")
}
