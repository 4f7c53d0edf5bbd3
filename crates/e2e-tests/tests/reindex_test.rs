//! End-to-end bulk reindex tests.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{parse_document, publications, TestHarness};
use sync_indexing::{ClientCall, IndexStatus, MockIndexClient, ReindexConfig, SyncError};
use sync_types::{Entity, EntitySettings, EventKind};

#[tokio::test]
async fn test_reindex_rebuilds_existing_index() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(5));

    let client = Arc::new(MockIndexClient::new().with_index("pubs-rebuild"));
    let report = harness
        .reindex_job(client.clone())
        .run("Publication", Some("pubs-rebuild"))
        .await
        .unwrap();

    assert!(report.index_reset);
    assert_eq!(report.entities_found, 5);
    assert_eq!(report.documents_pushed, 5);

    let calls = client.calls();
    assert_eq!(calls[0], ClientCall::CheckIndex("pubs-rebuild".to_string()));
    assert_eq!(calls[1], ClientCall::DeleteIndex("pubs-rebuild".to_string()));
    assert_eq!(client.document_ids("pubs-rebuild").len(), 5);
    // The outbox is untouched by a rebuild.
    assert_eq!(harness.storage.outbox_len().unwrap(), 5);
}

#[tokio::test]
async fn test_reindex_bounded_retry() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(3));

    let client = Arc::new(MockIndexClient::new().rejecting("pub-001"));
    let report = harness
        .reindex_job(client.clone())
        .with_config(ReindexConfig::default().with_max_attempts(4))
        .run("Publication", Some("pubs"))
        .await
        .unwrap();

    assert_eq!(client.push_attempts("pub-001"), 4);
    assert_eq!(client.push_attempts("pub-000"), 1);
    assert_eq!(report.documents_failed, 1);
    assert_eq!(report.entities_indexed, 2);
    assert_eq!(client.document_ids("pubs"), vec!["pub-000", "pub-002"]);
}

#[tokio::test]
async fn test_reindex_denormalizes_multi_valued_fields() {
    let harness = TestHarness::with_entities(vec![EntitySettings::new("Publication", "pubs")
        .with_fields(&["title", "subject"])
        .with_denormalize(&["subject"])]);
    harness.store(
        EventKind::Create,
        vec![
            Entity::new("e1", "Publication")
                .with_value("title", "T")
                .with_value("subject", "rust")
                .with_value("subject", "search"),
            Entity::new("e2", "Publication").with_value("subject", "only"),
        ],
    );

    let client = Arc::new(MockIndexClient::new());
    let report = harness
        .reindex_job(client.clone())
        .run("Publication", Some("pubs"))
        .await
        .unwrap();

    assert_eq!(report.documents_pushed, 3);
    assert_eq!(client.document_ids("pubs"), vec!["e1_0", "e1_1", "e2"]);

    let first = parse_document(&client.document("pubs", "e1_0").unwrap());
    let second = parse_document(&client.document("pubs", "e1_1").unwrap());
    assert_eq!(first["subject"], "rust");
    assert_eq!(second["subject"], "search");
    assert_eq!(second["title"], "T");
}

fn subject_harness() -> TestHarness {
    let harness = TestHarness::with_entities(vec![EntitySettings::new("Publication", "pubs")
        .with_fields(&["title", "subject"])
        .with_denormalize(&["subject"])]);
    harness.store(
        EventKind::Create,
        vec![
            Entity::new("e1", "Publication")
                .with_value("subject", "rust")
                .with_value("subject", "search"),
            Entity::new("e2", "Publication").with_value("subject", "only"),
        ],
    );
    harness
}

#[tokio::test]
async fn test_delete_after_reindex_removes_every_copy() {
    let harness = subject_harness();
    harness.storage.delete_all_outbox_records().unwrap();

    let client = Arc::new(MockIndexClient::new());
    harness
        .reindex_job(client.clone())
        .run("Publication", Some("pubs"))
        .await
        .unwrap();
    assert_eq!(client.document_ids("pubs"), vec!["e1_0", "e1_1", "e2"]);

    harness.store(EventKind::Delete, vec![Entity::new("e1", "Publication")]);
    let report = harness.drain_worker(client.clone()).run().await.unwrap();

    assert_eq!(report.removed, 1);
    assert_eq!(client.document_ids("pubs"), vec!["e2"]);
}

#[tokio::test]
async fn test_drain_after_reindex_replaces_copies() {
    let harness = subject_harness();

    let client = Arc::new(MockIndexClient::new());
    harness
        .reindex_job(client.clone())
        .run("Publication", Some("pubs"))
        .await
        .unwrap();

    let report = harness.drain_worker(client.clone()).run().await.unwrap();

    assert_eq!(report.pushed, 2);
    assert_eq!(client.document_ids("pubs"), vec!["e1", "e2"]);
    let doc = parse_document(&client.document("pubs", "e1").unwrap());
    assert_eq!(doc["subject"], serde_json::json!(["rust", "search"]));
}

#[tokio::test]
async fn test_reindex_commits_every_interval() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(25));

    let client = Arc::new(MockIndexClient::new());
    let report = harness
        .reindex_job(client.clone())
        .with_config(
            ReindexConfig::default()
                .with_page_size(7)
                .with_commit_interval(10),
        )
        .run("Publication", Some("pubs"))
        .await
        .unwrap();

    assert_eq!(report.entities_found, 25);
    assert_eq!(report.commits, 3);
    assert_eq!(client.document_ids("pubs").len(), 25);
}

#[tokio::test]
async fn test_reindex_stops_on_reset_failure() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(2));

    let refusing = Arc::new(
        MockIndexClient::new()
            .with_index("pubs")
            .refusing_index_delete(),
    );
    let result = harness
        .reindex_job(refusing.clone())
        .run("Publication", Some("pubs"))
        .await;
    assert!(matches!(result, Err(SyncError::IndexReset(_))));
    assert_eq!(refusing.push_attempts("pub-000"), 0);

    let odd = Arc::new(MockIndexClient::new().with_index_status(IndexStatus::Unexpected(500)));
    let result = harness.reindex_job(odd).run("Publication", Some("pubs")).await;
    assert!(matches!(result, Err(SyncError::IndexReset(_))));
}

#[tokio::test]
async fn test_reindex_only_touches_requested_type() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(2));
    harness.store(EventKind::Create, vec![Entity::new("person-1", "Person")]);

    let client = Arc::new(MockIndexClient::new());
    let report = harness
        .reindex_job(client.clone())
        .run("Person", Some("people"))
        .await
        .unwrap();

    assert_eq!(report.entities_found, 1);
    assert_eq!(client.document_ids("people"), vec!["person-1"]);
    assert!(client.document_ids("pubs").is_empty());
}
