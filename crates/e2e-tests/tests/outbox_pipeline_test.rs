//! End-to-end outbox tests: content writes flow through the event tap
//! into the outbox and are drained into the index.

use std::sync::Arc;

use pretty_assertions::assert_eq;

use e2e_tests::{parse_document, publications, TestHarness};
use sync_indexing::{ClientCall, DrainConfig, MockIndexClient};
use sync_types::{Entity, EventKind, OperationType};

#[tokio::test]
async fn test_create_flows_from_tap_to_index() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(3));
    assert_eq!(harness.storage.outbox_len().unwrap(), 3);

    let client = Arc::new(MockIndexClient::new());
    let report = harness.drain_worker(client.clone()).run().await.unwrap();

    assert_eq!(report.pushed, 3);
    assert_eq!(report.removed, 3);
    assert_eq!(harness.storage.outbox_len().unwrap(), 0);
    assert_eq!(
        client.document_ids("pubs"),
        vec!["pub-000", "pub-001", "pub-002"]
    );

    let doc = parse_document(&client.document("pubs", "pub-001").unwrap());
    assert_eq!(doc["id"], "pub-001");
    assert_eq!(doc["entityType"], "Publication");
    assert_eq!(doc["title"], "Publication 1");
}

#[tokio::test]
async fn test_records_drained_in_insertion_order() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, vec![Entity::new("b", "Publication")]);
    harness.store(EventKind::Create, vec![Entity::new("a", "Person")]);
    harness.store(EventKind::Create, vec![Entity::new("c", "Publication")]);

    let client = Arc::new(MockIndexClient::new());
    harness.drain_worker(client.clone()).run().await.unwrap();

    let pushed: Vec<String> = client
        .calls()
        .into_iter()
        .filter_map(|call| match call {
            ClientCall::IndexDocument { id, .. } => Some(id),
            _ => None,
        })
        .collect();
    assert_eq!(pushed, vec!["b", "a", "c"]);
    assert_eq!(client.document_ids("people"), vec!["a"]);
}

#[tokio::test]
async fn test_two_batches_for_same_entity_drain_as_two_records() {
    let harness = TestHarness::new();
    let entity = Entity::new("e1", "Publication").with_value("title", "First");
    harness.store(EventKind::Create, vec![entity]);
    let entity = Entity::new("e1", "Publication").with_value("title", "Second");
    harness.store(EventKind::Modify, vec![entity]);
    assert_eq!(harness.storage.outbox_len().unwrap(), 2);

    let client = Arc::new(MockIndexClient::new());
    let report = harness.drain_worker(client.clone()).run().await.unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(report.removed, 2);
    assert_eq!(client.push_attempts("e1"), 2);
    let doc = parse_document(&client.document("pubs", "e1").unwrap());
    assert_eq!(doc["title"], "Second");
}

#[tokio::test]
async fn test_delete_removes_document_from_every_index() {
    let harness = TestHarness::new();
    let client = Arc::new(MockIndexClient::new());

    harness.store(EventKind::Create, vec![Entity::new("e1", "Publication")]);
    harness.drain_worker(client.clone()).run().await.unwrap();
    assert_eq!(client.document_ids("pubs"), vec!["e1"]);

    harness.store(EventKind::Delete, vec![Entity::new("e1", "Publication")]);
    let record = harness.storage.first_outbox_record().unwrap().unwrap();
    assert_eq!(record.operation_type, OperationType::Delete);

    let report = harness.drain_worker(client.clone()).run().await.unwrap();
    // The entity is gone, so every registered index is cleaned.
    assert_eq!(report.deleted, 2);
    assert!(client.document_ids("pubs").is_empty());
}

#[tokio::test]
async fn test_withdrawal_through_metadata_change() {
    let harness = TestHarness::new();
    let client = Arc::new(MockIndexClient::new());

    harness.store(EventKind::Create, vec![Entity::new("e1", "Publication")]);
    harness.store(
        EventKind::ModifyMetadata,
        vec![Entity::new("e1", "Publication").withdrawn()],
    );
    // The pending create was re-stamped as a delete.
    assert_eq!(harness.storage.outbox_len().unwrap(), 1);

    let report = harness.drain_worker(client.clone()).run().await.unwrap();
    assert_eq!(report.pushed, 0);
    assert_eq!(report.deleted, 1);
    assert_eq!(
        client.calls(),
        vec![ClientCall::DeleteItemDocuments {
            index: "pubs".to_string(),
            item_id: "e1".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_change_during_push_is_not_lost() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, vec![Entity::new("e1", "Publication")]);

    let storage = harness.storage.clone();
    let client = Arc::new(MockIndexClient::new().with_push_hook(move |_, id| {
        if let Some(mut record) = storage.find_outbox_records_by_item(id).unwrap().pop() {
            if record.operation_type == OperationType::Create {
                storage
                    .touch_outbox_record(&mut record, OperationType::Modify)
                    .unwrap();
            }
        }
    }));

    let report = harness
        .drain_worker(client.clone())
        .with_config(DrainConfig::default().with_limit(1))
        .run()
        .await
        .unwrap();
    assert_eq!(report.left_in_place, 1);

    let record = harness.storage.first_outbox_record().unwrap().unwrap();
    assert_eq!(record.operation_type, OperationType::Modify);

    let report = harness.drain_worker(client.clone()).run().await.unwrap();
    assert_eq!(report.removed, 1);
    assert_eq!(harness.storage.outbox_len().unwrap(), 0);
}

#[tokio::test]
async fn test_transport_failure_rolls_back_drain() {
    let harness = TestHarness::new();
    harness.store(EventKind::Create, publications(2));

    let client = Arc::new(MockIndexClient::new().failing_transport());
    assert!(harness.drain_worker(client).run().await.is_err());
    assert_eq!(harness.storage.outbox_len().unwrap(), 2);

    let client = Arc::new(MockIndexClient::new());
    let report = harness.drain_worker(client).run().await.unwrap();
    assert_eq!(report.pushed, 2);
}

#[tokio::test]
async fn test_unsupported_entities_never_reach_outbox() {
    let harness = TestHarness::new();
    harness.store(
        EventKind::Create,
        vec![Entity::new("x1", "Collection"), Entity::new("x2", "  ")],
    );
    assert_eq!(harness.storage.outbox_len().unwrap(), 0);
}
