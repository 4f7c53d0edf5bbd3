//! In-memory index client for testing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::{IndexClient, IndexStatus};
use crate::error::IndexClientError;

/// A call received by [`MockIndexClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCall {
    CheckIndex(String),
    DeleteIndex(String),
    IndexDocument { index: String, id: String, json: String },
    DeleteItemDocuments { index: String, item_id: String },
}

type PushHook = Box<dyn Fn(&str, &str) + Send + Sync>;

#[derive(Default)]
struct MockState {
    /// index -> (document id -> json)
    indexes: HashMap<String, BTreeMap<String, String>>,
    calls: Vec<ClientCall>,
}

/// Index client that keeps documents in memory and records every call.
///
/// Behaviour knobs let tests reject documents, refuse index deletion,
/// report odd statuses or fail at the transport level.
#[derive(Default)]
pub struct MockIndexClient {
    state: Mutex<MockState>,
    rejected_ids: HashSet<String>,
    status_override: Option<IndexStatus>,
    refuse_index_delete: bool,
    transport_failure: bool,
    push_hook: Option<PushHook>,
}

fn lock(state: &Mutex<MockState>) -> MutexGuard<'_, MockState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockIndexClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with an existing (empty) index.
    pub fn with_index(self, index: impl Into<String>) -> Self {
        lock(&self.state).indexes.entry(index.into()).or_default();
        self
    }

    /// Always reject pushes of this document id.
    pub fn rejecting(mut self, id: impl Into<String>) -> Self {
        self.rejected_ids.insert(id.into());
        self
    }

    /// Answer every index check with `status`.
    pub fn with_index_status(mut self, status: IndexStatus) -> Self {
        self.status_override = Some(status);
        self
    }

    /// Answer index deletion with a refusal.
    pub fn refusing_index_delete(mut self) -> Self {
        self.refuse_index_delete = true;
        self
    }

    /// Fail every call with a transport error.
    pub fn failing_transport(mut self) -> Self {
        self.transport_failure = true;
        self
    }

    /// Run `hook(index, id)` before every document push.
    pub fn with_push_hook(mut self, hook: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.push_hook = Some(Box::new(hook));
        self
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<ClientCall> {
        lock(&self.state).calls.clone()
    }

    /// Number of push attempts for one document id.
    pub fn push_attempts(&self, id: &str) -> usize {
        lock(&self.state)
            .calls
            .iter()
            .filter(|c| matches!(c, ClientCall::IndexDocument { id: doc_id, .. } if doc_id == id))
            .count()
    }

    /// Stored document, if any.
    pub fn document(&self, index: &str, id: &str) -> Option<String> {
        lock(&self.state)
            .indexes
            .get(index)
            .and_then(|docs| docs.get(id).cloned())
    }

    /// Document ids stored in an index, sorted.
    pub fn document_ids(&self, index: &str) -> Vec<String> {
        lock(&self.state)
            .indexes
            .get(index)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn record(&self, call: ClientCall) -> Result<(), IndexClientError> {
        lock(&self.state).calls.push(call);
        if self.transport_failure {
            return Err(IndexClientError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl IndexClient for MockIndexClient {
    async fn check_index(&self, index: &str) -> Result<IndexStatus, IndexClientError> {
        self.record(ClientCall::CheckIndex(index.to_string()))?;
        if let Some(status) = self.status_override {
            return Ok(status);
        }
        Ok(if lock(&self.state).indexes.contains_key(index) {
            IndexStatus::Exists
        } else {
            IndexStatus::Missing
        })
    }

    async fn delete_index(&self, index: &str) -> Result<bool, IndexClientError> {
        self.record(ClientCall::DeleteIndex(index.to_string()))?;
        if self.refuse_index_delete {
            return Ok(false);
        }
        Ok(lock(&self.state).indexes.remove(index).is_some())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        json: &str,
    ) -> Result<bool, IndexClientError> {
        if let Some(hook) = &self.push_hook {
            hook(index, id);
        }
        self.record(ClientCall::IndexDocument {
            index: index.to_string(),
            id: id.to_string(),
            json: json.to_string(),
        })?;
        if self.rejected_ids.contains(id) {
            return Ok(false);
        }
        lock(&self.state)
            .indexes
            .entry(index.to_string())
            .or_default()
            .insert(id.to_string(), json.to_string());
        Ok(true)
    }

    async fn delete_item_documents(
        &self,
        index: &str,
        item_id: &str,
    ) -> Result<bool, IndexClientError> {
        self.record(ClientCall::DeleteItemDocuments {
            index: index.to_string(),
            item_id: item_id.to_string(),
        })?;
        if let Some(docs) = lock(&self.state).indexes.get_mut(index) {
            docs.retain(|_, json| document_item_id(json).as_deref() != Some(item_id));
        }
        Ok(true)
    }
}

/// The `id` field of a stored document.
fn document_item_id(json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(json).ok()?;
    value.get("id")?.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_delete_item_documents_matches_id_field() {
        let client = MockIndexClient::new();
        client.index_document("pubs", "e1_0", r#"{"id":"e1","author":"a"}"#).await.unwrap();
        client.index_document("pubs", "e1_1", r#"{"id":"e1","author":"b"}"#).await.unwrap();
        client.index_document("pubs", "e10", r#"{"id":"e10"}"#).await.unwrap();

        assert!(client.delete_item_documents("pubs", "e1").await.unwrap());
        assert_eq!(client.document_ids("pubs"), vec!["e10".to_string()]);
        assert!(client.delete_item_documents("missing", "e1").await.unwrap());
    }
}
