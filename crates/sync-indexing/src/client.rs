//! External index client.
//!
//! [`IndexClient`] is the seam the jobs talk to; [`HttpIndexClient`] speaks
//! the Elasticsearch-style REST API over reqwest.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use std::time::Duration;
use tracing::debug;

use sync_types::IndexSettings;

use crate::error::IndexClientError;

/// Result of an index existence check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    /// Backend answered 200
    Exists,
    /// Backend answered 404
    Missing,
    /// Any other status code
    Unexpected(u16),
}

/// Operations the sync jobs need from the search backend.
///
/// `Ok(false)` means the backend answered but refused the operation; `Err`
/// means no usable answer arrived.
#[async_trait]
pub trait IndexClient: Send + Sync {
    async fn check_index(&self, index: &str) -> Result<IndexStatus, IndexClientError>;

    async fn delete_index(&self, index: &str) -> Result<bool, IndexClientError>;

    /// Upsert a document under `id`.
    async fn index_document(
        &self,
        index: &str,
        id: &str,
        json: &str,
    ) -> Result<bool, IndexClientError>;

    /// Remove every document of an item, including denormalized copies.
    ///
    /// Documents are matched on their `id` field, which every document
    /// built for an item carries. Nothing to remove counts as removed.
    async fn delete_item_documents(
        &self,
        index: &str,
        item_id: &str,
    ) -> Result<bool, IndexClientError>;
}

/// Configuration for [`HttpIndexClient`].
#[derive(Debug, Clone)]
pub struct HttpIndexClientConfig {
    /// Base URL (e.g., "http://localhost:9200")
    pub base_url: String,

    /// Basic auth user
    pub username: Option<String>,

    /// Basic auth password
    pub password: Option<SecretString>,

    /// Request timeout
    pub timeout: Duration,
}

impl HttpIndexClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: None,
            password: None,
            timeout: Duration::from_secs(30),
        }
    }

    /// Build from the `[index]` settings block.
    pub fn from_settings(settings: &IndexSettings) -> Self {
        Self {
            base_url: settings.url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    pub fn with_basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(SecretString::from(password.into()));
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// reqwest-backed [`IndexClient`].
///
/// Index names and document ids are percent-encoded as single path
/// segments, so ids may contain `/`, `?` or `#`.
pub struct HttpIndexClient {
    client: Client,
    base_url: Url,
    config: HttpIndexClientConfig,
}

impl HttpIndexClient {
    pub fn new(config: HttpIndexClientConfig) -> Result<Self, IndexClientError> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            IndexClientError::Config(format!("Invalid index URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(IndexClientError::Config(format!(
                "Index URL {} cannot carry a path",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| IndexClientError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            config,
        })
    }

    /// Base URL with `segments` appended, each encoded as one segment.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base URLs are rejected in new()
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.username {
            Some(username) => request.basic_auth(
                username,
                self.config.password.as_ref().map(|p| p.expose_secret()),
            ),
            None => request,
        }
    }
}

#[async_trait]
impl IndexClient for HttpIndexClient {
    async fn check_index(&self, index: &str) -> Result<IndexStatus, IndexClientError> {
        let response = self
            .authorize(self.client.get(self.url(&[index])))
            .send()
            .await?;

        let status = response.status();
        debug!(index = %index, status = status.as_u16(), "Checked index");
        Ok(match status {
            StatusCode::OK => IndexStatus::Exists,
            StatusCode::NOT_FOUND => IndexStatus::Missing,
            other => IndexStatus::Unexpected(other.as_u16()),
        })
    }

    async fn delete_index(&self, index: &str) -> Result<bool, IndexClientError> {
        let response = self
            .authorize(self.client.delete(self.url(&[index])))
            .send()
            .await?;

        let status = response.status();
        debug!(index = %index, status = status.as_u16(), "Deleted index");
        Ok(status.is_success())
    }

    async fn index_document(
        &self,
        index: &str,
        id: &str,
        json: &str,
    ) -> Result<bool, IndexClientError> {
        let response = self
            .authorize(self.client.put(self.url(&[index, "_doc", id])))
            .header("Content-Type", "application/json")
            .body(json.to_string())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK || status == StatusCode::CREATED {
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(index = %index, id = %id, status = status.as_u16(), body = %body, "Document rejected");
        Ok(false)
    }

    async fn delete_item_documents(
        &self,
        index: &str,
        item_id: &str,
    ) -> Result<bool, IndexClientError> {
        let mut url = self.url(&[index, "_delete_by_query"]);
        url.query_pairs_mut().append_pair("conflicts", "proceed");

        let query = json!({ "query": { "term": { "id": item_id } } });
        let response = self
            .authorize(self.client.post(url))
            .json(&query)
            .send()
            .await?;

        let status = response.status();
        debug!(index = %index, item_id = %item_id, status = status.as_u16(), "Deleted item documents");
        // 404: the index itself is gone
        Ok(status == StatusCode::OK || status == StatusCode::NOT_FOUND)
    }
}
